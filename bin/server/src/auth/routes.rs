//! Password login and logout for the admin cookie.

use axum::{Json, body::Bytes, extract::State, response::IntoResponse};
use axum_extra::extract::cookie::{CookieJar, SameSite};
use scensei_platform_access::{ADMIN_COOKIE, SessionKind};
use serde::Deserialize;
use std::sync::Arc;

use super::{removal_cookie, session_cookie};
use crate::app::AppState;
use crate::error::ApiError;

/// Body of `POST /api/admin/auth`.
#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    password: Option<String>,
}

/// Exchanges the admin password for the admin cookie.
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: LoginRequest = serde_json::from_slice(&body).unwrap_or_default();

    state
        .policy
        .check_password(request.password.as_deref().unwrap_or_default())
        .inspect_err(|reason| tracing::info!(%reason, "admin login rejected"))?;

    let token = state.policy.mint(SessionKind::Admin)?;
    let cookie = session_cookie(&state, ADMIN_COOKIE, token, SameSite::Strict);

    tracing::info!("admin logged in with password");
    Ok((
        jar.add(cookie),
        Json(serde_json::json!({ "success": true })),
    ))
}

/// Clears the admin cookie.
pub async fn admin_logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let remove = removal_cookie(&state, ADMIN_COOKIE, SameSite::Strict);
    (jar.add(remove), Json(serde_json::json!({ "success": true })))
}
