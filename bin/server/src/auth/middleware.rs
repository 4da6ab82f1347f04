//! Authentication middleware and extractors for Axum.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use scensei_platform_access::{ADMIN_COOKIE, GateDecision, PERIMETER_COOKIE, SessionKind};
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;

/// Redirects unauthenticated page requests to the login page.
///
/// API routes, static asset prefixes and the login page itself pass through.
pub async fn perimeter_gate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let cookie = jar.get(PERIMETER_COOKIE).map(|c| c.value());

    match state
        .gate
        .decide(request.uri().path(), cookie, &state.policy)
    {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect(location) => {
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
    }
}

/// Extractor requiring a valid admin cookie.
pub struct RequireAdmin;

impl<S> FromRequestParts<S> for RequireAdmin
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRejection::InternalError)?;

        app_state
            .policy
            .validate(SessionKind::Admin, jar.get(ADMIN_COOKIE).map(|c| c.value()))
            .map_err(|reason| {
                tracing::debug!(%reason, "admin cookie rejected");
                AuthRejection::NotAuthenticated
            })?;

        Ok(RequireAdmin)
    }
}

/// Rejection type for authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    NotAuthenticated,
    InternalError,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated => ApiError::Unauthorized {
                message: "Unauthorized",
            }
            .into_response(),
            Self::InternalError => ApiError::Internal {
                message: "Internal server error",
                details: "failed to read request cookies".to_string(),
            }
            .into_response(),
        }
    }
}
