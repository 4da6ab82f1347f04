//! WebAuthn passkey endpoints.
//!
//! - `POST /api/admin/webauthn/register-options` - Registration challenge (admin only)
//! - `POST /api/admin/webauthn/register-verify` - Verifies and seals a new passkey (admin only)
//! - `POST /api/admin/webauthn/auth-options` - Authentication challenge for a credential id
//! - `POST /api/admin/webauthn/auth-verify` - Verifies an assertion and sets the perimeter cookie
//!
//! The issued challenge lives only in the `webauthn-challenge` cookie. Every
//! verification attempt that reads it also clears it and redeems it, so a
//! replayed cookie is refused even if the browser kept a copy.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use scensei_platform_access::{
    AuthenticationOptions, AuthenticationResponse, CHALLENGE_COOKIE, CHALLENGE_TTL_SECONDS,
    Challenge, ChallengePurpose, PERIMETER_COOKIE, RegisteredCredential, RegistrationOptions,
    RegistrationResponse, SessionKind,
};
use serde::Deserialize;
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::{RequireAdmin, removal_cookie, session_cookie};
use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthOptionsRequest {
    #[serde(default)]
    credential_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthVerifyRequest {
    #[serde(default)]
    response: Option<AuthenticationResponse>,
    #[serde(default)]
    credential: Option<RegisteredCredential>,
}

fn challenge_cookie(state: &AppState, nonce: &str) -> Cookie<'static> {
    Cookie::build((CHALLENGE_COOKIE, nonce.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(SameSite::Strict)
        .max_age(TimeDuration::seconds(CHALLENGE_TTL_SECONDS))
        .build()
}

/// Takes the challenge out of the jar and redeems it for `purpose`.
///
/// Once a challenge cookie is present, the returned jar always queues its
/// removal, whether or not redemption succeeds.
fn take_challenge(
    state: &AppState,
    jar: CookieJar,
    purpose: ChallengePurpose,
) -> (CookieJar, Result<Challenge, ApiError>) {
    let Some(value) = jar
        .get(CHALLENGE_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|value| !value.is_empty())
    else {
        return (
            jar,
            Err(ApiError::BadRequest {
                message: "Challenge not found",
            }),
        );
    };

    let jar = jar.add(removal_cookie(state, CHALLENGE_COOKIE, SameSite::Strict));
    let challenge = state
        .coordinator
        .redeem(&value, purpose)
        .map_err(ApiError::from);
    (jar, challenge)
}

/// Issues registration options and the challenge cookie.
pub async fn register_options(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RegistrationOptions>), ApiError> {
    let (options, challenge) = state.coordinator.registration_challenge()?;
    let jar = jar.add(challenge_cookie(&state, challenge.value()));
    Ok((jar, Json(options)))
}

/// Verifies a registration response and returns the sealed credential.
pub async fn register_verify(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    let (jar, challenge) = take_challenge(&state, jar, ChallengePurpose::Registration);
    let challenge = match challenge {
        Ok(challenge) => challenge,
        Err(err) => return (jar, err).into_response(),
    };

    let outcome = serde_json::from_slice::<RegistrationResponse>(&body)
        .map_err(|_| ApiError::BadRequest {
            message: "Invalid request",
        })
        .and_then(|response| {
            state
                .verifier
                .verify_registration(&response, &challenge)
                .map_err(ApiError::from)
        })
        .map(|credential| {
            tracing::info!(credential_id = %credential.id, "registered admin passkey");
            Json(serde_json::json!({ "verified": true, "credential": credential }))
        });

    (jar, outcome).into_response()
}

/// Issues authentication options for the supplied credential id.
pub async fn auth_options(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, Json<AuthenticationOptions>), ApiError> {
    let request: AuthOptionsRequest = serde_json::from_slice(&body).unwrap_or_default();
    let credential_id = request
        .credential_id
        .filter(|id| !id.is_empty())
        .ok_or(ApiError::BadRequest {
            message: "Credential ID required",
        })?;

    let (options, challenge) = state.coordinator.authentication_challenge(&credential_id)?;
    let jar = jar.add(challenge_cookie(&state, challenge.value()));
    Ok((jar, Json(options)))
}

/// Verifies an assertion and, on success, sets the perimeter cookie.
pub async fn auth_verify(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    body: Bytes,
) -> Response {
    let (jar, challenge) = take_challenge(&state, jar, ChallengePurpose::Authentication);
    let challenge = match challenge {
        Ok(challenge) => challenge,
        Err(err) => return (jar, err).into_response(),
    };

    let request = serde_json::from_slice::<AuthVerifyRequest>(&body)
        .ok()
        .and_then(|req| req.response.zip(req.credential));
    let Some((response, credential)) = request else {
        return (
            jar,
            ApiError::BadRequest {
                message: "Invalid request",
            },
        )
            .into_response();
    };

    let new_counter = match state
        .verifier
        .verify_authentication(&response, &credential, &challenge)
    {
        Ok(counter) => counter,
        Err(err) => return (jar, ApiError::from(err)).into_response(),
    };

    let token = match state.policy.mint(SessionKind::Perimeter) {
        Ok(token) => token,
        Err(err) => return (jar, ApiError::from(err)).into_response(),
    };

    tracing::info!(credential_id = %credential.id, "admin authenticated with passkey");
    let jar = jar.add(session_cookie(&state, PERIMETER_COOKIE, token, SameSite::Lax));
    (
        jar,
        Json(serde_json::json!({ "verified": true, "newCounter": new_counter })),
    )
        .into_response()
}
