//! Application state and router.

use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use config::ConfigError;
use scensei_integration::{ClientCredentialsExchange, ServiceCredentialCache, SpeechClient};
use scensei_platform_access::{
    AdminSecret, CeremonyVerifier, ChallengeCoordinator, PerimeterGate, RelyingParty,
    SessionPolicy,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::auth::{self, webauthn};
use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::tts;

/// Shared application state.
pub struct AppState {
    /// Session cookie policy for both the perimeter and admin cookies.
    pub policy: SessionPolicy,
    /// Page-request gate.
    pub gate: PerimeterGate,
    /// WebAuthn option generator.
    pub coordinator: ChallengeCoordinator,
    /// WebAuthn response verifier.
    pub verifier: CeremonyVerifier,
    /// Service token cache; `None` when the identity provider is not configured.
    pub credentials: Option<ServiceCredentialCache>,
    /// Speech API client.
    pub speech: SpeechClient,
    /// Whether cookies carry the Secure flag.
    pub secure_cookies: bool,
}

impl AppState {
    /// Builds the state described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session lifetime is out of range.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let secret = AdminSecret::new(config.admin_password.clone());
        let rp = RelyingParty::new(config.webauthn_rp_id.clone(), config.webauthn_origin.clone());

        Ok(Self {
            policy: SessionPolicy::new(
                secret.clone(),
                config.session.mode,
                config.session.lifetime()?,
            ),
            gate: PerimeterGate::new(config.login_path.clone()),
            coordinator: ChallengeCoordinator::new(rp.clone(), secret.clone()),
            verifier: CeremonyVerifier::new(rp, secret),
            credentials: credential_cache(config),
            speech: SpeechClient::new(config.speech_api_url().map(str::to_string)),
            secure_cookies: config.session.secure_cookies,
        })
    }

    /// Replaces the service token cache.
    #[must_use]
    pub fn with_credentials(mut self, credentials: ServiceCredentialCache) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

fn credential_cache(config: &GatewayConfig) -> Option<ServiceCredentialCache> {
    let cognito = &config.cognito;
    let (Some(endpoint), Some(client_id), Some(scope)) = (
        cognito.token_endpoint.as_deref(),
        cognito.client_id.as_deref(),
        cognito.scope.as_deref(),
    ) else {
        tracing::warn!("identity provider not configured, TTS proxy disabled");
        return None;
    };

    match ClientCredentialsExchange::new(endpoint, client_id, &config.cognito_client_secret, scope)
    {
        Ok(exchange) => Some(ServiceCredentialCache::new(Box::new(exchange))),
        Err(e) => {
            tracing::warn!(error = %e, "invalid identity provider settings, TTS proxy disabled");
            None
        }
    }
}

/// Builds the gateway router.
///
/// API routes live under `/api`; everything else is served from `site_root`.
/// The perimeter gate wraps both.
pub fn router(state: Arc<AppState>, site_root: &Path) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route(
            "/admin/auth",
            post(auth::admin_login)
                .delete(auth::admin_logout)
                .fallback(method_not_allowed),
        )
        .route(
            "/admin/webauthn/register-options",
            post(webauthn::register_options).fallback(method_not_allowed),
        )
        .route(
            "/admin/webauthn/register-verify",
            post(webauthn::register_verify).fallback(method_not_allowed),
        )
        .route(
            "/admin/webauthn/auth-options",
            post(webauthn::auth_options).fallback(method_not_allowed),
        )
        .route(
            "/admin/webauthn/auth-verify",
            post(webauthn::auth_verify).fallback(method_not_allowed),
        )
        .route("/tts", post(tts::synthesize).fallback(method_not_allowed));

    Router::new()
        .nest("/api", api)
        .fallback_service(ServeDir::new(site_root))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::perimeter_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
