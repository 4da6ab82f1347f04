//! HTTP error mapping for the gateway.
//!
//! Handlers return [`ApiError`], which renders as `{"error": "<message>"}`.
//! Details carried by a variant are logged, never sent to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scensei_integration::{CredentialError, SpeechError};
use scensei_platform_access::{AuthenticationError, CeremonyError};
use std::fmt;

/// Errors surfaced by the gateway's HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid session, admin cookie or password.
    Unauthorized { message: &'static str },
    /// A required field or cookie is missing, or verification failed.
    BadRequest { message: &'static str },
    /// The route exists but not for this method.
    MethodNotAllowed,
    /// The proxied API answered with a non-success status.
    Upstream { status: StatusCode, message: &'static str },
    /// A dependency could not be reached or returned garbage.
    ServiceUnavailable { message: &'static str, details: String },
    /// A required setting is absent.
    Misconfiguration { message: &'static str },
    /// Unexpected failure while building a response.
    Internal { message: &'static str, details: String },
}

impl ApiError {
    /// Returns the status this error renders with.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Upstream { status, .. } => *status,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Misconfiguration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the client-facing message.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unauthorized { message }
            | Self::BadRequest { message }
            | Self::Upstream { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Misconfiguration { message }
            | Self::Internal { message, .. } => message,
            Self::MethodNotAllowed => "Method not allowed",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceUnavailable { message, details } | Self::Internal { message, details } => {
                write!(f, "{message}: {details}")
            }
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::ServiceUnavailable { details, .. } => {
                tracing::error!(details = %details, "dependency unavailable");
            }
            Self::Internal { details, .. } => {
                tracing::error!(details = %details, "internal error");
            }
            Self::Misconfiguration { message } => {
                tracing::error!(message, "gateway misconfigured");
            }
            _ => {}
        }

        let body = serde_json::json!({ "error": self.message() });
        (self.status(), Json(body)).into_response()
    }
}

impl From<AuthenticationError> for ApiError {
    fn from(err: AuthenticationError) -> Self {
        match err {
            AuthenticationError::SecretNotConfigured => Self::Misconfiguration {
                message: "Admin password not configured",
            },
            AuthenticationError::InvalidPassword => Self::Unauthorized {
                message: "Invalid password",
            },
            AuthenticationError::MissingSession { .. }
            | AuthenticationError::InvalidSession { .. } => Self::Unauthorized {
                message: "Unauthorized",
            },
        }
    }
}

impl From<CeremonyError> for ApiError {
    fn from(err: CeremonyError) -> Self {
        match err {
            CeremonyError::ChallengeGeneration { reason } => Self::Internal {
                message: "Failed to generate options",
                details: reason,
            },
            other => {
                tracing::warn!(error = %other, "webauthn verification rejected");
                Self::BadRequest {
                    message: "Verification failed",
                }
            }
        }
    }
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::NotConfigured => Self::Misconfiguration {
                message: "TTS service not configured",
            },
            SpeechError::Upstream { status } => Self::Upstream {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message: "TTS synthesis failed",
            },
            other @ (SpeechError::Transport { .. } | SpeechError::InvalidResponse { .. }) => {
                Self::ServiceUnavailable {
                    message: "TTS service unavailable",
                    details: other.to_string(),
                }
            }
        }
    }
}

impl From<rootcause::Report<CredentialError>> for ApiError {
    fn from(report: rootcause::Report<CredentialError>) -> Self {
        Self::ServiceUnavailable {
            message: "TTS service unavailable",
            details: report.to_string(),
        }
    }
}
