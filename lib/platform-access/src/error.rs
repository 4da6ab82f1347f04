//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `AuthenticationError`: Session and password failures
//! - `CeremonyError`: WebAuthn challenge generation and verification failures

use std::fmt;

/// Errors from session and password authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// No admin secret is configured, so nothing can authenticate.
    SecretNotConfigured,
    /// The supplied password does not match the admin secret.
    InvalidPassword,
    /// The session cookie is missing.
    MissingSession { cookie: &'static str },
    /// The session cookie does not verify.
    InvalidSession { cookie: &'static str },
}

impl fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SecretNotConfigured => write!(f, "admin secret is not configured"),
            Self::InvalidPassword => write!(f, "invalid admin password"),
            Self::MissingSession { cookie } => write!(f, "missing session cookie '{cookie}'"),
            Self::InvalidSession { cookie } => write!(f, "invalid session cookie '{cookie}'"),
        }
    }
}

impl std::error::Error for AuthenticationError {}

/// Errors from the WebAuthn ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CeremonyError {
    /// The system random source failed while generating a challenge.
    ChallengeGeneration { reason: String },
    /// A base64 field could not be decoded.
    InvalidEncoding { field: &'static str },
    /// The client data JSON could not be parsed.
    InvalidClientData { reason: String },
    /// The client data type does not match the ceremony.
    CeremonyTypeMismatch { expected: &'static str, actual: String },
    /// The challenge cookie was not issued by this server for this ceremony.
    ChallengeNotIssued,
    /// The challenge is older than its TTL.
    ChallengeExpired,
    /// The challenge was already presented for verification.
    ChallengeReplayed,
    /// The signed challenge does not match the issued challenge.
    ChallengeMismatch,
    /// The origin reported by the browser is not the expected origin.
    OriginMismatch { actual: String },
    /// Authenticator data is truncated or malformed.
    InvalidAuthenticatorData { reason: String },
    /// The authenticator data was produced for another relying party.
    RelyingPartyMismatch,
    /// A required authenticator flag (user present / verified) is unset.
    MissingFlag { flag: &'static str },
    /// The attestation object could not be decoded.
    InvalidAttestation { reason: String },
    /// The credential public key is not an ES256 P-256 key.
    UnsupportedKey { reason: String },
    /// The credential id in the response differs from the expected one.
    CredentialMismatch,
    /// The credential seal does not verify under the server secret.
    InvalidSeal,
    /// The assertion signature does not verify.
    InvalidSignature,
    /// The signature counter did not advance.
    CounterRegression { stored: u32, received: u32 },
}

impl fmt::Display for CeremonyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChallengeGeneration { reason } => {
                write!(f, "failed to generate challenge: {reason}")
            }
            Self::InvalidEncoding { field } => write!(f, "invalid base64 in field '{field}'"),
            Self::InvalidClientData { reason } => write!(f, "invalid client data: {reason}"),
            Self::CeremonyTypeMismatch { expected, actual } => {
                write!(f, "expected ceremony type '{expected}', got '{actual}'")
            }
            Self::ChallengeNotIssued => write!(f, "challenge was not issued by this server"),
            Self::ChallengeExpired => write!(f, "challenge has expired"),
            Self::ChallengeReplayed => write!(f, "challenge was already used"),
            Self::ChallengeMismatch => write!(f, "challenge does not match"),
            Self::OriginMismatch { actual } => write!(f, "unexpected origin '{actual}'"),
            Self::InvalidAuthenticatorData { reason } => {
                write!(f, "invalid authenticator data: {reason}")
            }
            Self::RelyingPartyMismatch => write!(f, "relying party id hash does not match"),
            Self::MissingFlag { flag } => write!(f, "authenticator flag '{flag}' not set"),
            Self::InvalidAttestation { reason } => write!(f, "invalid attestation: {reason}"),
            Self::UnsupportedKey { reason } => write!(f, "unsupported credential key: {reason}"),
            Self::CredentialMismatch => write!(f, "credential id does not match"),
            Self::InvalidSeal => write!(f, "credential seal does not verify"),
            Self::InvalidSignature => write!(f, "assertion signature does not verify"),
            Self::CounterRegression { stored, received } => {
                write!(
                    f,
                    "signature counter regressed (stored {stored}, received {received})"
                )
            }
        }
    }
}

impl std::error::Error for CeremonyError {}
