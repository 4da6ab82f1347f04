//! Error types for the integration crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `CredentialError`: Errors obtaining service credentials
//! - `SpeechError`: Errors from the upstream speech API

use std::fmt;

/// Errors from service credential operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// A required setting is missing or invalid.
    NotConfigured { setting: String },
    /// The token endpoint rejected the exchange or could not be reached.
    ExchangeFailed { endpoint: String, reason: String },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured { setting } => {
                write!(f, "service credentials not configured: {setting}")
            }
            Self::ExchangeFailed { endpoint, reason } => {
                write!(f, "failed to get access token from {endpoint}: {reason}")
            }
        }
    }
}

impl std::error::Error for CredentialError {}

/// Errors from the speech synthesis API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechError {
    /// No upstream URL is configured.
    NotConfigured,
    /// The request never produced an HTTP response.
    Transport { details: String },
    /// The upstream answered with a non-success status.
    Upstream { status: u16 },
    /// The upstream answered 2xx with an unusable body.
    InvalidResponse { details: String },
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "speech API URL is not configured"),
            Self::Transport { details } => write!(f, "speech API request failed: {details}"),
            Self::Upstream { status } => write!(f, "speech API returned status {status}"),
            Self::InvalidResponse { details } => {
                write!(f, "invalid speech API response: {details}")
            }
        }
    }
}

impl std::error::Error for SpeechError {}
