//! Outbound integrations for the Scensei gateway.
//!
//! This crate provides:
//!
//! - **Service credential cache**: Lazily obtained, process-wide bearer token
//!   for the backend APIs, refreshed five minutes before expiry
//! - **Client-credentials exchange**: OAuth 2.0 token requests against the
//!   identity provider
//! - **Speech client**: Text-to-speech calls to the backend speech API

pub mod credential;
pub mod error;
pub mod exchange;
pub mod speech;

pub use credential::{ServiceCredentialCache, ServiceToken, TokenExchange};
pub use error::{CredentialError, SpeechError};
pub use exchange::ClientCredentialsExchange;
pub use speech::{SpeechClient, SynthesisRequest};
