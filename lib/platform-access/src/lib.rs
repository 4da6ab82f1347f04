//! Platform access for the Scensei gateway.
//!
//! This crate provides:
//! - Session cookie validation and minting (`SessionPolicy`, `SessionKind`)
//! - The perimeter gate deciding whether page requests may proceed
//! - WebAuthn challenge generation for admin passkeys (`ChallengeCoordinator`)
//! - Verification of registration and authentication responses
//!   (`CeremonyVerifier`)
//!
//! # Access Model
//!
//! There is a single admin identity guarded by a shared secret. Password
//! login yields the admin session; a verified passkey assertion yields the
//! perimeter session that the gate checks on every page request.
//!
//! # Example
//!
//! ```
//! use chrono::Duration;
//! use scensei_platform_access::{
//!     AdminSecret, GateDecision, PerimeterGate, SessionMode, SessionPolicy,
//! };
//!
//! let policy = SessionPolicy::new(
//!     AdminSecret::new("s3cret"),
//!     SessionMode::SharedSecret,
//!     Duration::hours(24),
//! );
//! let gate = PerimeterGate::new("/login");
//!
//! assert_eq!(gate.decide("/", Some("s3cret"), &policy), GateDecision::Allow);
//! assert_eq!(
//!     gate.decide("/", None, &policy),
//!     GateDecision::Redirect("/login".to_string())
//! );
//! ```

pub mod authenticator;
pub mod ceremony;
pub mod challenge;
pub mod error;
mod mac;
pub mod perimeter;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export main types at crate root
pub use ceremony::{
    AuthenticationResponse, CeremonyVerifier, RegisteredCredential, RegistrationResponse,
};
pub use challenge::{
    AuthenticationOptions, CHALLENGE_COOKIE, CHALLENGE_TTL_SECONDS, Challenge,
    ChallengeCoordinator, ChallengePurpose, RegistrationOptions, RelyingParty,
};
pub use error::{AuthenticationError, CeremonyError};
pub use perimeter::{GateDecision, PerimeterGate};
pub use session::{
    ADMIN_COOKIE, AdminSecret, PERIMETER_COOKIE, SessionKind, SessionMode, SessionPolicy,
};
