//! Error handling foundation for the Scensei gateway.
//!
//! Library crates define plain error enums (`CredentialError`,
//! `CeremonyError`, ...) and return them wrapped in a rootcause `Report`
//! where a failure crosses an async or crate boundary. The server unwraps
//! reports into HTTP responses at the handler edge.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
