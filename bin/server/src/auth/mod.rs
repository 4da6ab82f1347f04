//! Authentication for the gateway.
//!
//! This module provides:
//! - The perimeter gate middleware guarding every page request
//! - Password login and logout for the admin cookie
//! - WebAuthn passkey registration and login for the perimeter cookie
//!
//! # Cookies
//!
//! | Cookie | Set by | SameSite | Lifetime |
//! |--------|--------|----------|----------|
//! | `admin_token` | password login | Strict | session lifetime |
//! | `auth_token` | passkey login | Lax | session lifetime |
//! | `webauthn-challenge` | option endpoints | Strict | 300 s, single use |

pub mod middleware;
pub mod routes;
pub mod webauthn;

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration as TimeDuration;

use crate::app::AppState;

pub use middleware::{AuthRejection, RequireAdmin, perimeter_gate};
pub use routes::{admin_login, admin_logout};

/// Builds an HTTP-only cookie living for the configured session lifetime.
pub(crate) fn session_cookie(
    state: &AppState,
    name: &'static str,
    value: String,
    same_site: SameSite,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(same_site)
        .max_age(TimeDuration::seconds(state.policy.lifetime().num_seconds()))
        .build()
}

/// Builds a cookie that deletes `name` in the browser.
pub(crate) fn removal_cookie(
    state: &AppState,
    name: &'static str,
    same_site: SameSite,
) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(state.secure_cookies)
        .same_site(same_site)
        .max_age(TimeDuration::ZERO)
        .build()
}
