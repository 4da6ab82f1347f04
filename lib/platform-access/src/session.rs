//! Session cookies for the admin area and the site perimeter.
//!
//! There is no per-user identity and no server-side session store. A session
//! is either the admin secret itself (`SessionMode::SharedSecret`) or an
//! expiring token MAC'd with the admin secret (`SessionMode::Signed`). Both
//! modes fail closed: when no secret is configured, nothing validates.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::AuthenticationError;
use crate::mac;

/// Cookie checked by the perimeter gate on every page request.
pub const PERIMETER_COOKIE: &str = "auth_token";

/// Cookie authorizing admin-only API calls such as passkey registration.
pub const ADMIN_COOKIE: &str = "admin_token";

/// The shared admin secret (`ADMIN_PASSWORD`).
///
/// `Debug` never prints the value.
#[derive(Clone, Default)]
pub struct AdminSecret(String);

impl AdminSecret {
    /// Wraps a configured secret. An empty string means "not configured".
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns true if a non-empty secret is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.0.is_empty()
    }

    /// Compares `candidate` against the secret in constant time.
    ///
    /// Always false when the secret is not configured.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.is_configured() && bool::from(self.0.as_bytes().ct_eq(candidate.as_bytes()))
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    pub(crate) fn key(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_configured() {
            write!(f, "AdminSecret([redacted])")
        } else {
            write!(f, "AdminSecret(<unset>)")
        }
    }
}

/// Which session cookie is being checked or minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// The perimeter session (`auth_token`), minted after passkey login.
    Perimeter,
    /// The admin session (`admin_token`), minted after password login.
    Admin,
}

impl SessionKind {
    /// Returns the cookie name carrying this session.
    #[must_use]
    pub fn cookie_name(self) -> &'static str {
        match self {
            Self::Perimeter => PERIMETER_COOKIE,
            Self::Admin => ADMIN_COOKIE,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Perimeter => "auth",
            Self::Admin => "admin",
        }
    }
}

/// How session cookie values are formed and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// The cookie value is the admin secret itself.
    #[default]
    SharedSecret,
    /// The cookie value is `<expires_unix>.<mac>`, MAC'd with the admin secret.
    Signed,
}

/// Validates and mints session cookie values.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    secret: AdminSecret,
    mode: SessionMode,
    lifetime: Duration,
}

impl SessionPolicy {
    /// Creates a policy over the given secret.
    #[must_use]
    pub fn new(secret: AdminSecret, mode: SessionMode, lifetime: Duration) -> Self {
        Self {
            secret,
            mode,
            lifetime,
        }
    }

    /// Returns the admin secret.
    #[must_use]
    pub fn secret(&self) -> &AdminSecret {
        &self.secret
    }

    /// Returns the session mode.
    #[must_use]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Returns how long minted sessions (and their cookies) live.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Checks a session cookie value.
    ///
    /// # Errors
    ///
    /// Returns an error when the cookie is absent, the secret is unset, or the
    /// value does not verify.
    pub fn validate(
        &self,
        kind: SessionKind,
        cookie: Option<&str>,
    ) -> Result<(), AuthenticationError> {
        self.validate_at(kind, cookie, Utc::now())
    }

    /// Checks a session cookie value as of `now`.
    pub fn validate_at(
        &self,
        kind: SessionKind,
        cookie: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthenticationError> {
        if !self.secret.is_configured() {
            return Err(AuthenticationError::SecretNotConfigured);
        }
        let value = cookie.ok_or(AuthenticationError::MissingSession {
            cookie: kind.cookie_name(),
        })?;
        let valid = match self.mode {
            SessionMode::SharedSecret => self.secret.matches(value),
            SessionMode::Signed => self.verify_signed(kind, value, now),
        };
        if valid {
            Ok(())
        } else {
            Err(AuthenticationError::InvalidSession {
                cookie: kind.cookie_name(),
            })
        }
    }

    /// Produces a cookie value for a new session.
    ///
    /// # Errors
    ///
    /// Returns `SecretNotConfigured` when no admin secret is set.
    pub fn mint(&self, kind: SessionKind) -> Result<String, AuthenticationError> {
        self.mint_at(kind, Utc::now())
    }

    /// Produces a cookie value for a session starting at `now`.
    pub fn mint_at(
        &self,
        kind: SessionKind,
        now: DateTime<Utc>,
    ) -> Result<String, AuthenticationError> {
        if !self.secret.is_configured() {
            return Err(AuthenticationError::SecretNotConfigured);
        }
        match self.mode {
            SessionMode::SharedSecret => Ok(self.secret.expose().to_string()),
            SessionMode::Signed => {
                let expires = (now + self.lifetime).timestamp();
                let tag = mac::sign(self.secret.key(), signed_payload(kind, expires).as_bytes())
                    .ok_or(AuthenticationError::SecretNotConfigured)?;
                Ok(format!("{expires}.{}", URL_SAFE_NO_PAD.encode(tag)))
            }
        }
    }

    /// Checks a login password against the admin secret.
    ///
    /// # Errors
    ///
    /// `SecretNotConfigured` when unset, `InvalidPassword` on mismatch.
    pub fn check_password(&self, password: &str) -> Result<(), AuthenticationError> {
        if !self.secret.is_configured() {
            return Err(AuthenticationError::SecretNotConfigured);
        }
        if self.secret.matches(password) {
            Ok(())
        } else {
            Err(AuthenticationError::InvalidPassword)
        }
    }

    fn verify_signed(&self, kind: SessionKind, value: &str, now: DateTime<Utc>) -> bool {
        let Some((expires, tag)) = value.split_once('.') else {
            return false;
        };
        let Ok(expires) = expires.parse::<i64>() else {
            return false;
        };
        let Ok(tag) = URL_SAFE_NO_PAD.decode(tag) else {
            return false;
        };
        mac::verify(
            self.secret.key(),
            signed_payload(kind, expires).as_bytes(),
            &tag,
        ) && now.timestamp() < expires
    }
}

fn signed_payload(kind: SessionKind, expires: i64) -> String {
    format!("{}:{expires}", kind.label())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(secret: &str) -> SessionPolicy {
        SessionPolicy::new(
            AdminSecret::new(secret),
            SessionMode::SharedSecret,
            Duration::hours(24),
        )
    }

    fn signed(secret: &str) -> SessionPolicy {
        SessionPolicy::new(
            AdminSecret::new(secret),
            SessionMode::Signed,
            Duration::hours(24),
        )
    }

    #[test]
    fn shared_secret_accepts_exact_match_only() {
        let policy = shared("s3cret");
        assert!(policy.validate(SessionKind::Perimeter, Some("s3cret")).is_ok());
        assert_eq!(
            policy.validate(SessionKind::Perimeter, Some("wrong")),
            Err(AuthenticationError::InvalidSession {
                cookie: "auth_token"
            })
        );
        assert!(policy.validate(SessionKind::Perimeter, Some("s3cret ")).is_err());
        assert_eq!(
            policy.validate(SessionKind::Admin, None),
            Err(AuthenticationError::MissingSession {
                cookie: "admin_token"
            })
        );
    }

    #[test]
    fn empty_secret_rejects_everything() {
        let policy = shared("");
        assert_eq!(
            policy.validate(SessionKind::Perimeter, Some("")),
            Err(AuthenticationError::SecretNotConfigured)
        );
        assert_eq!(
            policy.mint(SessionKind::Admin),
            Err(AuthenticationError::SecretNotConfigured)
        );
        assert_eq!(
            policy.check_password(""),
            Err(AuthenticationError::SecretNotConfigured)
        );
    }

    #[test]
    fn shared_secret_mint_is_the_secret() {
        let policy = shared("s3cret");
        assert_eq!(policy.mint(SessionKind::Perimeter).expect("mint"), "s3cret");
    }

    #[test]
    fn signed_token_round_trips_until_expiry() {
        let policy = signed("s3cret");
        let now = Utc::now();
        let token = policy.mint_at(SessionKind::Perimeter, now).expect("mint");

        assert!(
            policy
                .validate_at(SessionKind::Perimeter, Some(&token), now)
                .is_ok()
        );
        assert!(
            policy
                .validate_at(
                    SessionKind::Perimeter,
                    Some(&token),
                    now + Duration::hours(25)
                )
                .is_err()
        );
    }

    #[test]
    fn signed_token_is_bound_to_kind_and_secret() {
        let policy = signed("s3cret");
        let token = policy.mint(SessionKind::Perimeter).expect("mint");

        assert!(policy.validate(SessionKind::Admin, Some(&token)).is_err());
        assert!(
            signed("other")
                .validate(SessionKind::Perimeter, Some(&token))
                .is_err()
        );
        // the raw secret is not a valid signed session
        assert!(policy.validate(SessionKind::Perimeter, Some("s3cret")).is_err());
    }

    #[test]
    fn signed_token_rejects_tampered_expiry() {
        let policy = signed("s3cret");
        let token = policy.mint(SessionKind::Admin).expect("mint");
        let (expires, tag) = token.split_once('.').expect("format");
        let extended: i64 = expires.parse::<i64>().expect("expiry") + 3600;
        let forged = format!("{extended}.{tag}");

        assert!(policy.validate(SessionKind::Admin, Some(&forged)).is_err());
    }

    #[test]
    fn password_check() {
        let policy = shared("s3cret");
        assert!(policy.check_password("s3cret").is_ok());
        assert_eq!(
            policy.check_password("nope"),
            Err(AuthenticationError::InvalidPassword)
        );
    }

    #[test]
    fn secret_debug_is_redacted() {
        let rendered = format!("{:?}", AdminSecret::new("s3cret"));
        assert!(!rendered.contains("s3cret"));
    }
}
