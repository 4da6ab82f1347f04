//! Service-to-service credential cache.
//!
//! Holds one bearer token per process for calling the backend speech API.
//! The token is obtained lazily and re-issued in full once it comes within
//! five minutes of expiry.
//!
//! The cache takes no lock across the exchange itself. Concurrent callers
//! that all see a stale token each perform their own exchange and the last
//! write wins; every write is equivalent because scope and client are fixed.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

use crate::error::CredentialError;

/// Tokens are refreshed this long before they actually expire.
pub const REFRESH_SKEW_MINUTES: i64 = 5;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// A cached bearer credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceToken {
    access_token: String,
    expires_at: DateTime<Utc>,
    token_endpoint: String,
    scope: String,
}

impl ServiceToken {
    /// Creates a token expiring at `expires_at`.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        token_endpoint: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
            token_endpoint: token_endpoint.into(),
            scope: scope.into(),
        }
    }

    /// Creates a token issued at `issued_at` from an `expires_in` value.
    ///
    /// A missing `expires_in` means [`DEFAULT_EXPIRES_IN_SECS`]. Lifetimes past
    /// the representable range are clamped to the latest representable time.
    #[must_use]
    pub fn from_expires_in(
        access_token: impl Into<String>,
        expires_in: Option<u64>,
        issued_at: DateTime<Utc>,
        token_endpoint: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        let secs = expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let expires_at = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(access_token, expires_at, token_endpoint, scope)
    }

    /// Returns the bearer token.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the absolute expiry.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the endpoint that issued the token.
    #[must_use]
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Returns the granted scope.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns true while `now < expires_at - 5 minutes`.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::minutes(REFRESH_SKEW_MINUTES))
            .is_some_and(|deadline| now < deadline)
    }
}

impl std::fmt::Debug for ServiceToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceToken")
            .field("access_token", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .field("token_endpoint", &self.token_endpoint)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Source of fresh service tokens.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Performs one token exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider cannot be reached or rejects
    /// the request. Implementations must not retry.
    async fn exchange(&self) -> Result<ServiceToken, Report<CredentialError>>;
}

/// Process-wide cache of the service token.
pub struct ServiceCredentialCache {
    exchange: Box<dyn TokenExchange>,
    cached: RwLock<Option<ServiceToken>>,
}

impl ServiceCredentialCache {
    /// Creates an empty cache backed by `exchange`.
    #[must_use]
    pub fn new(exchange: Box<dyn TokenExchange>) -> Self {
        Self {
            exchange,
            cached: RwLock::new(None),
        }
    }

    /// Creates a cache pre-seeded with `token`.
    #[must_use]
    pub fn with_token(exchange: Box<dyn TokenExchange>, token: ServiceToken) -> Self {
        Self {
            exchange,
            cached: RwLock::new(Some(token)),
        }
    }

    /// Returns a usable bearer token, exchanging for a new one when needed.
    ///
    /// # Errors
    ///
    /// Returns the exchange error. The cached token is left untouched.
    pub async fn get_token(&self) -> scensei_core::Result<String, CredentialError> {
        if let Some(token) = self.fresh_token(Utc::now()) {
            return Ok(token);
        }

        tracing::debug!("service token missing or near expiry, exchanging");
        let token = self.exchange.exchange().await?;
        let access_token = token.access_token().to_string();
        tracing::info!(
            token_endpoint = %token.token_endpoint(),
            expires_at = %token.expires_at(),
            "obtained service token"
        );

        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(access_token)
    }

    #[cfg(test)]
    fn cached(&self) -> Option<ServiceToken> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fresh_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|token| token.is_fresh_at(now))
            .map(|token| token.access_token().to_string())
    }
}
