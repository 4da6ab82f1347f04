//! Centralized gateway configuration.
//!
//! Loaded via the `config` crate from an optional file (`config/gateway.*`,
//! overridable with `GATEWAY_CONFIG`) layered under environment variables.
//! Nested keys use `__` in the environment, e.g. `SESSION__SECURE_COOKIES`.

use chrono::Duration;
use config::ConfigError;
use serde::Deserialize;
use scensei_platform_access::SessionMode;
use std::path::PathBuf;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "GATEWAY_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/gateway";

/// Longest accepted session lifetime, in hours.
pub const MAX_SESSION_HOURS: i64 = 24 * 366;

/// Gateway configuration.
#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    /// Shared admin secret. Empty means every session check fails.
    #[serde(default)]
    pub admin_password: String,

    /// WebAuthn relying-party id.
    #[serde(default = "default_rp_id")]
    pub webauthn_rp_id: String,

    /// Origin browsers report in WebAuthn client data.
    #[serde(default = "default_origin")]
    pub webauthn_origin: String,

    /// Client secret for the identity provider.
    #[serde(default)]
    pub cognito_client_secret: String,

    /// Base URL of the speech API.
    #[serde(default)]
    pub perfume_api_url: Option<String>,

    /// Token endpoint settings.
    #[serde(default)]
    pub cognito: CognitoConfig,

    /// Address to bind.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Directory served for non-API paths.
    #[serde(default = "default_site_root")]
    pub site_root: PathBuf,

    /// Public login page.
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Identity-provider settings for the client-credentials exchange.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CognitoConfig {
    pub token_endpoint: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<String>,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// How session cookie values are produced and checked.
    #[serde(default)]
    pub mode: SessionMode,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,

    /// Session lifetime in hours.
    #[serde(default = "default_duration_hours")]
    pub duration_hours: i64,
}

fn default_rp_id() -> String {
    "localhost".to_string()
}

fn default_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_site_root() -> PathBuf {
    PathBuf::from("target/site")
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_secure_cookies() -> bool {
    true
}

fn default_duration_hours() -> i64 {
    24
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::default(),
            secure_cookies: default_secure_cookies(),
            duration_hours: default_duration_hours(),
        }
    }
}

impl SessionConfig {
    /// Returns the session lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error unless `duration_hours` is between 1 and
    /// [`MAX_SESSION_HOURS`].
    pub fn lifetime(&self) -> Result<Duration, ConfigError> {
        let hours = self.duration_hours;
        Some(hours)
            .filter(|hours| (1..=MAX_SESSION_HOURS).contains(hours))
            .and_then(Duration::try_hours)
            .ok_or_else(|| {
                ConfigError::Message(format!(
                    "session.duration_hours must be between 1 and {MAX_SESSION_HOURS}, got {hours}"
                ))
            })
    }
}

impl GatewayConfig {
    /// Loads configuration from the optional file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or a value has the wrong
    /// type.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Builds configuration from a single source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is malformed.
    pub fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    /// Returns the speech API URL when set and non-blank.
    #[must_use]
    pub fn speech_api_url(&self) -> Option<&str> {
        self.perfume_api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
