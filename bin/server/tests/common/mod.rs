#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use config::{File, FileFormat};
use rootcause::Report;
use scensei_integration::{CredentialError, ServiceCredentialCache, ServiceToken, TokenExchange};
use scensei_server::{
    app::{self, AppState},
    config::GatewayConfig,
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const SECRET: &str = "s3cret";
pub const ORIGIN: &str = "http://localhost:3000";

/// A router over a temporary site directory.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    _site: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Parses a TOML config, turning off secure cookies for plain-HTTP tests.
pub fn config_from(toml: &str) -> GatewayConfig {
    let mut config = GatewayConfig::from_source(File::from_str(toml, FileFormat::Toml)).unwrap();
    config.session.secure_cookies = false;
    config
}

/// Config with the given admin password and nothing else.
pub fn config_with_secret(secret: &str) -> GatewayConfig {
    config_from(&format!("admin_password = \"{secret}\""))
}

pub fn test_app(config: GatewayConfig) -> TestApp {
    build(AppState::from_config(&config).unwrap())
}

pub fn test_app_with_credentials(
    config: GatewayConfig,
    credentials: ServiceCredentialCache,
) -> TestApp {
    build(
        AppState::from_config(&config)
            .unwrap()
            .with_credentials(credentials),
    )
}

fn build(state: AppState) -> TestApp {
    let site = tempfile::tempdir().unwrap();
    std::fs::write(site.path().join("index.html"), "<h1>Scensei</h1>").unwrap();
    std::fs::write(site.path().join("favicon.ico"), [0u8; 4]).unwrap();

    let state = Arc::new(state);
    let router = app::router(state.clone(), site.path());
    TestApp {
        router,
        state,
        _site: site,
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, cookie: Option<&str>, body: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// All `Set-Cookie` header values on a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// The `Set-Cookie` header for `name`, if any.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response)
        .into_iter()
        .find(|cookie| cookie.starts_with(&prefix))
}

/// The value assigned to `name` by a `Set-Cookie` header.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookie(response, name).map(|cookie| {
        cookie[name.len() + 1..]
            .split(';')
            .next()
            .unwrap_or_default()
            .to_string()
    })
}

/// Exchange that always fails.
pub struct FailingExchange;

#[async_trait]
impl TokenExchange for FailingExchange {
    async fn exchange(&self) -> Result<ServiceToken, Report<CredentialError>> {
        Err(CredentialError::ExchangeFailed {
            endpoint: "https://auth.example.com/oauth2/token".to_string(),
            reason: "connection refused".to_string(),
        }
        .into())
    }
}

/// Cache holding a fresh token that never needs an exchange.
pub fn seeded_cache(token: &str) -> ServiceCredentialCache {
    ServiceCredentialCache::with_token(
        Box::new(FailingExchange),
        ServiceToken::new(
            token,
            chrono::Utc::now() + chrono::Duration::hours(1),
            "https://auth.example.com/oauth2/token",
            "perfume-api/tts",
        ),
    )
}
