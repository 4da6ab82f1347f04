#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{SECRET, config_with_secret, json_body, post_json, set_cookie, test_app};
use scensei_server::app::AppState;
use serde_json::json;

#[tokio::test]
async fn login_without_configured_secret_is_server_error() {
    let app = test_app(config_with_secret(""));

    let response = app
        .send(post_json("/api/admin/auth", None, &json!({ "password": "anything" })))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&response, "admin_token").is_none());
    let body = json_body(response).await;
    assert_eq!(body["error"], "Admin password not configured");
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let app = test_app(config_with_secret(SECRET));

    let response = app
        .send(post_json("/api/admin/auth", None, &json!({ "password": "nope" })))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response, "admin_token").is_none());
    let body = json_body(response).await;
    assert_eq!(body["error"], "Invalid password");
}

#[tokio::test]
async fn login_without_password_is_unauthorized() {
    let app = test_app(config_with_secret(SECRET));

    let response = app
        .send(post_json("/api/admin/auth", None, &json!({})))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_sets_admin_cookie() {
    let app = test_app(config_with_secret(SECRET));

    let response = app
        .send(post_json("/api/admin/auth", None, &json!({ "password": SECRET })))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response, "admin_token").expect("admin cookie");
    assert!(cookie.starts_with("admin_token=s3cret"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=86400"));
    assert!(!cookie.contains("Secure"));

    let body = json_body(response).await;
    assert_eq!(body, json!({ "success": true }));
}

#[tokio::test]
async fn secure_flag_follows_config() {
    let mut config = config_with_secret(SECRET);
    config.session.secure_cookies = true;
    let app = test_app(config);

    let response = app
        .send(post_json("/api/admin/auth", None, &json!({ "password": SECRET })))
        .await;

    let cookie = set_cookie(&response, "admin_token").expect("admin cookie");
    assert!(cookie.contains("Secure"));
}

#[tokio::test]
async fn logout_clears_admin_cookie() {
    let app = test_app(config_with_secret(SECRET));

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/admin/auth")
        .header("cookie", "admin_token=s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response, "admin_token").expect("removal cookie");
    assert!(cookie.starts_with("admin_token=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn other_methods_are_not_allowed() {
    let app = test_app(config_with_secret(SECRET));

    let request = Request::builder()
        .method("PUT")
        .uri("/api/admin/auth")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Method not allowed");
}

#[tokio::test]
async fn absurd_session_lifetime_fails_state_construction() {
    let mut config = config_with_secret(SECRET);
    config.session.duration_hours = i64::MAX;

    let err = AppState::from_config(&config).err().expect("rejected");
    assert!(err.to_string().contains("duration_hours"));
}
