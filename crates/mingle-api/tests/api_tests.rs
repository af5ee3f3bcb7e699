//! API integration tests
//!
//! Exercises the full HTTP surface against an in-memory account store and a
//! recording email transport. The federated login tests run against a stub
//! identity provider bound to a local port.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::get,
    Json, Router,
};
use mingle_api::auth::AccountStore;
use mingle_api::test_support::{build_test_app, create_router_for_testing, TestApp};
use mingle_core::AppConfig;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Helper to create a JSON request
fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn register_body(username: &str, email: &str) -> Value {
    json!({
        "display_name": "Alice Example",
        "username": username,
        "email": email,
        "password": "SecureP@ssw0rd1",
    })
}

fn login_body(email: &str) -> Value {
    json!({
        "email": email,
        "password": "SecureP@ssw0rd1",
    })
}

/// Pull the verification token out of the last recorded email body
fn verification_token(app: &TestApp) -> String {
    let sent = app.mailer.sent();
    let body = &sent.last().expect("no verification email sent").html_body;
    let start = body.find("token=").unwrap() + "token=".len();
    let end = body[start..].find('&').unwrap() + start;
    body[start..end].to_string()
}

/// Pull the refresh token value out of a Set-Cookie header
fn refresh_cookie_value(response: &axum::response::Response) -> String {
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("no Set-Cookie header")
        .to_str()
        .unwrap();
    let value = cookie
        .strip_prefix("refreshToken=")
        .expect("unexpected cookie name");
    value.split(';').next().unwrap().to_string()
}

/// Register and confirm an account, returning nothing; panics on failure
async fn register_and_confirm(app: &TestApp, username: &str, email: &str) {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/register",
            Some(register_body(username, email)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let token = verification_token(app);
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/account/verify-email?token={token}&email={email}"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Log in and return (session bundle, refresh cookie value)
async fn login(app: &TestApp, email: &str) -> (Value, String) {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/login",
            Some(login_body(email)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = refresh_cookie_value(&response);
    (response_json(response).await, cookie)
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_sends_verification_email() {
    let app = build_test_app(AppConfig::default());

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/register",
            Some(register_body("alice", "a@x.com")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(
        body["message"],
        "Registration success - please verify your email"
    );

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "a@x.com");
    assert!(sent[0].html_body.contains("/verify?token="));
}

#[tokio::test]
async fn test_register_duplicate_email_returns_field_error() {
    let app = build_test_app(AppConfig::default());

    let first = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/register",
            Some(register_body("alice", "a@x.com")),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/register",
            Some(register_body("alice2", "a@x.com")),
        ))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);

    let body = response_json(second).await;
    assert_eq!(body["errors"]["email"][0], "Email taken");
}

#[tokio::test]
async fn test_register_invalid_email_rejected() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/account/register",
            Some(register_body("alice", "not-an-email")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["errors"]["email"].is_array());
}

// =============================================================================
// Email verification and login
// =============================================================================

#[tokio::test]
async fn test_login_before_confirmation_is_unauthorized() {
    let app = build_test_app(AppConfig::default());

    app.router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/register",
            Some(register_body("alice", "a@x.com")),
        ))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/login",
            Some(login_body("a@x.com")),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Email not confirmed");
}

#[tokio::test]
async fn test_full_registration_and_login_flow() {
    let app = build_test_app(AppConfig::default());
    register_and_confirm(&app, "alice", "a@x.com").await;

    let (bundle, cookie) = login(&app, "a@x.com").await;

    assert_eq!(bundle["username"], "alice");
    assert_eq!(bundle["display_name"], "Alice Example");
    assert!(bundle["token"].is_string());
    // No image on a fresh local account: the field is absent, not null
    assert!(bundle.get("image").is_none());
    assert!(!cookie.is_empty());
}

#[tokio::test]
async fn test_verify_email_with_bad_token_is_recoverable() {
    let app = build_test_app(AppConfig::default());

    app.router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/register",
            Some(register_body("alice", "a@x.com")),
        ))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/verify-email?token=bm90LXRoZS1zZWNyZXQ&email=a@x.com",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["code"], "COULD_NOT_VERIFY");
}

#[tokio::test]
async fn test_verify_email_unknown_address_is_unauthorized() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/v1/account/verify-email?token=abc&email=ghost@x.com",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_resend_confirmation_link() {
    let app = build_test_app(AppConfig::default());

    app.router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/register",
            Some(register_body("alice", "a@x.com")),
        ))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "GET",
            "/api/v1/account/resend-email-confirmation-link?email=a@x.com",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.mailer.sent().len(), 2);

    // The re-sent link supersedes the first one and still confirms
    let token = verification_token(&app);
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/account/verify-email?token={token}&email=a@x.com"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_resend_confirmation_unknown_email_is_unauthorized() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(json_request(
            "GET",
            "/api/v1/account/resend-email-confirmation-link?email=ghost@x.com",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Session refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_the_cookie() {
    let app = build_test_app(AppConfig::default());
    register_and_confirm(&app, "alice", "a@x.com").await;
    let (bundle, cookie) = login(&app, "a@x.com").await;
    let access_token = bundle["token"].as_str().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/account/refresh-token")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .header(header::COOKIE, format!("refreshToken={cookie}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let rotated = refresh_cookie_value(&response);
    assert_ne!(rotated, cookie);

    // Replaying the spent token must fail
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/account/refresh-token")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .header(header::COOKIE, format!("refreshToken={cookie}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_without_cookie_is_unauthorized() {
    let app = build_test_app(AppConfig::default());
    register_and_confirm(&app, "alice", "a@x.com").await;
    let (bundle, _cookie) = login(&app, "a@x.com").await;
    let access_token = bundle["token"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/account/refresh-token")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_without_bearer_token_is_unauthorized() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/account/refresh-token")
                .header(header::COOKIE, "refreshToken=whatever")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Current user
// =============================================================================

#[tokio::test]
async fn test_current_user_returns_bundle_and_fresh_cookie() {
    let app = build_test_app(AppConfig::default());
    register_and_confirm(&app, "alice", "a@x.com").await;
    let (bundle, login_cookie) = login(&app, "a@x.com").await;
    let access_token = bundle["token"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/account")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let fresh_cookie = refresh_cookie_value(&response);
    assert_ne!(fresh_cookie, login_cookie);

    let body = response_json(response).await;
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn test_current_user_requires_authentication() {
    let app = create_router_for_testing();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/account")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Federated login (stub identity provider)
// =============================================================================

/// Spawn a stub Graph API on a local port
///
/// `token_valid` controls the introspection outcome; the profile endpoint
/// always answers with the same identity.
async fn spawn_stub_provider(token_valid: bool) -> String {
    let debug_token = move || async move {
        if token_valid {
            (
                StatusCode::OK,
                Json(json!({"data": {"is_valid": true, "app_id": "test-app"}})),
            )
        } else {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"message": "Invalid OAuth access token"}})),
            )
        }
    };

    let me = || async {
        Json(json!({
            "id": "fb-10203040",
            "name": "Fed User",
            "email": "fed@example.com",
            "picture": {"data": {"url": "https://cdn.example.com/fed.jpg"}}
        }))
    };

    let stub = Router::new()
        .route("/debug_token", get(debug_token))
        .route("/me", get(me));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, stub).await.unwrap();
    });

    format!("http://{addr}")
}

fn config_with_provider(base_url: String) -> AppConfig {
    let mut config = AppConfig::default();
    config.facebook.app_id = "test-app".to_string();
    config.facebook.app_secret = "test-secret".to_string();
    config.facebook.graph_base_url = base_url;
    config
}

#[tokio::test]
async fn test_fb_login_provisions_account_and_issues_session() {
    let base_url = spawn_stub_provider(true).await;
    let app = build_test_app(config_with_provider(base_url));

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/fb-login?access_token=provider-token",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = refresh_cookie_value(&response);
    assert!(!cookie.is_empty());

    let body = response_json(response).await;
    assert_eq!(body["username"], "fed@example.com");
    assert_eq!(body["display_name"], "Fed User");
    assert_eq!(body["image"], "https://cdn.example.com/fed.jpg");

    // Provider trust substitutes for local confirmation: the new account
    // can immediately establish sessions
    let account = app.store.find_by_email("fed@example.com").await.unwrap();
    assert!(account.email_confirmed);
    assert!(account.password_hash.is_none());
}

#[tokio::test]
async fn test_fb_login_is_idempotent_on_email() {
    let base_url = spawn_stub_provider(true).await;
    let app = build_test_app(config_with_provider(base_url));

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/account/fb-login?access_token=provider-token",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(app.store.account_count().await, 1);
}

#[tokio::test]
async fn test_fb_login_rejected_token_creates_nothing() {
    let base_url = spawn_stub_provider(false).await;
    let app = build_test_app(config_with_provider(base_url));

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/fb-login?access_token=forged-token",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.account_count().await, 0);
}

#[tokio::test]
async fn test_fb_login_unreachable_provider_is_recoverable() {
    // Nothing listens on this port: the transport-level failure must surface
    // as a retryable provider error, not Unauthorized
    let app = build_test_app(config_with_provider(
        "http://127.0.0.1:1".to_string(),
    ));

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/account/fb-login?access_token=provider-token",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(app.store.account_count().await, 0);
}
