mod common;

use axum::http::{Method, StatusCode};
use common::{cookie_pair, TestApp, TEST_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn signup_returns_sanitized_user() {
    let app = TestApp::spawn();

    let response = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "username": "ada",
                "email": "ada@example.com",
                "password": TEST_PASSWORD
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["user"]["username"], "ada");
    assert_eq!(response.body["user"]["email"], "ada@example.com");
    assert!(response.body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = TestApp::spawn();
    app.session_for("ada").await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({
                "username": "ada",
                "email": "someone@example.com",
                "password": TEST_PASSWORD
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn short_password_fails_validation() {
    let app = TestApp::spawn();

    let response = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "username": "ada", "email": "ada@example.com", "password": "short" })),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn login_sets_http_only_session_cookie() {
    let app = TestApp::spawn();
    app.session_for("ada").await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": TEST_PASSWORD })),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let cookie = response.set_cookie.unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
}

#[tokio::test]
async fn bad_password_is_unauthorized() {
    let app = TestApp::spawn();
    app.session_for("ada").await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "not the password" })),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(response.set_cookie.is_none());
}

#[tokio::test]
async fn protected_routes_require_a_valid_session() {
    let app = TestApp::spawn();

    let missing = app.request(Method::GET, "/api/boards", None, None).await;
    let forged = app
        .request(Method::GET, "/api/boards", Some("session=forged.token.value"), None)
        .await;

    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_expires_the_cookie() {
    let app = TestApp::spawn();
    let session = app.session_for("ada").await;

    let response = app
        .request(Method::POST, "/api/auth/logout", Some(&session), None)
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let cleared = response.set_cookie.unwrap();
    assert_eq!(cookie_pair(&cleared), "session=");
    assert!(cleared.contains("Max-Age=0"));
}
