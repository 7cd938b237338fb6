mod common;

use axum::http::StatusCode;
use basha_lagbe::models::VerificationPurpose;
use basha_lagbe::store::Store;
use chrono::{Duration, Utc};
use common::{TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn health_answers_ok() {
    let app = TestApp::new();
    let response = app.get("/api/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new();
    app.signup("rahim", "rahim@example.com").await;

    let response = app
        .post(
            "/api/auth/signup",
            json!({ "username": "rahim2", "email": "Rahim@Example.com", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn signup_rejects_short_passwords() {
    let app = TestApp::new();
    let response = app
        .post(
            "/api/auth/signup",
            json!({ "username": "karim", "email": "karim@example.com", "password": "abc" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_cookie_opens_protected_routes() {
    let app = TestApp::new();
    let (id, cookie) = app.member("rahim", "rahim@example.com").await;

    let response = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["id"], id.to_string());
    assert!(response.body["user"].get("passwordHash").is_none());

    let response = app.get("/api/auth/me", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/api/auth/me", Some("access_token=garbage")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_sign_in_needs_the_emailed_code() {
    let app = TestApp::new();
    let (_, cookie) = app.admin("admin@example.com").await;

    let mail = app.wait_for_mail("admin@example.com", "sign-in code").await;
    assert!(mail.html.chars().filter(char::is_ascii_digit).count() >= 6);

    let response = app.get("/api/admin/dashboard", Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["stats"]["users"], 1);
}

#[tokio::test]
async fn second_factor_withholds_the_cookie() {
    let app = TestApp::new();
    let (id, cookie) = app.member("rahim", "rahim@example.com").await;
    let response = app
        .post("/api/user/two-factor", json!({ "enabled": true }), Some(&cookie))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    let response = app
        .post(
            "/api/auth/signin",
            json!({ "email": "rahim@example.com", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["requiresVerification"], true);
    assert_eq!(response.body["userId"], id.to_string());
    assert_eq!(response.body["email"], "ra***@example.com");
    assert!(response.cookie.is_none());
}

#[tokio::test]
async fn used_code_cannot_be_replayed() {
    let app = TestApp::new();
    let (id, _) = app.admin("admin@example.com").await;

    // The code consumed by the admin sign-in is gone.
    let response = app
        .post(
            "/api/auth/verify-login",
            json!({ "userId": id, "code": "000000" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_code_is_gone() {
    let app = TestApp::new();
    let id = app.signup("site admin", "admin@example.com").await;
    let mut user = app.state.store.find_user(id).await.unwrap().unwrap();
    user.role = basha_lagbe::models::Role::Admin;
    app.state.store.update_user(user).await.unwrap();

    app.post(
        "/api/auth/signin",
        json!({ "email": "admin@example.com", "password": PASSWORD }),
        None,
    )
    .await;
    let mut record = app
        .state
        .store
        .find_active_verification(id, VerificationPurpose::Login)
        .await
        .unwrap()
        .unwrap();
    record.expires_at = Utc::now() - Duration::minutes(1);
    let code = record.code.clone();
    app.state.store.update_verification(record).await.unwrap();

    let response = app
        .post(
            "/api/auth/verify-login",
            json!({ "userId": id, "code": code }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::GONE);
    assert!(response.cookie.is_none());
}

#[tokio::test]
async fn wrong_codes_burn_the_record() {
    let app = TestApp::new();
    let id = app.signup("site admin", "admin@example.com").await;
    let mut user = app.state.store.find_user(id).await.unwrap().unwrap();
    user.role = basha_lagbe::models::Role::Admin;
    app.state.store.update_user(user).await.unwrap();
    app.post(
        "/api/auth/signin",
        json!({ "email": "admin@example.com", "password": PASSWORD }),
        None,
    )
    .await;
    let real = app.active_code(id, VerificationPurpose::Login).await;
    let wrong = if real == "000000" { "111111" } else { "000000" };

    for _ in 0..4 {
        let response = app
            .post(
                "/api/auth/verify-login",
                json!({ "userId": id, "code": wrong }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }
    let response = app
        .post(
            "/api/auth/verify-login",
            json!({ "userId": id, "code": wrong }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);

    let response = app
        .post(
            "/api/auth/verify-login",
            json!({ "userId": id, "code": real }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn resend_is_throttled() {
    let app = TestApp::new();
    let (id, _) = app.admin("admin@example.com").await;
    app.post(
        "/api/auth/signin",
        json!({ "email": "admin@example.com", "password": PASSWORD }),
        None,
    )
    .await;

    let response = app
        .post(
            "/api/auth/resend-code",
            json!({ "userId": id, "purpose": "login" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
}

async fn sign_in(app: &TestApp, password: &str) -> StatusCode {
    app.post(
        "/api/auth/signin",
        json!({ "email": "rahim@example.com", "password": password }),
        None,
    )
    .await
    .status
}

#[tokio::test]
async fn repeated_wrong_passwords_lock_the_account() {
    let app = TestApp::new();
    app.signup("rahim", "rahim@example.com").await;

    for _ in 0..4 {
        assert_eq!(sign_in(&app, "wrong-password").await, StatusCode::UNAUTHORIZED);
    }
    assert_eq!(sign_in(&app, "wrong-password").await, StatusCode::LOCKED);
    assert_eq!(sign_in(&app, PASSWORD).await, StatusCode::LOCKED);
}

#[tokio::test]
async fn password_reset_flow() {
    let app = TestApp::new();
    let id = app.signup("rahim", "rahim@example.com").await;

    let response = app
        .post(
            "/api/auth/forgot-password",
            json!({ "email": "rahim@example.com" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let code = app.active_code(id, VerificationPurpose::PasswordReset).await;

    let response = app
        .post(
            "/api/auth/reset-password",
            json!({ "email": "rahim@example.com", "code": code, "newPassword": "fresh-pass" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    let response = app
        .post(
            "/api/auth/signin",
            json!({ "email": "rahim@example.com", "password": "fresh-pass" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.cookie.is_some());
}

#[tokio::test]
async fn unknown_email_gets_the_same_forgot_password_answer() {
    let app = TestApp::new();
    let response = app
        .post(
            "/api/auth/forgot-password",
            json!({ "email": "nobody@example.com" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
}

#[tokio::test]
async fn signout_clears_the_cookie() {
    let app = TestApp::new();
    let response = app.get("/api/auth/signout", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.cookie.as_deref(), Some("access_token="));
}
