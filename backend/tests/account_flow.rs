mod common;

use axum::http::StatusCode;
use basha_lagbe::models::VerificationPurpose;
use basha_lagbe::store::Store;
use common::{legacy_listing, TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn malformed_bodies_get_the_error_envelope() {
    let app = TestApp::new();
    let response = app
        .post("/api/auth/signup", json!({ "email": "rahim@example.com" }), None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["statusCode"], 400);
    assert!(response.body["message"].as_str().unwrap().contains("username"));

    let (_, member) = app.member("rahim", "rahim@example.com").await;
    let response = app.get("/api/notifications?unreadOnly=maybe", Some(&member)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn deleting_an_account_removes_its_trail() {
    let app = TestApp::new();
    let (owner_id, owner) = app.member("owner", "owner@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    let (tenant_id, tenant) = app.member("tenant", "tenant@example.com").await;
    let id = app.create_listing(&owner, legacy_listing("Mirpur flat", 15000)).await;
    app.approve(&admin, id).await;

    let response = app
        .post(
            "/api/inquiries",
            json!({ "propertyId": id, "message": "Is it still available?" }),
            Some(&tenant),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    let response = app
        .post(
            "/api/messages",
            json!({ "receiverId": owner_id, "propertyId": id, "content": "Hello" }),
            Some(&tenant),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    app.post(&format!("/api/user/favorites/{}", id), json!({}), Some(&tenant))
        .await;

    let response = app
        .delete(&format!("/api/user/delete/{}", owner_id), Some(&owner))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.cookie.as_deref(), Some("access_token="));

    let store = &app.state.store;
    assert!(store.find_property(id).await.unwrap().is_none());
    assert!(store.list_inquiries_sent(tenant_id).await.unwrap().is_empty());
    assert!(store.list_conversations(tenant_id).await.unwrap().is_empty());
    assert_eq!(store.count_unread_messages(owner_id).await.unwrap(), 0);

    let response = app.get("/api/user/favorites", Some(&tenant)).await;
    assert_eq!(response.body["listings"], json!([]));

    let response = app.get("/api/auth/me", Some(&owner)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn email_change_needs_the_code_sent_to_the_new_address() {
    let app = TestApp::new();
    let (id, member) = app.member("rahim", "rahim@example.com").await;
    app.signup("karim", "karim@example.com").await;

    let response = app
        .post(
            "/api/user/change-email/request",
            json!({ "newEmail": "karim@example.com" }),
            Some(&member),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let response = app
        .post(
            "/api/user/change-email/request",
            json!({ "newEmail": "New.Rahim@Example.com" }),
            Some(&member),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["email"], "ne***@example.com");
    app.wait_for_mail("new.rahim@example.com", "Confirm your new email").await;

    let code = app.active_code(id, VerificationPurpose::EmailChange).await;
    let wrong = if code == "000000" { "111111" } else { "000000" };
    let response = app
        .post("/api/user/change-email/confirm", json!({ "code": wrong }), Some(&member))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .post("/api/user/change-email/confirm", json!({ "code": code }), Some(&member))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["user"]["email"], "new.rahim@example.com");

    let response = app
        .post(
            "/api/auth/signin",
            json!({ "email": "new.rahim@example.com", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn google_sign_in_creates_then_reuses_the_account() {
    let app = TestApp::new();
    let profile = json!({
        "name": "Karim Uddin",
        "email": "Karim@Gmail.com",
        "photo": "https://example.com/karim.png",
    });

    let response = app.post("/api/auth/google", profile.clone(), None).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert!(response.cookie.is_some());
    assert_eq!(response.body["user"]["email"], "karim@gmail.com");
    assert_eq!(response.body["user"]["authProvider"], "google");
    assert_eq!(response.body["user"]["avatar"], "https://example.com/karim.png");
    let id = response.body["user"]["id"].clone();

    let response = app.post("/api/auth/google", profile, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["id"], id);

    let response = app
        .post(
            "/api/auth/signin",
            json!({ "email": "karim@gmail.com", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn notifications_belong_to_their_recipient() {
    let app = TestApp::new();
    let (_, owner) = app.member("owner", "owner@example.com").await;
    let (_, stranger) = app.member("stranger", "stranger@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    let id = app.create_listing(&owner, legacy_listing("Mirpur flat", 15000)).await;
    app.approve(&admin, id).await;

    let response = app.get("/api/notifications", Some(&owner)).await;
    let notifications = response.body["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    let notification = notifications[0]["id"].as_str().unwrap().to_string();

    let read = format!("/api/notifications/{}/read", notification);
    let remove = format!("/api/notifications/{}", notification);
    let response = app.put(&read, json!({}), Some(&stranger)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let response = app.delete(&remove, Some(&stranger)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.get("/api/notifications/unread-count", Some(&owner)).await;
    assert_eq!(response.body["count"], 1);
    let response = app.put(&read, json!({}), Some(&owner)).await;
    assert_eq!(response.status, StatusCode::OK);
    let response = app.get("/api/notifications/unread-count", Some(&owner)).await;
    assert_eq!(response.body["count"], 0);
    let response = app.get("/api/notifications?unreadOnly=true", Some(&owner)).await;
    assert_eq!(response.body["notifications"], json!([]));
    let response = app.put("/api/notifications/read-all", json!({}), Some(&owner)).await;
    assert_eq!(response.body["updated"], 0);

    let response = app.delete(&remove, Some(&owner)).await;
    assert_eq!(response.status, StatusCode::OK);
    let response = app.get("/api/notifications", Some(&owner)).await;
    assert_eq!(response.body["notifications"], json!([]));
}

#[tokio::test]
async fn admins_manage_users_but_not_themselves() {
    let app = TestApp::new();
    let (member_id, _) = app.member("rahim", "rahim@example.com").await;
    let (admin_id, admin) = app.admin("admin@example.com").await;

    let response = app.get("/api/admin/users", Some(&admin)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    let response = app.get("/api/admin/users?search=RAHIM", Some(&admin)).await;
    assert_eq!(response.body["total"], 1);

    let response = app
        .get("/api/admin/users?page=9223372036854775807", Some(&admin))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["users"], json!([]));

    let response = app
        .put(
            &format!("/api/admin/users/{}/role", member_id),
            json!({ "role": "admin" }),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["user"]["role"], "admin");

    let response = app
        .put(
            &format!("/api/admin/users/{}/role", admin_id),
            json!({ "role": "user" }),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let response = app
        .delete(&format!("/api/admin/users/{}", admin_id), Some(&admin))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = app
        .delete(&format!("/api/admin/users/{}", member_id), Some(&admin))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(app.state.store.find_user(member_id).await.unwrap().is_none());
}
