mod common;

use axum::http::{Method, StatusCode};
use basha_lagbe::store::Store;
use common::{legacy_listing, sectioned_listing, TestApp};
use serde_json::json;

#[tokio::test]
async fn new_listings_wait_for_moderation() {
    let app = TestApp::new();
    let (_, owner) = app.member("owner", "owner@example.com").await;
    let id = app.create_listing(&owner, legacy_listing("Mirpur flat", 15000)).await;

    let response = app.get("/api/listing/get", None).await;
    assert_eq!(response.body["total"], 0);

    let response = app.get(&format!("/api/listing/get/{}", id), None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.get(&format!("/api/listing/get/{}", id), Some(&owner)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["listing"]["status"], "pending");
}

#[tokio::test]
async fn moderation_publishes_and_notifies_the_owner() {
    let app = TestApp::new();
    let (owner_id, owner) = app.member("owner", "owner@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    let id = app.create_listing(&owner, legacy_listing("Mirpur flat", 15000)).await;

    app.approve(&admin, id).await;

    let response = app.get(&format!("/api/listing/get/{}", id), None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["owner"]["username"], "owner");
    assert_eq!(response.body["listing"]["performance"]["views"], 1);

    let notifications = app.state.store.list_notifications(owner_id, true).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind.as_str(), "moderation");
    app.wait_for_mail("owner@example.com", "is approved").await;
}

#[tokio::test]
async fn rejection_keeps_the_reason() {
    let app = TestApp::new();
    let (_, owner) = app.member("owner", "owner@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    let id = app.create_listing(&owner, legacy_listing("Mirpur flat", 15000)).await;

    let response = app
        .put(
            &format!("/api/admin/properties/{}/status", id),
            json!({ "status": "rejected", "reason": "Photos are missing" }),
            Some(&admin),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["listing"]["rejectionReason"], "Photos are missing");
}

#[tokio::test]
async fn members_cannot_reach_the_admin_area() {
    let app = TestApp::new();
    let (_, member) = app.member("rahim", "rahim@example.com").await;
    let response = app.get("/api/admin/dashboard", Some(&member)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn price_filter_spans_both_layouts() {
    let app = TestApp::new();
    let (_, owner) = app.member("owner", "owner@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    for payload in [
        legacy_listing("Cheap legacy", 8000),
        legacy_listing("Legacy in range", 15000),
        sectioned_listing("Sectioned in range", 18000),
        sectioned_listing("Dear sectioned", 40000),
    ] {
        let id = app.create_listing(&owner, payload).await;
        app.approve(&admin, id).await;
    }

    let response = app
        .get(
            "/api/listing/get?minPrice=10000&maxPrice=20000&sort=price&order=asc",
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["total"], 2);
    let listings = response.body["listings"].as_array().unwrap();
    assert_eq!(listings[0]["name"], "Legacy in range");
    assert_eq!(listings[1]["basicInfo"]["title"], "Sectioned in range");

    let response = app.get("/api/listing/get?searchTerm=banani&limit=1", None).await;
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["listings"].as_array().unwrap().len(), 1);

    let response = app.get("/api/listing/get?minPrice=5&maxPrice=1", None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn owner_edit_sends_listing_back_to_review() {
    let app = TestApp::new();
    let (_, owner) = app.member("owner", "owner@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    let id = app.create_listing(&owner, legacy_listing("Mirpur flat", 15000)).await;
    app.approve(&admin, id).await;

    let response = app
        .post(
            &format!("/api/listing/update/{}", id),
            json!({ "regularPrice": 16000 }),
            Some(&owner),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["listing"]["status"], "pending");
    assert_eq!(response.body["listing"]["name"], "Mirpur flat");
    assert_eq!(response.body["listing"]["regularPrice"], 16000);
}

#[tokio::test]
async fn strangers_cannot_edit_or_delete_listings() {
    let app = TestApp::new();
    let (_, owner) = app.member("owner", "owner@example.com").await;
    let (_, stranger) = app.member("stranger", "stranger@example.com").await;
    let id = app.create_listing(&owner, legacy_listing("Mirpur flat", 15000)).await;

    let response = app
        .post(
            &format!("/api/listing/update/{}", id),
            json!({ "regularPrice": 1 }),
            Some(&stranger),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/listing/delete/{}", id),
            None,
            Some(&stranger),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_inquiry_within_a_day_is_rejected() {
    let app = TestApp::new();
    let (owner_id, owner) = app.member("owner", "owner@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    let (_, tenant) = app.member("tenant", "tenant@example.com").await;
    let id = app.create_listing(&owner, legacy_listing("Mirpur flat", 15000)).await;
    app.approve(&admin, id).await;

    let body = json!({ "propertyId": id, "message": "Is it still available?" });
    let response = app.post("/api/inquiries", body.clone(), Some(&tenant)).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    let inquiry_id = response.body["inquiry"]["id"].as_str().unwrap().to_string();

    let response = app.post("/api/inquiries", body, Some(&tenant)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);

    let listing = app.state.store.find_property(id).await.unwrap().unwrap();
    assert_eq!(listing.performance_inquiries, 1);
    app.wait_for_mail("owner@example.com", "New inquiry").await;

    let response = app
        .put(
            &format!("/api/inquiries/{}/reply", inquiry_id),
            json!({ "reply": "Yes, come by on Friday" }),
            Some(&owner),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["inquiry"]["status"], "replied");
    app.wait_for_mail("tenant@example.com", "Reply to your inquiry").await;

    let received = app.state.store.list_inquiries_received(owner_id).await.unwrap();
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn one_review_per_listing() {
    let app = TestApp::new();
    let (_, owner) = app.member("owner", "owner@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    let (_, tenant) = app.member("tenant", "tenant@example.com").await;
    let id = app.create_listing(&owner, legacy_listing("Mirpur flat", 15000)).await;
    app.approve(&admin, id).await;

    let review = json!({ "rating": 4, "comment": "Bright and quiet" });
    let uri = format!("/api/review/{}", id);
    let response = app.post(&uri, review.clone(), Some(&tenant)).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    let response = app.post(&uri, review.clone(), Some(&tenant)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    let response = app.post(&uri, review, Some(&owner)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = app.get(&uri, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["totalReviews"], 1);
    assert_eq!(response.body["averageRating"], 4.0);
}

#[tokio::test]
async fn messages_build_a_conversation() {
    let app = TestApp::new();
    let (owner_id, owner) = app.member("owner", "owner@example.com").await;
    let (tenant_id, tenant) = app.member("tenant", "tenant@example.com").await;
    let (_, outsider) = app.member("outsider", "outsider@example.com").await;

    let response = app
        .post(
            "/api/messages",
            json!({ "receiverId": owner_id, "content": "Hello" }),
            Some(&tenant),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    let conversation = response.body["conversationId"].as_str().unwrap().to_string();

    let response = app.get("/api/messages/unread-count", Some(&owner)).await;
    assert_eq!(response.body["count"], 1);

    let uri = format!("/api/messages/conversations/{}", conversation);
    let response = app.get(&uri, Some(&owner)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(
        response.body["conversation"]["otherParticipant"]["id"],
        tenant_id.to_string()
    );

    let response = app.get("/api/messages/unread-count", Some(&owner)).await;
    assert_eq!(response.body["count"], 0);

    let response = app.get(&uri, Some(&outsider)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn public_stats_count_approved_listings_only() {
    let app = TestApp::new();
    let (_, owner) = app.member("owner", "owner@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    let approved = app.create_listing(&owner, sectioned_listing("Banani flat", 20000)).await;
    app.create_listing(&owner, legacy_listing("Pending flat", 9000)).await;
    app.approve(&admin, approved).await;

    let response = app.get("/api/stats", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["totalListings"], 1);
    assert_eq!(response.body["totalUsers"], 2);
    assert_eq!(response.body["totalCities"], 1);
}
