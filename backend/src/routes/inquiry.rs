use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{load_property, parse_id, required_text};
use crate::auth::{authenticate, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::mail;
use crate::models::{Inquiry, InquiryStatus, NotificationKind, User};
use crate::notify::notify;
use crate::state::AppState;

const MAX_INQUIRY_CHARS: usize = 2000;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(create_inquiry))
        .route("/received", get(received))
        .route("/sent", get(sent))
        .route("/:id/reply", put(reply))
        .route("/:id/archive", put(archive))
        .route("/:id/read", put(mark_read))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryRequest {
    pub property_id: Uuid,
    pub message: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub reply: String,
}

/// Loads an inquiry the current user received.
async fn owned_inquiry(state: &AppState, user: &User, raw_id: &str) -> AppResult<Inquiry> {
    let inquiry = state
        .store
        .find_inquiry(parse_id(raw_id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Inquiry not found"))?;
    if inquiry.owner_id != user.id {
        return Err(AppError::forbidden("Only the listing owner can do that"));
    }
    Ok(inquiry)
}

pub async fn create_inquiry(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<InquiryRequest>,
) -> AppResult<impl IntoResponse> {
    let property = load_property(state.store.as_ref(), req.property_id).await?;
    if !property.is_public() {
        return Err(AppError::not_found("Listing not found"));
    }
    if property.owner_id == user.id {
        return Err(AppError::bad_request("You cannot send an inquiry about your own listing"));
    }
    let message = required_text(&req.message, "Message", MAX_INQUIRY_CHARS)?;

    let now = Utc::now();
    let duplicate = state
        .store
        .find_recent_inquiry(user.id, property.id, Inquiry::duplicate_window_start(now))
        .await?;
    if duplicate.is_some() {
        return Err(AppError::conflict(
            "You already sent an inquiry about this listing in the last 24 hours",
        ));
    }

    let inquiry = Inquiry {
        id: Uuid::new_v4(),
        property_id: property.id,
        owner_id: property.owner_id,
        sender_id: user.id,
        name: user.username.clone(),
        email: user.email.clone(),
        phone: req.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        message,
        status: InquiryStatus::Pending,
        reply: None,
        replied_at: None,
        read: false,
        created_at: now,
        updated_at: now,
    };
    let inquiry = state.store.insert_inquiry(inquiry).await?;

    state.store.increment_property_inquiries(property.id).await?;

    notify(
        state.store.as_ref(),
        property.owner_id,
        NotificationKind::Inquiry,
        "New inquiry",
        format!("{} asked about {}", user.username, property.display_title()),
        Some("/dashboard/inquiries".to_string()),
    )
    .await;
    if let Some(owner) = state.store.find_user(property.owner_id).await? {
        mail::dispatch(
            state.mailer.clone(),
            mail::inquiry_received(
                &owner.email,
                property.display_title(),
                &user.username,
                &inquiry.message,
            ),
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "inquiry": inquiry })),
    ))
}

pub async fn received(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let inquiries = state.store.list_inquiries_received(user.id).await?;
    Ok(Json(json!({ "success": true, "inquiries": inquiries })))
}

pub async fn sent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let inquiries = state.store.list_inquiries_sent(user.id).await?;
    Ok(Json(json!({ "success": true, "inquiries": inquiries })))
}

pub async fn reply(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ReplyRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let mut inquiry = owned_inquiry(&state, &user, &id).await?;
    let now = Utc::now();
    inquiry.reply = Some(required_text(&req.reply, "Reply", MAX_INQUIRY_CHARS)?);
    inquiry.status = InquiryStatus::Replied;
    inquiry.replied_at = Some(now);
    inquiry.read = true;
    inquiry.updated_at = now;
    let inquiry = state.store.update_inquiry(inquiry).await?;

    let title = state
        .store
        .find_property(inquiry.property_id)
        .await?
        .map(|p| p.display_title().to_string())
        .unwrap_or_else(|| "a listing".to_string());
    notify(
        state.store.as_ref(),
        inquiry.sender_id,
        NotificationKind::Inquiry,
        "Your inquiry was answered",
        format!("The owner of {} replied to your inquiry", title),
        Some("/dashboard/inquiries".to_string()),
    )
    .await;
    mail::dispatch(
        state.mailer.clone(),
        mail::inquiry_replied(&inquiry.email, &title, inquiry.reply.as_deref().unwrap_or_default()),
    );

    Ok(Json(json!({ "success": true, "inquiry": inquiry })))
}

pub async fn archive(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut inquiry = owned_inquiry(&state, &user, &id).await?;
    inquiry.status = InquiryStatus::Archived;
    inquiry.updated_at = Utc::now();
    let inquiry = state.store.update_inquiry(inquiry).await?;
    Ok(Json(json!({ "success": true, "inquiry": inquiry })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut inquiry = owned_inquiry(&state, &user, &id).await?;
    inquiry.read = true;
    inquiry.updated_at = Utc::now();
    let inquiry = state.store.update_inquiry(inquiry).await?;
    Ok(Json(json!({ "success": true, "inquiry": inquiry })))
}
