use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{load_property, load_user, parse_id, required_text};
use crate::auth::{authenticate, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::models::message::MAX_MESSAGE_CHARS;
use crate::models::{Conversation, Message, NotificationKind, PublicProfile};
use crate::notify::notify;
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(send_message))
        .route("/conversations", get(list_conversations))
        .route("/conversations/:id", get(get_conversation))
        .route("/unread-count", get(unread_count))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub property_id: Option<Uuid>,
    pub content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_participant: Option<PublicProfile>,
}

pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    if req.receiver_id == user.id {
        return Err(AppError::bad_request("You cannot message yourself"));
    }
    let content = required_text(&req.content, "Message", MAX_MESSAGE_CHARS)?;
    let receiver = load_user(state.store.as_ref(), req.receiver_id).await?;
    if let Some(property_id) = req.property_id {
        load_property(state.store.as_ref(), property_id).await?;
    }

    let now = Utc::now();
    let mut conversation = match state
        .store
        .find_conversation_between(user.id, receiver.id, req.property_id)
        .await?
    {
        Some(conversation) => conversation,
        None => {
            let conversation = Conversation::new(user.id, receiver.id, req.property_id, now);
            state.store.insert_conversation(conversation).await?
        }
    };

    let message = Message {
        id: Uuid::new_v4(),
        conversation_id: conversation.id,
        sender_id: user.id,
        receiver_id: receiver.id,
        content,
        read: false,
        created_at: now,
    };
    let message = state.store.insert_message(message).await?;
    conversation.record_message(&message.content, now);
    let conversation = state.store.update_conversation(conversation).await?;

    notify(
        state.store.as_ref(),
        receiver.id,
        NotificationKind::Message,
        "New message",
        format!("{} sent you a message", user.username),
        Some(format!("/messages/{}", conversation.id)),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": message,
            "conversationId": conversation.id,
        })),
    ))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let conversations = state.store.list_conversations(user.id).await?;
    let mut summaries = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let other = state
            .store
            .find_user(conversation.other_participant(user.id))
            .await?
            .map(|u| u.to_profile());
        summaries.push(ConversationSummary {
            conversation,
            other_participant: other,
        });
    }
    Ok(Json(json!({ "success": true, "conversations": summaries })))
}

/// Thread view. Reading it marks the reader's incoming messages as read.
pub async fn get_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let conversation = state
        .store
        .find_conversation(parse_id(&id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Conversation not found"))?;
    if !conversation.includes(user.id) {
        return Err(AppError::forbidden("You are not part of this conversation"));
    }
    state
        .store
        .mark_conversation_read(conversation.id, user.id)
        .await?;
    let messages = state.store.list_messages(conversation.id).await?;
    let other = state
        .store
        .find_user(conversation.other_participant(user.id))
        .await?
        .map(|u| u.to_profile());

    Ok(Json(json!({
        "success": true,
        "conversation": ConversationSummary {
            conversation,
            other_participant: other,
        },
        "messages": messages,
    })))
}

pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let count = state.store.count_unread_messages(user.id).await?;
    Ok(Json(json!({ "success": true, "count": count })))
}
