use axum::{
    extract::{Path, State},
    middleware,
    routing::{delete, get, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::parse_id;
use crate::auth::{authenticate, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::extract::{Json, Query};
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/read-all", put(mark_all_read))
        .route("/:id/read", put(mark_read))
        .route("/:id", delete(delete_notification))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub unread_only: Option<bool>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let notifications = state
        .store
        .list_notifications(user.id, query.unread_only.unwrap_or(false))
        .await?;
    Ok(Json(json!({ "success": true, "notifications": notifications })))
}

pub async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let count = state.store.count_unread_notifications(user.id).await?;
    Ok(Json(json!({ "success": true, "count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    if !state.store.mark_notification_read(parse_id(&id)?, user.id).await? {
        return Err(AppError::not_found("Notification not found"));
    }
    Ok(Json(json!({ "success": true })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let updated = state.store.mark_all_notifications_read(user.id).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    if !state.store.delete_notification(parse_id(&id)?, user.id).await? {
        return Err(AppError::not_found("Notification not found"));
    }
    Ok(Json(json!({ "success": true, "message": "Notification deleted" })))
}
