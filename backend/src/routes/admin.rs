use axum::{
    extract::{Path, State},
    middleware,
    routing::{delete, get, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::listing::delete_listing;
use super::user::delete_account;
use super::{load_property, load_user, parse_id};
use crate::auth::{authenticate, require_admin, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::extract::{Json, Query};
use crate::mail;
use crate::models::{NotificationKind, PropertyStatus, Role};
use crate::notify::notify;
use crate::search::PropertyFilter;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/:id/role", put(set_role))
        .route("/users/:id", delete(remove_user))
        .route("/properties", get(list_properties))
        .route("/properties/:id/status", put(moderate))
        .route("/properties/:id", delete(remove_property))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

#[derive(Deserialize, Default)]
pub struct UserQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize, Default)]
pub struct PropertyQuery {
    pub status: Option<PropertyStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Deserialize)]
pub struct ModerationRequest {
    pub status: PropertyStatus,
    pub reason: Option<String>,
}

/// 1-based page, clamped page size and the row offset they give. The page is
/// capped so the offset always fits in an `i64`.
fn paging(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = page.unwrap_or(1).clamp(1, i64::MAX / limit);
    (page, limit, (page - 1) * limit)
}

pub async fn dashboard(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let listings = state.store.property_stats().await?;
    Ok(Json(json!({
        "success": true,
        "stats": {
            "users": state.store.count_users().await?,
            "listings": {
                "total": listings.total,
                "draft": listings.draft,
                "pending": listings.pending,
                "approved": listings.approved,
                "rejected": listings.rejected,
            },
            "reviews": state.store.count_reviews().await?,
            "inquiries": state.store.count_inquiries().await?,
            "applications": state.store.count_applications().await?,
        },
    })))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let (page, limit, offset) = paging(query.page, query.limit);
    let search = query
        .search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let (users, total) = state.store.list_users(search, offset, limit).await?;
    let users: Vec<_> = users.iter().map(|u| u.to_public()).collect();
    Ok(Json(json!({
        "success": true,
        "users": users,
        "total": total,
        "page": page,
        "limit": limit,
    })))
}

pub async fn set_role(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<RoleRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    if id == admin.id {
        return Err(AppError::bad_request("You cannot change your own role"));
    }
    let mut user = load_user(state.store.as_ref(), id).await?;
    user.role = req.role;
    user.updated_at = Utc::now();
    let user = state.store.update_user(user).await?;
    log::info!("Admin {} set role of {} to {}", admin.id, user.id, user.role);
    Ok(Json(json!({ "success": true, "user": user.to_public() })))
}

pub async fn remove_user(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    if id == admin.id {
        return Err(AppError::bad_request("You cannot delete your own account here"));
    }
    load_user(state.store.as_ref(), id).await?;
    delete_account(state.store.as_ref(), id).await?;
    log::info!("Admin {} deleted user {}", admin.id, id);
    Ok(Json(json!({ "success": true, "message": "User deleted" })))
}

pub async fn list_properties(
    State(state): State<AppState>,
    Query(query): Query<PropertyQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let (page, limit, offset) = paging(query.page, query.limit);
    let filter = PropertyFilter {
        status: query.status,
        limit,
        offset,
        ..PropertyFilter::default()
    };
    let result = state.store.search_properties(filter).await?;
    let listings: Vec<_> = result.listings.iter().map(|p| p.to_view()).collect();
    Ok(Json(json!({
        "success": true,
        "listings": listings,
        "total": result.total,
        "page": page,
        "limit": limit,
    })))
}

/// Sets a listing's moderation status and tells the owner.
pub async fn moderate(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ModerationRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let mut property = load_property(state.store.as_ref(), parse_id(&id)?).await?;
    let reason = req
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    property.status = req.status;
    property.rejection_reason = match req.status {
        PropertyStatus::Rejected => reason,
        _ => None,
    };
    property.updated_at = Utc::now();
    let property = state.store.update_property(property).await?;
    log::info!(
        "Admin {} moved listing {} to {}",
        admin.id,
        property.id,
        property.status
    );

    let title = property.display_title().to_string();
    let body = match &property.rejection_reason {
        Some(reason) => format!("{} is now {}: {}", title, property.status, reason),
        None => format!("{} is now {}", title, property.status),
    };
    notify(
        state.store.as_ref(),
        property.owner_id,
        NotificationKind::Moderation,
        "Listing status updated",
        body,
        Some(format!("/listing/{}", property.id)),
    )
    .await;
    if let Some(owner) = state.store.find_user(property.owner_id).await? {
        mail::dispatch(
            state.mailer.clone(),
            mail::listing_moderated(
                &owner.email,
                &title,
                property.status.as_str(),
                property.rejection_reason.as_deref(),
            ),
        );
    }

    Ok(Json(json!({ "success": true, "listing": property.to_view() })))
}

pub async fn remove_property(
    State(state): State<AppState>,
    CurrentUser(admin): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    delete_listing(state.store.as_ref(), id).await?;
    log::info!("Admin {} deleted listing {}", admin.id, id);
    Ok(Json(json!({ "success": true, "message": "Listing deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_defaults_and_clamps() {
        assert_eq!(paging(None, None), (1, DEFAULT_PAGE_SIZE, 0));
        assert_eq!(paging(Some(0), Some(1000)), (1, MAX_PAGE_SIZE, 0));
        assert_eq!(paging(Some(3), Some(5)), (3, 5, 10));
    }

    #[test]
    fn huge_pages_do_not_overflow() {
        let (page, limit, offset) = paging(Some(i64::MAX), Some(MAX_PAGE_SIZE));
        assert_eq!(limit, MAX_PAGE_SIZE);
        assert_eq!(page, i64::MAX / MAX_PAGE_SIZE);
        assert!(offset >= 0);
    }
}
