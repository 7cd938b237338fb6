use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::{load_property, parse_id};
use crate::auth::{authenticate, CurrentUser, MaybeUser};
use crate::error::{AppError, AppResult};
use crate::extract::{Json, Query};
use crate::models::{PropertyInput, PropertyStatus, RatingSummary};
use crate::search::{PropertyFilter, SearchParams};
use crate::state::AppState;
use crate::store::Store;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/create", post(create_listing))
        .route("/update/:id", post(update_listing))
        .route("/submit/:id", post(submit_listing))
        .route("/delete/:id", delete(delete_listing_handler))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
        .route("/get/:id", get(get_listing))
        .route("/get", get(search_listings))
}

/// Deletes a listing together with its reviews and any favorites pointing
/// at it.
pub(crate) async fn delete_listing(store: &dyn Store, id: Uuid) -> AppResult<()> {
    let reviews = store.delete_reviews_for_property(id).await?;
    store.remove_favorite_everywhere(id).await?;
    if !store.delete_property(id).await? {
        return Err(AppError::not_found("Listing not found"));
    }
    log::info!("Deleted listing {} and {} reviews", id, reviews);
    Ok(())
}

pub async fn create_listing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<PropertyInput>,
) -> AppResult<impl IntoResponse> {
    let status = if input.save_as_draft.unwrap_or(false) {
        PropertyStatus::Draft
    } else {
        PropertyStatus::Pending
    };
    let mut property = crate::models::Property::new(user.id, status, Utc::now());
    property.apply(input);
    property.validate().map_err(AppError::BadRequest)?;

    let property = state.store.insert_property(property).await?;
    log::info!("User {} created listing {} as {}", user.id, property.id, property.status);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "listing": property.to_view() })),
    ))
}

pub async fn update_listing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<PropertyInput>,
) -> AppResult<Json<serde_json::Value>> {
    let mut property = load_property(state.store.as_ref(), parse_id(&id)?).await?;
    let is_owner = property.owner_id == user.id;
    if !is_owner && !user.is_admin() {
        return Err(AppError::forbidden("You can only edit your own listings"));
    }

    property.apply(input);
    property.validate().map_err(AppError::BadRequest)?;
    if is_owner && !user.is_admin() && property.status != PropertyStatus::Draft {
        property.status = PropertyStatus::Pending;
        property.rejection_reason = None;
    }
    property.updated_at = Utc::now();

    let property = state.store.update_property(property).await?;
    Ok(Json(json!({ "success": true, "listing": property.to_view() })))
}

pub async fn submit_listing(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut property = load_property(state.store.as_ref(), parse_id(&id)?).await?;
    if property.owner_id != user.id {
        return Err(AppError::forbidden("You can only submit your own listings"));
    }
    if property.status != PropertyStatus::Draft {
        return Err(AppError::bad_request("Only drafts can be submitted for review"));
    }
    property.validate().map_err(AppError::BadRequest)?;
    property.status = PropertyStatus::Pending;
    property.updated_at = Utc::now();

    let property = state.store.update_property(property).await?;
    log::info!("Listing {} submitted for review", property.id);
    Ok(Json(json!({ "success": true, "listing": property.to_view() })))
}

pub async fn delete_listing_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let property = load_property(state.store.as_ref(), parse_id(&id)?).await?;
    if property.owner_id != user.id && !user.is_admin() {
        return Err(AppError::forbidden("You can only delete your own listings"));
    }
    delete_listing(state.store.as_ref(), property.id).await?;
    Ok(Json(json!({ "success": true, "message": "Listing deleted" })))
}

/// Listing detail. Only approved listings are public; owners and admins
/// also see the rest.
pub async fn get_listing(
    State(state): State<AppState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut property = load_property(state.store.as_ref(), parse_id(&id)?).await?;
    let privileged = viewer
        .as_ref()
        .is_some_and(|v| v.id == property.owner_id || v.is_admin());
    if !property.is_public() && !privileged {
        return Err(AppError::not_found("Listing not found"));
    }

    state.store.increment_property_views(property.id).await?;
    property.performance_views += 1;

    let reviews = state.store.list_reviews_for_property(property.id).await?;
    let rating = RatingSummary::of(&reviews);
    let owner = state
        .store
        .find_user(property.owner_id)
        .await?
        .map(|owner| owner.to_profile());

    Ok(Json(json!({
        "success": true,
        "listing": property.to_view(),
        "owner": owner,
        "rating": rating,
    })))
}

pub async fn search_listings(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<serde_json::Value>> {
    let filter = PropertyFilter::from_params(&params).map_err(AppError::BadRequest)?;
    let (limit, start_index) = (filter.limit, filter.offset);
    let page = state.store.search_properties(filter).await?;
    let listings: Vec<_> = page.listings.iter().map(|p| p.to_view()).collect();
    Ok(Json(json!({
        "success": true,
        "listings": listings,
        "total": page.total,
        "limit": limit,
        "startIndex": start_index,
    })))
}
