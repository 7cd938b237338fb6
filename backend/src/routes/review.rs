use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{load_property, parse_id};
use crate::auth::{authenticate, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::models::{NotificationKind, RatingSummary, Review};
use crate::notify::notify;
use crate::state::AppState;
use crate::store::Store;

pub fn router(state: AppState) -> Router<AppState> {
    let authed = middleware::from_fn_with_state(state, authenticate);
    Router::new()
        .route("/update/:review_id", put(update_review))
        .route("/delete/:review_id", delete(delete_review))
        .route("/helpful/:review_id", post(toggle_helpful))
        .route_layer(authed.clone())
        .route(
            "/:property_id",
            get(list_reviews).merge(post(create_review).route_layer(authed)),
        )
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub rating: i32,
    pub comment: String,
}

async fn load_review(store: &dyn Store, id: Uuid) -> AppResult<Review> {
    store
        .find_review(id)
        .await?
        .ok_or_else(|| AppError::not_found("Review not found"))
}

pub async fn create_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(property_id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let property = load_property(state.store.as_ref(), parse_id(&property_id)?).await?;
    if !property.is_public() {
        return Err(AppError::not_found("Listing not found"));
    }
    if property.owner_id == user.id {
        return Err(AppError::forbidden("You cannot review your own listing"));
    }
    Review::validate_content(req.rating, &req.comment).map_err(AppError::BadRequest)?;
    if state
        .store
        .find_review_by_reviewer(property.id, user.id)
        .await?
        .is_some()
    {
        return Err(AppError::conflict("You have already reviewed this listing"));
    }

    let now = Utc::now();
    let review = Review {
        id: Uuid::new_v4(),
        property_id: property.id,
        reviewer_id: user.id,
        rating: req.rating,
        comment: req.comment.trim().to_string(),
        helpful_voters: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    let review = state.store.insert_review(review).await?;

    notify(
        state.store.as_ref(),
        property.owner_id,
        NotificationKind::Review,
        "New review",
        format!(
            "{} rated {} {} out of 5",
            user.username,
            property.display_title(),
            review.rating
        ),
        Some(format!("/listing/{}", property.id)),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "review": review })),
    ))
}

pub async fn list_reviews(
    State(state): State<AppState>,
    Path(property_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let reviews = state
        .store
        .list_reviews_for_property(parse_id(&property_id)?)
        .await?;
    let summary = RatingSummary::of(&reviews);
    Ok(Json(json!({
        "success": true,
        "reviews": reviews,
        "averageRating": summary.average_rating,
        "totalReviews": summary.total_reviews,
    })))
}

pub async fn update_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(review_id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let mut review = load_review(state.store.as_ref(), parse_id(&review_id)?).await?;
    if review.reviewer_id != user.id {
        return Err(AppError::forbidden("You can only edit your own reviews"));
    }
    Review::validate_content(req.rating, &req.comment).map_err(AppError::BadRequest)?;
    review.rating = req.rating;
    review.comment = req.comment.trim().to_string();
    review.updated_at = Utc::now();
    let review = state.store.update_review(review).await?;
    Ok(Json(json!({ "success": true, "review": review })))
}

pub async fn delete_review(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(review_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let review = load_review(state.store.as_ref(), parse_id(&review_id)?).await?;
    if review.reviewer_id != user.id && !user.is_admin() {
        return Err(AppError::forbidden("You can only delete your own reviews"));
    }
    state.store.delete_review(review.id).await?;
    Ok(Json(json!({ "success": true, "message": "Review deleted" })))
}

pub async fn toggle_helpful(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(review_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut review = load_review(state.store.as_ref(), parse_id(&review_id)?).await?;
    if review.reviewer_id == user.id {
        return Err(AppError::bad_request("You cannot mark your own review as helpful"));
    }
    let helpful = review.toggle_helpful(user.id);
    let review = state.store.update_review(review).await?;
    Ok(Json(json!({
        "success": true,
        "helpful": helpful,
        "helpfulCount": review.helpful_voters.len(),
    })))
}
