use axum::{
    extract::{Path, State},
    http::header,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::auth::validate_username;
use super::{is_valid_email, load_property, load_user, parse_id};
use crate::auth::{
    authenticate,
    cookie::clear_cookie,
    password::{hash_password, validate_strength, verify_password},
    CurrentUser,
};
use crate::codes;
use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::models::{mask_email, PropertyStatus, VerificationPurpose};
use crate::search::PropertyFilter;
use crate::state::AppState;
use crate::store::Store;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/favorites", get(list_favorites))
        .route(
            "/favorites/:property_id",
            post(add_favorite).delete(remove_favorite),
        )
        .route("/listings/:id", get(user_listings))
        .route("/update/:id", post(update_profile))
        .route("/change-password", post(change_password))
        .route("/change-email/request", post(request_email_change))
        .route("/change-email/confirm", post(confirm_email_change))
        .route("/two-factor", post(set_two_factor))
        .route("/delete/:id", delete(delete_user))
        .route("/:id", get(get_user))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub mobile: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailChangeRequest {
    pub new_email: String,
}

#[derive(Deserialize)]
pub struct EmailChangeConfirm {
    pub code: String,
}

#[derive(Deserialize)]
pub struct TwoFactorRequest {
    pub enabled: bool,
}

/// Removes an account and everything hanging off it: its listings (with
/// their reviews and favorites) and the reviews it wrote. Steps run one
/// after another; a failure stops the cascade where it is.
pub(crate) async fn delete_account(store: &dyn Store, user_id: Uuid) -> AppResult<()> {
    let listings = store.delete_properties_by_owner(user_id).await?;
    for property_id in &listings {
        store.delete_reviews_for_property(*property_id).await?;
        store.remove_favorite_everywhere(*property_id).await?;
    }
    let reviews = store.delete_reviews_by_reviewer(user_id).await?;
    if !store.delete_user(user_id).await? {
        return Err(AppError::not_found("User not found"));
    }
    log::info!(
        "Deleted account {} with {} listings and {} reviews",
        user_id,
        listings.len(),
        reviews
    );
    Ok(())
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let user = load_user(state.store.as_ref(), parse_id(&id)?).await?;
    let body = if viewer.id == user.id || viewer.is_admin() {
        json!({ "success": true, "user": user.to_public() })
    } else {
        json!({ "success": true, "user": user.to_profile() })
    };
    Ok(Json(body))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    if viewer.id != id {
        return Err(AppError::forbidden("You can only update your own account"));
    }
    let mut user = load_user(state.store.as_ref(), id).await?;

    if let Some(username) = req.username {
        user.username = validate_username(&username)?;
    }
    if let Some(avatar) = req.avatar {
        let avatar = avatar.trim().to_string();
        user.avatar = (!avatar.is_empty()).then_some(avatar);
    }
    if let Some(mobile) = req.mobile {
        let mobile = mobile.trim().to_string();
        if mobile.is_empty() {
            user.mobile = None;
        } else {
            let taken = state
                .store
                .find_user_by_mobile(&mobile)
                .await?
                .is_some_and(|other| other.id != user.id);
            if taken {
                return Err(AppError::conflict("Mobile number is already in use"));
            }
            user.mobile = Some(mobile);
        }
    }
    user.updated_at = Utc::now();
    let user = state.store.update_user(user).await?;
    Ok(Json(json!({ "success": true, "user": user.to_public() })))
}

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let hash = user.password_hash.clone().ok_or_else(|| {
        AppError::bad_request("This account signs in with Google and has no password")
    })?;
    if !verify_password(&req.current_password, &hash).map_err(AppError::Internal)? {
        return Err(AppError::bad_request("Current password is incorrect"));
    }
    validate_strength(&req.new_password).map_err(AppError::BadRequest)?;

    user.password_hash = Some(
        hash_password(&req.new_password, state.config.hash_cost()).map_err(AppError::Internal)?,
    );
    user.updated_at = Utc::now();
    state.store.update_user(user).await?;
    Ok(Json(json!({ "success": true, "message": "Password updated" })))
}

pub async fn request_email_change(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<EmailChangeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let new_email = req.new_email.trim().to_lowercase();
    if !is_valid_email(&new_email) {
        return Err(AppError::bad_request("A valid email is required"));
    }
    if new_email == user.email {
        return Err(AppError::bad_request("That is already your email"));
    }
    if state.store.find_user_by_email(&new_email).await?.is_some() {
        return Err(AppError::conflict("Email is already registered"));
    }
    codes::issue(&state, user.id, &new_email, VerificationPurpose::EmailChange).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Verification code sent to the new address",
        "email": mask_email(&new_email),
    })))
}

pub async fn confirm_email_change(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    Json(req): Json<EmailChangeConfirm>,
) -> AppResult<Json<serde_json::Value>> {
    let record = codes::redeem(&state, user.id, VerificationPurpose::EmailChange, &req.code).await?;
    if state.store.find_user_by_email(&record.email).await?.is_some() {
        return Err(AppError::conflict("Email is already registered"));
    }
    log::info!("User {} changed email", user.id);
    user.email = record.email;
    user.email_verified = true;
    user.updated_at = Utc::now();
    let user = state.store.update_user(user).await?;
    Ok(Json(json!({ "success": true, "user": user.to_public() })))
}

pub async fn set_two_factor(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    Json(req): Json<TwoFactorRequest>,
) -> AppResult<Json<serde_json::Value>> {
    user.two_factor_enabled = req.enabled;
    user.updated_at = Utc::now();
    let user = state.store.update_user(user).await?;
    Ok(Json(json!({
        "success": true,
        "twoFactorEnabled": user.two_factor_enabled,
        "required": user.requires_second_factor(),
    })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    if viewer.id != id && !viewer.is_admin() {
        return Err(AppError::forbidden("You can only delete your own account"));
    }
    load_user(state.store.as_ref(), id).await?;
    delete_account(state.store.as_ref(), id).await?;

    let body = Json(json!({ "success": true, "message": "Account deleted" }));
    if viewer.id == id {
        return Ok((
            [(header::SET_COOKIE, clear_cookie(state.config.cookie_secure))],
            body,
        )
            .into_response());
    }
    Ok(body.into_response())
}

/// Every listing for the owner and admins; approved ones for everybody else.
pub async fn user_listings(
    State(state): State<AppState>,
    CurrentUser(viewer): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let owner_id = parse_id(&id)?;
    let mut filter = PropertyFilter::owned_by(owner_id);
    if viewer.id != owner_id && !viewer.is_admin() {
        filter.status = Some(PropertyStatus::Approved);
    }
    let page = state.store.search_properties(filter).await?;
    let listings: Vec<_> = page.listings.iter().map(|p| p.to_view()).collect();
    Ok(Json(json!({ "success": true, "listings": listings })))
}

pub async fn list_favorites(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let listings: Vec<_> = state
        .store
        .find_properties_by_ids(user.favorites.clone())
        .await?
        .iter()
        .filter(|p| p.is_public() || p.owner_id == user.id)
        .map(|p| p.to_view())
        .collect();
    Ok(Json(json!({ "success": true, "listings": listings })))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    Path(property_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let property_id = parse_id(&property_id)?;
    let property = load_property(state.store.as_ref(), property_id).await?;
    if !property.is_public() && property.owner_id != user.id {
        return Err(AppError::not_found("Listing not found"));
    }
    if !user.favorites.contains(&property_id) {
        user.favorites.push(property_id);
        user.updated_at = Utc::now();
        user = state.store.update_user(user).await?;
        state.store.adjust_property_favorites(property_id, 1).await?;
    }
    Ok(Json(json!({ "success": true, "favorites": user.favorites })))
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(mut user): CurrentUser,
    Path(property_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let property_id = parse_id(&property_id)?;
    if user.favorites.contains(&property_id) {
        user.favorites.retain(|id| *id != property_id);
        user.updated_at = Utc::now();
        user = state.store.update_user(user).await?;
        state.store.adjust_property_favorites(property_id, -1).await?;
    }
    Ok(Json(json!({ "success": true, "favorites": user.favorites })))
}
