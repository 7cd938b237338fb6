use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{is_valid_email, load_user};
use crate::auth::{
    authenticate,
    cookie::{clear_cookie, session_cookie},
    create_token,
    password::{hash_password, validate_strength, verify_password},
    CurrentUser,
};
use crate::codes;
use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::mail;
use crate::models::{mask_email, AuthProvider, User, VerificationPurpose, LOCKOUT_MINUTES};
use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/google", post(google))
        .route("/verify-login", post(verify_login))
        .route("/resend-code", post(resend_code))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/signout", get(signout))
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub mobile: Option<String>,
}

#[derive(Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct GoogleRequest {
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyLoginRequest {
    pub user_id: Uuid,
    pub code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendCodeRequest {
    pub user_id: Uuid,
    pub purpose: VerificationPurpose,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

pub(crate) fn validate_username(username: &str) -> AppResult<String> {
    let username = username.trim();
    let len = username.chars().count();
    if !(3..=40).contains(&len) {
        return Err(AppError::bad_request(
            "Username must be between 3 and 40 characters",
        ));
    }
    Ok(username.to_string())
}

/// Issues the session token and sets the cookie.
pub(crate) fn session_response(state: &AppState, user: &User) -> AppResult<Response> {
    let token = create_token(user, state.config.signing_secret(), state.config.jwt_ttl_hours)
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))?;
    let cookie = session_cookie(
        &token,
        state.config.token_max_age_secs(),
        state.config.cookie_secure,
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true, "user": user.to_public() })),
    )
        .into_response())
}

/// Second step of every sign-in path: either ask for the emailed code or
/// hand out the session.
async fn finish_sign_in(state: &AppState, user: &User) -> AppResult<Response> {
    if user.requires_second_factor() {
        codes::issue(state, user.id, &user.email, VerificationPurpose::Login).await?;
        return Ok(Json(json!({
            "success": true,
            "requiresVerification": true,
            "userId": user.id,
            "email": mask_email(&user.email),
        }))
        .into_response());
    }
    log::info!("User {} signed in", user.id);
    session_response(state, user)
}

/// Creates a local account
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    let username = validate_username(&req.username)?;
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("A valid email is required"));
    }
    validate_strength(&req.password).map_err(AppError::BadRequest)?;
    let mobile = req
        .mobile
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::conflict("Email is already registered"));
    }
    if let Some(mobile) = &mobile {
        if state.store.find_user_by_mobile(mobile).await?.is_some() {
            return Err(AppError::conflict("Mobile number is already registered"));
        }
    }

    let mut user = User::new(username, email, AuthProvider::Local, Utc::now());
    user.mobile = mobile;
    user.password_hash =
        Some(hash_password(&req.password, state.config.hash_cost()).map_err(AppError::Internal)?);
    let user = state.store.insert_user(user).await?;

    log::info!("New account {} registered", user.id);
    mail::dispatch(state.mailer.clone(), mail::welcome(&user.email, &user.username));

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user.to_public() })),
    ))
}

/// Email and password sign-in with lockout
pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> AppResult<Response> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
    let now = Utc::now();

    let mut user = state
        .store
        .find_user_by_email(&req.email.trim().to_lowercase())
        .await?
        .ok_or_else(invalid)?;

    if user.is_locked(now) {
        return Err(AppError::Locked(format!(
            "Account is locked after too many failed attempts, try again in {} minutes",
            LOCKOUT_MINUTES
        )));
    }
    let hash = user.password_hash.clone().ok_or_else(|| {
        AppError::bad_request("This account uses Google sign-in, continue with Google")
    })?;

    if !verify_password(&req.password, &hash).map_err(AppError::Internal)? {
        let locked = user.register_failed_login(now);
        state.store.update_user(user.clone()).await?;
        if locked {
            log::info!("Account {} locked after repeated failed sign-ins", user.id);
            return Err(AppError::Locked(format!(
                "Account is locked after too many failed attempts, try again in {} minutes",
                LOCKOUT_MINUTES
            )));
        }
        return Err(invalid());
    }

    if user.has_login_failures() {
        user.clear_login_failures();
        user.updated_at = now;
        user = state.store.update_user(user).await?;
    }
    finish_sign_in(&state, &user).await
}

/// Social sign-in with the profile the client got from Google
pub async fn google(
    State(state): State<AppState>,
    Json(req): Json<GoogleRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("A valid email is required"));
    }

    let user = match state.store.find_user_by_email(&email).await? {
        Some(mut user) => {
            if user.avatar.is_none() && req.photo.is_some() {
                user.avatar = req.photo.clone();
                user.updated_at = Utc::now();
                user = state.store.update_user(user).await?;
            }
            user
        }
        None => {
            let local_part = email.split('@').next().unwrap_or_default().to_string();
            let name = req.name.trim();
            let username = if name.chars().count() >= 3 {
                name.chars().take(40).collect()
            } else {
                local_part
            };
            let mut user = User::new(username, email, AuthProvider::Google, Utc::now());
            user.avatar = req.photo.clone();
            let user = state.store.insert_user(user).await?;
            log::info!("New Google account {} registered", user.id);
            user
        }
    };
    finish_sign_in(&state, &user).await
}

pub async fn verify_login(
    State(state): State<AppState>,
    Json(req): Json<VerifyLoginRequest>,
) -> AppResult<Response> {
    let user = load_user(state.store.as_ref(), req.user_id).await?;
    codes::redeem(&state, user.id, VerificationPurpose::Login, &req.code).await?;
    log::info!("User {} passed the second factor", user.id);
    session_response(&state, &user)
}

pub async fn resend_code(
    State(state): State<AppState>,
    Json(req): Json<ResendCodeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let user = load_user(state.store.as_ref(), req.user_id).await?;
    let record = codes::resend(&state, user.id, req.purpose).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Verification code sent",
        "email": mask_email(&record.email),
    })))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let email = req.email.trim().to_lowercase();
    if let Some(user) = state.store.find_user_by_email(&email).await? {
        let recent = state
            .store
            .find_active_verification(user.id, VerificationPurpose::PasswordReset)
            .await?
            .is_some_and(|record| record.in_cooldown(Utc::now()));
        if !recent {
            codes::issue(&state, user.id, &user.email, VerificationPurpose::PasswordReset).await?;
        }
    }
    Ok(Json(json!({
        "success": true,
        "message": "If an account exists for that email, a reset code has been sent",
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validate_strength(&req.new_password).map_err(AppError::BadRequest)?;
    let mut user = state
        .store
        .find_user_by_email(&req.email.trim().to_lowercase())
        .await?
        .ok_or_else(|| AppError::not_found("No active verification code"))?;

    codes::redeem(&state, user.id, VerificationPurpose::PasswordReset, &req.code).await?;

    user.password_hash = Some(
        hash_password(&req.new_password, state.config.hash_cost()).map_err(AppError::Internal)?,
    );
    user.clear_login_failures();
    user.updated_at = Utc::now();
    state.store.update_user(user.clone()).await?;
    log::info!("Password reset for user {}", user.id);

    Ok(Json(json!({ "success": true, "message": "Password has been reset" })))
}

pub async fn signout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_cookie(state.config.cookie_secure))],
        Json(json!({ "success": true, "message": "Signed out" })),
    )
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "user": user.to_public() }))
}
