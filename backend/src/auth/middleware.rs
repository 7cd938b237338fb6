use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use super::{cookie::token_from_headers, validate_token};
use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// The signed-in account, placed in request extensions by [`authenticate`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// The signed-in account when a valid session is present.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

async fn resolve_session(headers: &HeaderMap, state: &AppState) -> Result<User, AppError> {
    let token = token_from_headers(headers)
        .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))?;
    let claims = validate_token(&token, state.config.signing_secret())
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
    state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = resolve_session(request.headers(), &state).await?;
    log::debug!("Authenticated user {} for {}", user.id, request.uri().path());
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Must run after [`authenticate`].
pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|CurrentUser(user)| user.is_admin());
    if !is_admin {
        return Err(AppError::forbidden("Admin access required"));
    }
    Ok(next.run(request).await)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_string()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(optional_user(&parts.headers, state).await))
    }
}

/// Session user for routes that work with or without one. A missing or
/// broken session is treated as anonymous.
pub async fn optional_user(headers: &HeaderMap, state: &AppState) -> Option<User> {
    match resolve_session(headers, state).await {
        Ok(user) => Some(user),
        Err(AppError::Internal(detail)) => {
            log::warn!("Session lookup failed: {}", detail);
            None
        }
        Err(_) => None,
    }
}
