//! HTTP surface. One module per resource, mounted under `/api/<resource>`.

use axum::{routing::get, Router};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Property, User};
use crate::state::AppState;
use crate::store::Store;

pub mod admin;
pub mod application;
pub mod auth;
pub mod inquiry;
pub mod listing;
pub mod message;
pub mod notification;
pub mod review;
pub mod stats;
pub mod upload;
pub mod user;

pub fn api(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/user", user::router(state.clone()))
        .nest("/listing", listing::router(state.clone()))
        .nest("/review", review::router(state.clone()))
        .nest("/inquiries", inquiry::router(state.clone()))
        .nest("/applications", application::router(state.clone()))
        .nest("/messages", message::router(state.clone()))
        .nest("/notifications", notification::router(state.clone()))
        .nest("/admin", admin::router(state.clone()))
        .nest("/upload", upload::router(state))
        .route("/stats", get(stats::summary))
}

async fn health() -> &'static str {
    "ok"
}

/// Parses a path segment as an id, answering 400 instead of axum's plain
/// text rejection.
pub(crate) fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::bad_request(format!("Invalid id {:?}", raw)))
}

pub(crate) async fn load_property(store: &dyn Store, id: Uuid) -> AppResult<Property> {
    store
        .find_property(id)
        .await?
        .ok_or_else(|| AppError::not_found("Listing not found"))
}

pub(crate) async fn load_user(store: &dyn Store, id: Uuid) -> AppResult<User> {
    store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Loose shape check: one `@`, something before it, a dotted domain after.
pub(crate) fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Trims `text` and checks it is non-empty and at most `max` characters.
pub(crate) fn required_text(text: &str, field: &str, max: usize) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::bad_request(format!("{} is required", field)));
    }
    if text.chars().count() > max {
        return Err(AppError::bad_request(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("rahim@example.com"));
        assert!(!is_valid_email("rahim.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("rahim@localhost"));
        assert!(!is_valid_email("ra him@example.com"));
    }

    #[test]
    fn required_text_trims_and_bounds() {
        assert_eq!(required_text("  hi ", "message", 10).unwrap(), "hi");
        assert!(required_text("   ", "message", 10).is_err());
        assert!(required_text("abcdef", "message", 3).is_err());
    }

    #[test]
    fn bad_ids_are_400() {
        let err = parse_id("not-a-uuid").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
