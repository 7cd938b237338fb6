use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::{load_property, parse_id};
use crate::auth::{authenticate, CurrentUser};
use crate::error::{AppError, AppResult};
use crate::extract::Json;
use crate::mail;
use crate::models::{Application, ApplicationStatus, NotificationKind};
use crate::notify::notify;
use crate::state::AppState;
use crate::store::Store;

const MAX_DOCUMENTS: usize = 5;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(submit_application))
        .route("/mine", get(mine))
        .route("/received", get(received))
        .route("/:id/status", put(decide))
        .route("/:id/withdraw", put(withdraw))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    pub property_id: Uuid,
    pub move_in_date: NaiveDate,
    pub occupants: i32,
    pub monthly_income: Option<i64>,
    pub message: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub status: ApplicationStatus,
    pub note: Option<String>,
}

async fn load_application(store: &dyn Store, raw_id: &str) -> AppResult<Application> {
    store
        .find_application(parse_id(raw_id)?)
        .await?
        .ok_or_else(|| AppError::not_found("Application not found"))
}

pub async fn submit_application(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ApplicationRequest>,
) -> AppResult<impl IntoResponse> {
    let property = load_property(state.store.as_ref(), req.property_id).await?;
    if !property.is_public() {
        return Err(AppError::not_found("Listing not found"));
    }
    if property.owner_id == user.id {
        return Err(AppError::bad_request("You cannot apply to your own listing"));
    }
    if req.occupants < 1 {
        return Err(AppError::bad_request("At least one occupant is required"));
    }
    if req.monthly_income.is_some_and(|income| income < 0) {
        return Err(AppError::bad_request("Monthly income cannot be negative"));
    }
    let now = Utc::now();
    if req.move_in_date < now.date_naive() {
        return Err(AppError::bad_request("Move-in date cannot be in the past"));
    }
    if req.documents.len() > MAX_DOCUMENTS {
        return Err(AppError::bad_request(format!(
            "At most {} documents can be attached",
            MAX_DOCUMENTS
        )));
    }
    if state
        .store
        .find_pending_application(user.id, property.id)
        .await?
        .is_some()
    {
        return Err(AppError::conflict(
            "You already have a pending application for this listing",
        ));
    }

    let application = Application {
        id: Uuid::new_v4(),
        property_id: property.id,
        owner_id: property.owner_id,
        applicant_id: user.id,
        move_in_date: req.move_in_date,
        occupants: req.occupants,
        monthly_income: req.monthly_income,
        message: req.message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
        documents: req.documents,
        status: ApplicationStatus::Pending,
        owner_note: None,
        created_at: now,
        updated_at: now,
    };
    let application = state.store.insert_application(application).await?;

    notify(
        state.store.as_ref(),
        property.owner_id,
        NotificationKind::Application,
        "New rental application",
        format!("{} applied for {}", user.username, property.display_title()),
        Some("/dashboard/applications".to_string()),
    )
    .await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "application": application })),
    ))
}

pub async fn mine(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let applications = state.store.list_applications_submitted(user.id).await?;
    Ok(Json(json!({ "success": true, "applications": applications })))
}

pub async fn received(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let applications = state.store.list_applications_received(user.id).await?;
    Ok(Json(json!({ "success": true, "applications": applications })))
}

/// Owner approves or rejects a pending application.
pub async fn decide(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let mut application = load_application(state.store.as_ref(), &id).await?;
    if application.owner_id != user.id {
        return Err(AppError::forbidden("Only the listing owner can decide applications"));
    }
    if !matches!(req.status, ApplicationStatus::Approved | ApplicationStatus::Rejected) {
        return Err(AppError::bad_request("Status must be approved or rejected"));
    }
    if !application.is_pending() {
        return Err(AppError::bad_request("Only pending applications can be decided"));
    }

    application.status = req.status;
    application.owner_note = req.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    application.updated_at = Utc::now();
    let application = state.store.update_application(application).await?;

    let title = state
        .store
        .find_property(application.property_id)
        .await?
        .map(|p| p.display_title().to_string())
        .unwrap_or_else(|| "a listing".to_string());
    notify(
        state.store.as_ref(),
        application.applicant_id,
        NotificationKind::Application,
        format!("Application {}", application.status),
        format!("Your application for {} was {}", title, application.status),
        Some("/dashboard/applications".to_string()),
    )
    .await;
    if let Some(applicant) = state.store.find_user(application.applicant_id).await? {
        mail::dispatch(
            state.mailer.clone(),
            mail::application_decided(
                &applicant.email,
                &title,
                application.status.as_str(),
                application.owner_note.as_deref(),
            ),
        );
    }

    Ok(Json(json!({ "success": true, "application": application })))
}

pub async fn withdraw(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut application = load_application(state.store.as_ref(), &id).await?;
    if application.applicant_id != user.id {
        return Err(AppError::forbidden("Only the applicant can withdraw an application"));
    }
    if !application.is_pending() {
        return Err(AppError::bad_request("Only pending applications can be withdrawn"));
    }
    application.status = ApplicationStatus::Withdrawn;
    application.updated_at = Utc::now();
    let application = state.store.update_application(application).await?;
    Ok(Json(json!({ "success": true, "application": application })))
}
