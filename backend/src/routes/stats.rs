use axum::extract::State;
use serde_json::json;

use crate::error::AppResult;
use crate::extract::Json;
use crate::state::AppState;

/// Public marketplace counters. Listings and cities count approved listings
/// only.
pub async fn summary(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let listings = state.store.property_stats().await?;
    let users = state.store.count_users().await?;
    let reviews = state.store.count_reviews().await?;
    Ok(Json(json!({
        "success": true,
        "totalListings": listings.approved,
        "totalUsers": users,
        "totalCities": listings.approved_cities,
        "totalReviews": reviews,
    })))
}
