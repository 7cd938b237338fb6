use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

pub const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = crate::schema::reviews)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub property_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub helpful_voters: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    pub fn validate_content(rating: i32, comment: &str) -> Result<(), String> {
        if !(1..=5).contains(&rating) {
            return Err("Rating must be between 1 and 5".to_string());
        }
        let length = comment.trim().chars().count();
        if length == 0 {
            return Err("Comment is required".to_string());
        }
        if length > MAX_COMMENT_CHARS {
            return Err(format!("Comment cannot exceed {} characters", MAX_COMMENT_CHARS));
        }
        Ok(())
    }

    /// Adds or removes `voter` from the helpful set. Returns whether the vote
    /// is now present.
    pub fn toggle_helpful(&mut self, voter: Uuid) -> bool {
        if let Some(pos) = self.helpful_voters.iter().position(|v| *v == voter) {
            self.helpful_voters.remove(pos);
            false
        } else {
            self.helpful_voters.push(voter);
            true
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_reviews: usize,
}

impl RatingSummary {
    pub fn of(reviews: &[Review]) -> Self {
        if reviews.is_empty() {
            return Self {
                average_rating: 0.0,
                total_reviews: 0,
            };
        }
        let sum: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
        let average = sum as f64 / reviews.len() as f64;
        Self {
            average_rating: (average * 10.0).round() / 10.0,
            total_reviews: reviews.len(),
        }
    }
}
