use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

/// A sender cannot open another pending inquiry on the same listing within
/// this window.
pub const DUPLICATE_WINDOW_HOURS: i64 = 24;

text_enum! {
    InquiryStatus {
        Pending => "pending",
        Replied => "replied",
        Archived => "archived",
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = crate::schema::inquiries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub id: Uuid,
    pub property_id: Uuid,
    pub owner_id: Uuid,
    pub sender_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub status: InquiryStatus,
    pub reply: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Inquiry {
    /// Start of the duplicate-suppression window ending at `now`.
    pub fn duplicate_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(DUPLICATE_WINDOW_HOURS)
    }
}
