use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

text_enum! {
    ApplicationStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Withdrawn => "withdrawn",
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = crate::schema::applications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub property_id: Uuid,
    pub owner_id: Uuid,
    pub applicant_id: Uuid,
    pub move_in_date: NaiveDate,
    pub occupants: i32,
    pub monthly_income: Option<i64>,
    pub message: Option<String>,
    pub documents: Vec<String>,
    pub status: ApplicationStatus,
    pub owner_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn is_pending(&self) -> bool {
        self.status == ApplicationStatus::Pending
    }
}
