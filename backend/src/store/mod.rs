//! Persistence seam. Handlers only talk to [`Store`]; `PgStore` backs it
//! with Postgres and `MemoryStore` keeps everything in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Application, Conversation, EmailVerification, Inquiry, Message, Notification, Property,
    PropertyStatus, Review, User, VerificationPurpose,
};
use crate::search::{PropertyFilter, SearchPage};

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness rule was violated; the payload names the field.
    #[error("{0} already exists")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Listing counts used by the admin dashboard and the public stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyStats {
    pub total: i64,
    pub draft: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    /// Distinct cities among approved listings.
    pub approved_cities: i64,
}

impl PropertyStats {
    pub fn record(&mut self, status: PropertyStatus, count: i64) {
        self.total += count;
        match status {
            PropertyStatus::Draft => self.draft += count,
            PropertyStatus::Pending => self.pending += count,
            PropertyStatus::Approved => self.approved += count,
            PropertyStatus::Rejected => self.rejected += count,
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    // users
    async fn insert_user(&self, user: User) -> StoreResult<User>;
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_mobile(&self, mobile: &str) -> StoreResult<Option<User>>;
    /// Replaces the stored row with `user`.
    async fn update_user(&self, user: User) -> StoreResult<User>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;
    /// Case-insensitive match on username or email, newest first.
    async fn list_users(
        &self,
        search: Option<String>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<User>, i64)>;
    async fn count_users(&self) -> StoreResult<i64>;
    /// Drops `property_id` from every favorites list.
    async fn remove_favorite_everywhere(&self, property_id: Uuid) -> StoreResult<()>;

    // properties
    async fn insert_property(&self, property: Property) -> StoreResult<Property>;
    async fn find_property(&self, id: Uuid) -> StoreResult<Option<Property>>;
    async fn delete_property(&self, id: Uuid) -> StoreResult<bool>;
    async fn search_properties(&self, filter: PropertyFilter) -> StoreResult<SearchPage>;
    async fn find_properties_by_ids(&self, ids: Vec<Uuid>) -> StoreResult<Vec<Property>>;
    /// Writes every column except the performance counters.
    async fn update_property(&self, property: Property) -> StoreResult<Property>;
    async fn increment_property_views(&self, id: Uuid) -> StoreResult<()>;
    async fn increment_property_inquiries(&self, id: Uuid) -> StoreResult<()>;
    /// Adds `delta` to the favorites counter unless that would take it below
    /// zero.
    async fn adjust_property_favorites(&self, id: Uuid, delta: i64) -> StoreResult<()>;
    /// Deletes every listing of `owner_id` and returns their ids.
    async fn delete_properties_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Uuid>>;
    async fn property_stats(&self) -> StoreResult<PropertyStats>;

    // reviews
    async fn insert_review(&self, review: Review) -> StoreResult<Review>;
    async fn find_review(&self, id: Uuid) -> StoreResult<Option<Review>>;
    async fn find_review_by_reviewer(
        &self,
        property_id: Uuid,
        reviewer_id: Uuid,
    ) -> StoreResult<Option<Review>>;
    async fn list_reviews_for_property(&self, property_id: Uuid) -> StoreResult<Vec<Review>>;
    async fn update_review(&self, review: Review) -> StoreResult<Review>;
    async fn delete_review(&self, id: Uuid) -> StoreResult<bool>;
    async fn delete_reviews_for_property(&self, property_id: Uuid) -> StoreResult<usize>;
    async fn delete_reviews_by_reviewer(&self, reviewer_id: Uuid) -> StoreResult<usize>;
    async fn count_reviews(&self) -> StoreResult<i64>;

    // inquiries
    async fn insert_inquiry(&self, inquiry: Inquiry) -> StoreResult<Inquiry>;
    async fn find_inquiry(&self, id: Uuid) -> StoreResult<Option<Inquiry>>;
    /// A pending inquiry from `sender_id` on `property_id` created at or
    /// after `since`.
    async fn find_recent_inquiry(
        &self,
        sender_id: Uuid,
        property_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Option<Inquiry>>;
    async fn list_inquiries_received(&self, owner_id: Uuid) -> StoreResult<Vec<Inquiry>>;
    async fn list_inquiries_sent(&self, sender_id: Uuid) -> StoreResult<Vec<Inquiry>>;
    async fn update_inquiry(&self, inquiry: Inquiry) -> StoreResult<Inquiry>;
    async fn count_inquiries(&self) -> StoreResult<i64>;

    // applications
    async fn insert_application(&self, application: Application) -> StoreResult<Application>;
    async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>>;
    async fn find_pending_application(
        &self,
        applicant_id: Uuid,
        property_id: Uuid,
    ) -> StoreResult<Option<Application>>;
    async fn list_applications_received(&self, owner_id: Uuid) -> StoreResult<Vec<Application>>;
    async fn list_applications_submitted(
        &self,
        applicant_id: Uuid,
    ) -> StoreResult<Vec<Application>>;
    async fn update_application(&self, application: Application) -> StoreResult<Application>;
    async fn count_applications(&self) -> StoreResult<i64>;

    // conversations and messages
    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>>;
    async fn find_conversation_between(
        &self,
        a: Uuid,
        b: Uuid,
        property_id: Option<Uuid>,
    ) -> StoreResult<Option<Conversation>>;
    async fn insert_conversation(&self, conversation: Conversation) -> StoreResult<Conversation>;
    async fn update_conversation(&self, conversation: Conversation) -> StoreResult<Conversation>;
    /// Conversations of `user_id`, most recently active first.
    async fn list_conversations(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>>;
    async fn insert_message(&self, message: Message) -> StoreResult<Message>;
    /// Messages of a conversation, oldest first.
    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>>;
    /// Marks the messages `reader_id` received in a conversation as read.
    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> StoreResult<usize>;
    async fn count_unread_messages(&self, user_id: Uuid) -> StoreResult<i64>;

    // notifications
    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification>;
    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>>;
    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<usize>;
    async fn delete_notification(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn count_unread_notifications(&self, user_id: Uuid) -> StoreResult<i64>;

    // email verification codes
    /// Stores a fresh code, dropping the unconsumed codes the user had for
    /// the same purpose.
    async fn replace_verification(
        &self,
        verification: EmailVerification,
    ) -> StoreResult<EmailVerification>;
    /// Latest unconsumed code for (user, purpose), expired or not.
    async fn find_active_verification(
        &self,
        user_id: Uuid,
        purpose: VerificationPurpose,
    ) -> StoreResult<Option<EmailVerification>>;
    async fn update_verification(
        &self,
        verification: EmailVerification,
    ) -> StoreResult<EmailVerification>;
    /// Counts a wrong code while the record is still unconsumed and under the
    /// attempt cap. Returns the new count, or `None` when nothing was updated.
    async fn record_failed_attempt(&self, id: Uuid) -> StoreResult<Option<i32>>;
    /// Marks the code used if it is still unconsumed, unexpired and under the
    /// attempt cap. `false` means another request got there first.
    async fn consume_verification(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;
    async fn purge_expired_verifications(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}
