use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PropertyStats, Store, StoreError, StoreResult};
use crate::models::{
    Application, Conversation, EmailVerification, Inquiry, InquiryStatus, Message, Notification,
    Property, PropertyStatus, Review, User, VerificationPurpose,
};
use crate::models::verification::MAX_ATTEMPTS;
use crate::search::{PropertyFilter, SearchPage};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    properties: HashMap<Uuid, Property>,
    reviews: HashMap<Uuid, Review>,
    inquiries: HashMap<Uuid, Inquiry>,
    applications: HashMap<Uuid, Application>,
    conversations: HashMap<Uuid, Conversation>,
    messages: Vec<Message>,
    notifications: HashMap<Uuid, Notification>,
    verifications: HashMap<Uuid, EmailVerification>,
}

impl Tables {
    /// Mirrors the unique indexes on `users.email` and `users.mobile`.
    fn check_user_unique(&self, user: &User) -> StoreResult<()> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(StoreError::Conflict("email".to_string()));
            }
            if user.mobile.is_some() && other.mobile == user.mobile {
                return Err(StoreError::Conflict("mobile".to_string()));
            }
        }
        Ok(())
    }

    /// Mirrors the foreign keys that reference `properties`: dependants are
    /// deleted and conversations keep going without the listing.
    fn cascade_property(&mut self, id: Uuid) -> bool {
        self.reviews.retain(|_, r| r.property_id != id);
        self.inquiries.retain(|_, i| i.property_id != id);
        self.applications.retain(|_, a| a.property_id != id);
        for conversation in self.conversations.values_mut() {
            if conversation.property_id == Some(id) {
                conversation.property_id = None;
            }
        }
        self.properties.remove(&id).is_some()
    }

    /// Mirrors the foreign keys that reference `users`.
    fn cascade_user(&mut self, id: Uuid) -> bool {
        let owned: Vec<Uuid> = self
            .properties
            .values()
            .filter(|p| p.owner_id == id)
            .map(|p| p.id)
            .collect();
        for property_id in owned {
            self.cascade_property(property_id);
        }
        self.reviews.retain(|_, r| r.reviewer_id != id);
        self.inquiries.retain(|_, i| i.owner_id != id && i.sender_id != id);
        self.applications.retain(|_, a| a.owner_id != id && a.applicant_id != id);
        self.conversations.retain(|_, c| !c.includes(id));
        let conversations = &self.conversations;
        self.messages.retain(|m| {
            m.sender_id != id
                && m.receiver_id != id
                && conversations.contains_key(&m.conversation_id)
        });
        self.notifications.retain(|_, n| n.user_id != id);
        self.verifications.retain(|_, v| v.user_id != id);
        self.users.remove(&id).is_some()
    }
}

/// Process-local store. Used by the test suite and by `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(mut rows: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows
}

fn replace<T: Clone>(map: &mut HashMap<Uuid, T>, id: Uuid, row: T) -> StoreResult<T> {
    match map.get_mut(&id) {
        Some(slot) => {
            *slot = row.clone();
            Ok(row)
        }
        None => Err(StoreError::NotFound),
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn insert_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        tables.check_user_unique(&user)?;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_mobile(&self, mobile: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.mobile.as_deref() == Some(mobile))
            .cloned())
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        tables.check_user_unique(&user)?;
        replace(&mut tables.users, user.id, user)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.cascade_user(id))
    }

    async fn list_users(
        &self,
        search: Option<String>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<User>, i64)> {
        let needle = search.map(|s| s.to_lowercase());
        let tables = self.tables.read().await;
        let hits: Vec<User> = tables
            .users
            .values()
            .filter(|u| match &needle {
                Some(n) => u.username.to_lowercase().contains(n) || u.email.contains(n),
                None => true,
            })
            .cloned()
            .collect();
        let hits = newest_first(hits, |u| u.created_at);
        let total = hits.len() as i64;
        let page = hits
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.users.len() as i64)
    }

    async fn remove_favorite_everywhere(&self, property_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        for user in tables.users.values_mut() {
            user.favorites.retain(|id| *id != property_id);
        }
        Ok(())
    }

    async fn insert_property(&self, property: Property) -> StoreResult<Property> {
        let mut tables = self.tables.write().await;
        tables.properties.insert(property.id, property.clone());
        Ok(property)
    }

    async fn find_property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        Ok(self.tables.read().await.properties.get(&id).cloned())
    }

    async fn update_property(&self, mut property: Property) -> StoreResult<Property> {
        let mut tables = self.tables.write().await;
        let stored = tables.properties.get(&property.id).ok_or(StoreError::NotFound)?;
        property.performance_views = stored.performance_views;
        property.performance_inquiries = stored.performance_inquiries;
        property.performance_favorites = stored.performance_favorites;
        replace(&mut tables.properties, property.id, property)
    }

    async fn delete_property(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.cascade_property(id))
    }

    async fn search_properties(&self, filter: PropertyFilter) -> StoreResult<SearchPage> {
        let tables = self.tables.read().await;
        Ok(filter.apply(tables.properties.values()))
    }

    async fn find_properties_by_ids(&self, ids: Vec<Uuid>) -> StoreResult<Vec<Property>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.properties.get(id).cloned())
            .collect())
    }

    async fn increment_property_views(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let property = tables.properties.get_mut(&id).ok_or(StoreError::NotFound)?;
        property.performance_views += 1;
        Ok(())
    }

    async fn increment_property_inquiries(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let property = tables.properties.get_mut(&id).ok_or(StoreError::NotFound)?;
        property.performance_inquiries += 1;
        Ok(())
    }

    async fn adjust_property_favorites(&self, id: Uuid, delta: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(property) = tables.properties.get_mut(&id) {
            if property.performance_favorites + delta >= 0 {
                property.performance_favorites += delta;
            }
        }
        Ok(())
    }

    async fn delete_properties_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let mut tables = self.tables.write().await;
        let ids: Vec<Uuid> = tables
            .properties
            .values()
            .filter(|p| p.owner_id == owner_id)
            .map(|p| p.id)
            .collect();
        for id in &ids {
            tables.cascade_property(*id);
        }
        Ok(ids)
    }

    async fn property_stats(&self) -> StoreResult<PropertyStats> {
        let tables = self.tables.read().await;
        let mut stats = PropertyStats::default();
        let mut cities = HashSet::new();
        for property in tables.properties.values() {
            stats.record(property.status, 1);
            if property.status == PropertyStatus::Approved {
                if let Some(city) = &property.location_city {
                    cities.insert(city.to_lowercase());
                }
            }
        }
        stats.approved_cities = cities.len() as i64;
        Ok(stats)
    }

    async fn insert_review(&self, review: Review) -> StoreResult<Review> {
        let mut tables = self.tables.write().await;
        let duplicate = tables.reviews.values().any(|r| {
            r.property_id == review.property_id && r.reviewer_id == review.reviewer_id
        });
        if duplicate {
            return Err(StoreError::Conflict("review".to_string()));
        }
        tables.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    async fn find_review(&self, id: Uuid) -> StoreResult<Option<Review>> {
        Ok(self.tables.read().await.reviews.get(&id).cloned())
    }

    async fn find_review_by_reviewer(
        &self,
        property_id: Uuid,
        reviewer_id: Uuid,
    ) -> StoreResult<Option<Review>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .values()
            .find(|r| r.property_id == property_id && r.reviewer_id == reviewer_id)
            .cloned())
    }

    async fn list_reviews_for_property(&self, property_id: Uuid) -> StoreResult<Vec<Review>> {
        let tables = self.tables.read().await;
        let rows = tables
            .reviews
            .values()
            .filter(|r| r.property_id == property_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |r| r.created_at))
    }

    async fn update_review(&self, review: Review) -> StoreResult<Review> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.reviews, review.id, review)
    }

    async fn delete_review(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().await.reviews.remove(&id).is_some())
    }

    async fn delete_reviews_for_property(&self, property_id: Uuid) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.reviews.len();
        tables.reviews.retain(|_, r| r.property_id != property_id);
        Ok(before - tables.reviews.len())
    }

    async fn delete_reviews_by_reviewer(&self, reviewer_id: Uuid) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.reviews.len();
        tables.reviews.retain(|_, r| r.reviewer_id != reviewer_id);
        Ok(before - tables.reviews.len())
    }

    async fn count_reviews(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.reviews.len() as i64)
    }

    async fn insert_inquiry(&self, inquiry: Inquiry) -> StoreResult<Inquiry> {
        let mut tables = self.tables.write().await;
        tables.inquiries.insert(inquiry.id, inquiry.clone());
        Ok(inquiry)
    }

    async fn find_inquiry(&self, id: Uuid) -> StoreResult<Option<Inquiry>> {
        Ok(self.tables.read().await.inquiries.get(&id).cloned())
    }

    async fn find_recent_inquiry(
        &self,
        sender_id: Uuid,
        property_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Option<Inquiry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .inquiries
            .values()
            .find(|i| {
                i.sender_id == sender_id
                    && i.property_id == property_id
                    && i.status == InquiryStatus::Pending
                    && i.created_at >= since
            })
            .cloned())
    }

    async fn list_inquiries_received(&self, owner_id: Uuid) -> StoreResult<Vec<Inquiry>> {
        let tables = self.tables.read().await;
        let rows = tables
            .inquiries
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |i| i.created_at))
    }

    async fn list_inquiries_sent(&self, sender_id: Uuid) -> StoreResult<Vec<Inquiry>> {
        let tables = self.tables.read().await;
        let rows = tables
            .inquiries
            .values()
            .filter(|i| i.sender_id == sender_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |i| i.created_at))
    }

    async fn update_inquiry(&self, inquiry: Inquiry) -> StoreResult<Inquiry> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.inquiries, inquiry.id, inquiry)
    }

    async fn count_inquiries(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.inquiries.len() as i64)
    }

    async fn insert_application(&self, application: Application) -> StoreResult<Application> {
        let mut tables = self.tables.write().await;
        tables.applications.insert(application.id, application.clone());
        Ok(application)
    }

    async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>> {
        Ok(self.tables.read().await.applications.get(&id).cloned())
    }

    async fn find_pending_application(
        &self,
        applicant_id: Uuid,
        property_id: Uuid,
    ) -> StoreResult<Option<Application>> {
        let tables = self.tables.read().await;
        Ok(tables
            .applications
            .values()
            .find(|a| a.applicant_id == applicant_id && a.property_id == property_id && a.is_pending())
            .cloned())
    }

    async fn list_applications_received(&self, owner_id: Uuid) -> StoreResult<Vec<Application>> {
        let tables = self.tables.read().await;
        let rows = tables
            .applications
            .values()
            .filter(|a| a.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |a| a.created_at))
    }

    async fn list_applications_submitted(
        &self,
        applicant_id: Uuid,
    ) -> StoreResult<Vec<Application>> {
        let tables = self.tables.read().await;
        let rows = tables
            .applications
            .values()
            .filter(|a| a.applicant_id == applicant_id)
            .cloned()
            .collect();
        Ok(newest_first(rows, |a| a.created_at))
    }

    async fn update_application(&self, application: Application) -> StoreResult<Application> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.applications, application.id, application)
    }

    async fn count_applications(&self) -> StoreResult<i64> {
        Ok(self.tables.read().await.applications.len() as i64)
    }

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        Ok(self.tables.read().await.conversations.get(&id).cloned())
    }

    async fn find_conversation_between(
        &self,
        a: Uuid,
        b: Uuid,
        property_id: Option<Uuid>,
    ) -> StoreResult<Option<Conversation>> {
        let (first, second) = Conversation::ordered_pair(a, b);
        let tables = self.tables.read().await;
        Ok(tables
            .conversations
            .values()
            .find(|c| {
                c.participant_a == first && c.participant_b == second && c.property_id == property_id
            })
            .cloned())
    }

    async fn insert_conversation(&self, conversation: Conversation) -> StoreResult<Conversation> {
        let mut tables = self.tables.write().await;
        tables.conversations.insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn update_conversation(&self, conversation: Conversation) -> StoreResult<Conversation> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.conversations, conversation.id, conversation)
    }

    async fn list_conversations(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>> {
        let tables = self.tables.read().await;
        let rows = tables
            .conversations
            .values()
            .filter(|c| c.includes(user_id))
            .cloned()
            .collect();
        Ok(newest_first(rows, |c| c.last_message_at.unwrap_or(c.created_at)))
    }

    async fn insert_message(&self, message: Message) -> StoreResult<Message> {
        self.tables.write().await.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for message in tables.messages.iter_mut().filter(|m| {
            m.conversation_id == conversation_id && m.receiver_id == reader_id && !m.read
        }) {
            message.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn count_unread_messages(&self, user_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.receiver_id == user_id && !m.read)
            .count() as i64)
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification> {
        let mut tables = self.tables.write().await;
        tables.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>> {
        let tables = self.tables.read().await;
        let rows = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        Ok(newest_first(rows, |n| n.created_at))
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.notifications.get_mut(&id) {
            Some(n) if n.user_id == user_id => {
                n.read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for n in tables
            .notifications
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            n.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_notification(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .notifications
            .get(&id)
            .is_some_and(|n| n.user_id == user_id);
        if owned {
            tables.notifications.remove(&id);
        }
        Ok(owned)
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> StoreResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as i64)
    }

    async fn replace_verification(
        &self,
        verification: EmailVerification,
    ) -> StoreResult<EmailVerification> {
        let mut tables = self.tables.write().await;
        tables.verifications.retain(|_, v| {
            !(v.user_id == verification.user_id
                && v.purpose == verification.purpose
                && v.consumed_at.is_none())
        });
        tables
            .verifications
            .insert(verification.id, verification.clone());
        Ok(verification)
    }

    async fn find_active_verification(
        &self,
        user_id: Uuid,
        purpose: VerificationPurpose,
    ) -> StoreResult<Option<EmailVerification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .verifications
            .values()
            .filter(|v| v.user_id == user_id && v.purpose == purpose && v.consumed_at.is_none())
            .max_by_key(|v| v.created_at)
            .cloned())
    }

    async fn update_verification(
        &self,
        verification: EmailVerification,
    ) -> StoreResult<EmailVerification> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.verifications, verification.id, verification)
    }

    async fn record_failed_attempt(&self, id: Uuid) -> StoreResult<Option<i32>> {
        let mut tables = self.tables.write().await;
        match tables.verifications.get_mut(&id) {
            Some(v) if v.consumed_at.is_none() && v.attempts < MAX_ATTEMPTS => {
                v.attempts += 1;
                Ok(Some(v.attempts))
            }
            _ => Ok(None),
        }
    }

    async fn consume_verification(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.verifications.get_mut(&id) {
            Some(v) if v.is_redeemable(now) => {
                v.consumed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired_verifications(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.verifications.len();
        tables.verifications.retain(|_, v| !v.is_expired(now));
        Ok(before - tables.verifications.len())
    }
}
