use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, sql};
use diesel::pg::{Pg, PgConnection};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Nullable};
use uuid::Uuid;

use super::{PropertyStats, Store, StoreError, StoreResult};
use crate::models::{
    Application, ApplicationStatus, Conversation, EmailVerification, Inquiry, InquiryStatus,
    Message, Notification, Property, PropertyStatus, Review, User, VerificationPurpose,
};
use crate::schema::{
    applications, conversations, email_verifications, inquiries, messages, notifications,
    properties, reviews, users,
};
use crate::models::verification::MAX_ATTEMPTS;
use crate::search::{escape_like, like_pattern, PropertyFilter, SearchPage, SortKey, SortOrder};

type PgPool = Pool<ConnectionManager<PgConnection>>;

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => StoreError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let constraint = info.constraint_name().unwrap_or_default();
                let field = if constraint.contains("email") {
                    "email"
                } else if constraint.contains("mobile") {
                    "mobile"
                } else if constraint.starts_with("reviews") {
                    "review"
                } else {
                    "record"
                };
                StoreError::Conflict(field.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Postgres-backed store. Diesel is synchronous, so every query runs on the
/// blocking pool with a pooled connection.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn connect(database_url: &str, pool_size: u32) -> StoreResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| {
                log::error!("Failed to establish database connection: {}", e);
                StoreError::Backend(e.to_string())
            })?;
        log::info!("Database pool ready with {} connections", pool_size);
        Ok(Self { pool })
    }

    async fn run<T, F>(&self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> QueryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| StoreError::Backend(e.to_string()))?;
            work(&mut conn).map_err(StoreError::from)
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}

/// Listing query with every criterion of `filter` applied. Each criterion
/// accepts a match in either the legacy or the sectioned columns.
fn filtered_properties(filter: &PropertyFilter) -> properties::BoxedQuery<'static, Pg> {
    let mut query = properties::table.into_boxed();

    if let Some(status) = filter.status {
        query = query.filter(properties::status.eq(status));
    }
    if let Some(owner) = filter.owner_id {
        query = query.filter(properties::owner_id.eq(owner));
    }
    if let Some(text) = &filter.text {
        let pattern = like_pattern(text);
        query = query.filter(
            properties::name
                .ilike(pattern.clone())
                .or(properties::description.ilike(pattern.clone()))
                .or(properties::address.ilike(pattern.clone()))
                .or(properties::basic_title.ilike(pattern.clone()))
                .or(properties::basic_description.ilike(pattern.clone()))
                .or(properties::location_address.ilike(pattern.clone()))
                .or(properties::location_city.ilike(pattern.clone()))
                .or(properties::location_area.ilike(pattern)),
        );
    }
    if let Some(kind) = filter.listing_type {
        query = query.filter(
            properties::listing_type
                .eq(kind)
                .or(properties::basic_listing_type.eq(kind)),
        );
    }
    if let Some(property_type) = &filter.property_type {
        query = query.filter(properties::basic_property_type.ilike(escape_like(property_type)));
    }
    if let Some(city) = &filter.city {
        let pattern = like_pattern(city);
        query = query.filter(
            properties::location_city
                .ilike(pattern.clone())
                .or(properties::address.ilike(pattern)),
        );
    }
    if let Some(area) = &filter.area {
        let pattern = like_pattern(area);
        query = query.filter(
            properties::location_area
                .ilike(pattern.clone())
                .or(properties::address.ilike(pattern)),
        );
    }
    if filter.has_price_range() {
        let (min, max) = filter.price_bounds();
        query = query.filter(
            properties::regular_price
                .between(min, max)
                .or(properties::pricing_rent.between(min, max)),
        );
    }
    if let Some(min) = filter.min_bedrooms {
        query = query.filter(
            properties::bedrooms
                .ge(min)
                .or(properties::details_bedrooms.ge(min)),
        );
    }
    if let Some(min) = filter.min_bathrooms {
        query = query.filter(
            properties::bathrooms
                .ge(min)
                .or(properties::details_bathrooms.ge(min)),
        );
    }
    if let Some(furnished) = filter.furnished {
        query = query.filter(
            properties::furnished
                .eq(furnished)
                .or(properties::details_furnished.eq(furnished)),
        );
    }
    if let Some(parking) = filter.parking {
        query = query.filter(
            properties::parking
                .eq(parking)
                .or(properties::details_parking.eq(parking)),
        );
    }
    if let Some(offer) = filter.offer {
        query = query.filter(properties::offer.eq(offer));
    }
    if !filter.amenities.is_empty() {
        query = query.filter(properties::amenities.contains(filter.amenities.clone()));
    }
    query
}

fn search_page(conn: &mut PgConnection, filter: &PropertyFilter) -> QueryResult<SearchPage> {
    let total: i64 = filtered_properties(filter).count().get_result(conn)?;

    let query = filtered_properties(filter).select(Property::as_select());
    let query = match (filter.sort, filter.order) {
        (SortKey::CreatedAt, SortOrder::Asc) => query.order(properties::created_at.asc()),
        (SortKey::CreatedAt, SortOrder::Desc) => query.order(properties::created_at.desc()),
        (SortKey::Views, SortOrder::Asc) => query.order(properties::performance_views.asc()),
        (SortKey::Views, SortOrder::Desc) => query.order(properties::performance_views.desc()),
        (SortKey::Price, SortOrder::Asc) => query.order(sql::<Nullable<BigInt>>(
            "COALESCE(properties.pricing_rent, properties.regular_price) ASC NULLS LAST",
        )),
        (SortKey::Price, SortOrder::Desc) => query.order(sql::<Nullable<BigInt>>(
            "COALESCE(properties.pricing_rent, properties.regular_price) DESC NULLS LAST",
        )),
    };
    let listings = query
        .then_order_by(properties::created_at.desc())
        .limit(filter.limit)
        .offset(filter.offset)
        .load(conn)?;
    Ok(SearchPage { listings, total })
}

#[async_trait]
impl Store for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    async fn insert_user(&self, user: User) -> StoreResult<User> {
        self.run(move |conn| {
            diesel::insert_into(users::table)
                .values(&user)
                .returning(User::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.run(move |conn| {
            users::table
                .find(id)
                .select(User::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        self.run(move |conn| {
            users::table
                .filter(users::email.eq(email))
                .select(User::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn find_user_by_mobile(&self, mobile: &str) -> StoreResult<Option<User>> {
        let mobile = mobile.to_string();
        self.run(move |conn| {
            users::table
                .filter(users::mobile.eq(mobile))
                .select(User::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn update_user(&self, user: User) -> StoreResult<User> {
        self.run(move |conn| {
            diesel::update(users::table.find(user.id))
                .set(&user)
                .returning(User::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| diesel::delete(users::table.find(id)).execute(conn))
            .await
            .map(|n| n > 0)
    }

    async fn list_users(
        &self,
        search: Option<String>,
        offset: i64,
        limit: i64,
    ) -> StoreResult<(Vec<User>, i64)> {
        self.run(move |conn| {
            let matching = || {
                let mut query = users::table.into_boxed();
                if let Some(text) = &search {
                    let pattern = like_pattern(text);
                    query = query.filter(
                        users::username
                            .ilike(pattern.clone())
                            .or(users::email.ilike(pattern)),
                    );
                }
                query
            };
            let total: i64 = matching().count().get_result(conn)?;
            let rows = matching()
                .select(User::as_select())
                .order(users::created_at.desc())
                .offset(offset)
                .limit(limit)
                .load(conn)?;
            Ok((rows, total))
        })
        .await
    }

    async fn count_users(&self) -> StoreResult<i64> {
        self.run(|conn| users::table.count().get_result(conn)).await
    }

    async fn remove_favorite_everywhere(&self, property_id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::sql_query(
                "UPDATE users SET favorites = array_remove(favorites, $1) WHERE $1 = ANY(favorites)",
            )
            .bind::<diesel::sql_types::Uuid, _>(property_id)
            .execute(conn)
            .map(|_| ())
        })
        .await
    }

    async fn insert_property(&self, property: Property) -> StoreResult<Property> {
        self.run(move |conn| {
            diesel::insert_into(properties::table)
                .values(&property)
                .returning(Property::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn find_property(&self, id: Uuid) -> StoreResult<Option<Property>> {
        self.run(move |conn| {
            properties::table
                .find(id)
                .select(Property::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn update_property(&self, property: Property) -> StoreResult<Property> {
        self.run(move |conn| {
            diesel::update(properties::table.find(property.id))
                .set(&property)
                .returning(Property::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn delete_property(&self, id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| diesel::delete(properties::table.find(id)).execute(conn))
            .await
            .map(|n| n > 0)
    }

    async fn search_properties(&self, filter: PropertyFilter) -> StoreResult<SearchPage> {
        self.run(move |conn| search_page(conn, &filter)).await
    }

    async fn find_properties_by_ids(&self, ids: Vec<Uuid>) -> StoreResult<Vec<Property>> {
        self.run(move |conn| {
            properties::table
                .filter(properties::id.eq_any(ids))
                .select(Property::as_select())
                .order(properties::created_at.desc())
                .load(conn)
        })
        .await
    }

    async fn increment_property_views(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            let updated = diesel::update(properties::table.find(id))
                .set(properties::performance_views.eq(properties::performance_views + 1))
                .execute(conn)?;
            if updated == 0 {
                return Err(DieselError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn increment_property_inquiries(&self, id: Uuid) -> StoreResult<()> {
        self.run(move |conn| {
            let updated = diesel::update(properties::table.find(id))
                .set(properties::performance_inquiries.eq(properties::performance_inquiries + 1))
                .execute(conn)?;
            if updated == 0 {
                return Err(DieselError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn adjust_property_favorites(&self, id: Uuid, delta: i64) -> StoreResult<()> {
        self.run(move |conn| {
            diesel::update(
                properties::table
                    .find(id)
                    .filter((properties::performance_favorites + delta).ge(0)),
            )
            .set(properties::performance_favorites.eq(properties::performance_favorites + delta))
            .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn delete_properties_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.run(move |conn| {
            diesel::delete(properties::table.filter(properties::owner_id.eq(owner_id)))
                .returning(properties::id)
                .get_results(conn)
        })
        .await
    }

    async fn property_stats(&self) -> StoreResult<PropertyStats> {
        self.run(|conn| {
            let counts: Vec<(PropertyStatus, i64)> = properties::table
                .group_by(properties::status)
                .select((properties::status, count_star()))
                .load(conn)?;
            let cities: i64 = properties::table
                .filter(properties::status.eq(PropertyStatus::Approved))
                .select(sql::<BigInt>("COUNT(DISTINCT LOWER(location_city))"))
                .get_result(conn)?;
            let mut stats = PropertyStats::default();
            for (status, count) in counts {
                stats.record(status, count);
            }
            stats.approved_cities = cities;
            Ok(stats)
        })
        .await
    }

    async fn insert_review(&self, review: Review) -> StoreResult<Review> {
        self.run(move |conn| {
            diesel::insert_into(reviews::table)
                .values(&review)
                .returning(Review::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn find_review(&self, id: Uuid) -> StoreResult<Option<Review>> {
        self.run(move |conn| {
            reviews::table
                .find(id)
                .select(Review::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn find_review_by_reviewer(
        &self,
        property_id: Uuid,
        reviewer_id: Uuid,
    ) -> StoreResult<Option<Review>> {
        self.run(move |conn| {
            reviews::table
                .filter(reviews::property_id.eq(property_id))
                .filter(reviews::reviewer_id.eq(reviewer_id))
                .select(Review::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn list_reviews_for_property(&self, property_id: Uuid) -> StoreResult<Vec<Review>> {
        self.run(move |conn| {
            reviews::table
                .filter(reviews::property_id.eq(property_id))
                .select(Review::as_select())
                .order(reviews::created_at.desc())
                .load(conn)
        })
        .await
    }

    async fn update_review(&self, review: Review) -> StoreResult<Review> {
        self.run(move |conn| {
            diesel::update(reviews::table.find(review.id))
                .set(&review)
                .returning(Review::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn delete_review(&self, id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| diesel::delete(reviews::table.find(id)).execute(conn))
            .await
            .map(|n| n > 0)
    }

    async fn delete_reviews_for_property(&self, property_id: Uuid) -> StoreResult<usize> {
        self.run(move |conn| {
            diesel::delete(reviews::table.filter(reviews::property_id.eq(property_id)))
                .execute(conn)
        })
        .await
    }

    async fn delete_reviews_by_reviewer(&self, reviewer_id: Uuid) -> StoreResult<usize> {
        self.run(move |conn| {
            diesel::delete(reviews::table.filter(reviews::reviewer_id.eq(reviewer_id)))
                .execute(conn)
        })
        .await
    }

    async fn count_reviews(&self) -> StoreResult<i64> {
        self.run(|conn| reviews::table.count().get_result(conn)).await
    }

    async fn insert_inquiry(&self, inquiry: Inquiry) -> StoreResult<Inquiry> {
        self.run(move |conn| {
            diesel::insert_into(inquiries::table)
                .values(&inquiry)
                .returning(Inquiry::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn find_inquiry(&self, id: Uuid) -> StoreResult<Option<Inquiry>> {
        self.run(move |conn| {
            inquiries::table
                .find(id)
                .select(Inquiry::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn find_recent_inquiry(
        &self,
        sender_id: Uuid,
        property_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Option<Inquiry>> {
        self.run(move |conn| {
            inquiries::table
                .filter(inquiries::sender_id.eq(sender_id))
                .filter(inquiries::property_id.eq(property_id))
                .filter(inquiries::status.eq(InquiryStatus::Pending))
                .filter(inquiries::created_at.ge(since))
                .select(Inquiry::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn list_inquiries_received(&self, owner_id: Uuid) -> StoreResult<Vec<Inquiry>> {
        self.run(move |conn| {
            inquiries::table
                .filter(inquiries::owner_id.eq(owner_id))
                .select(Inquiry::as_select())
                .order(inquiries::created_at.desc())
                .load(conn)
        })
        .await
    }

    async fn list_inquiries_sent(&self, sender_id: Uuid) -> StoreResult<Vec<Inquiry>> {
        self.run(move |conn| {
            inquiries::table
                .filter(inquiries::sender_id.eq(sender_id))
                .select(Inquiry::as_select())
                .order(inquiries::created_at.desc())
                .load(conn)
        })
        .await
    }

    async fn update_inquiry(&self, inquiry: Inquiry) -> StoreResult<Inquiry> {
        self.run(move |conn| {
            diesel::update(inquiries::table.find(inquiry.id))
                .set(&inquiry)
                .returning(Inquiry::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn count_inquiries(&self) -> StoreResult<i64> {
        self.run(|conn| inquiries::table.count().get_result(conn)).await
    }

    async fn insert_application(&self, application: Application) -> StoreResult<Application> {
        self.run(move |conn| {
            diesel::insert_into(applications::table)
                .values(&application)
                .returning(Application::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>> {
        self.run(move |conn| {
            applications::table
                .find(id)
                .select(Application::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn find_pending_application(
        &self,
        applicant_id: Uuid,
        property_id: Uuid,
    ) -> StoreResult<Option<Application>> {
        self.run(move |conn| {
            applications::table
                .filter(applications::applicant_id.eq(applicant_id))
                .filter(applications::property_id.eq(property_id))
                .filter(applications::status.eq(ApplicationStatus::Pending))
                .select(Application::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn list_applications_received(&self, owner_id: Uuid) -> StoreResult<Vec<Application>> {
        self.run(move |conn| {
            applications::table
                .filter(applications::owner_id.eq(owner_id))
                .select(Application::as_select())
                .order(applications::created_at.desc())
                .load(conn)
        })
        .await
    }

    async fn list_applications_submitted(
        &self,
        applicant_id: Uuid,
    ) -> StoreResult<Vec<Application>> {
        self.run(move |conn| {
            applications::table
                .filter(applications::applicant_id.eq(applicant_id))
                .select(Application::as_select())
                .order(applications::created_at.desc())
                .load(conn)
        })
        .await
    }

    async fn update_application(&self, application: Application) -> StoreResult<Application> {
        self.run(move |conn| {
            diesel::update(applications::table.find(application.id))
                .set(&application)
                .returning(Application::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn count_applications(&self) -> StoreResult<i64> {
        self.run(|conn| applications::table.count().get_result(conn)).await
    }

    async fn find_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        self.run(move |conn| {
            conversations::table
                .find(id)
                .select(Conversation::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn find_conversation_between(
        &self,
        a: Uuid,
        b: Uuid,
        property_id: Option<Uuid>,
    ) -> StoreResult<Option<Conversation>> {
        let (first, second) = Conversation::ordered_pair(a, b);
        self.run(move |conn| {
            let mut query = conversations::table
                .filter(conversations::participant_a.eq(first))
                .filter(conversations::participant_b.eq(second))
                .into_boxed();
            query = match property_id {
                Some(id) => query.filter(conversations::property_id.eq(id)),
                None => query.filter(conversations::property_id.is_null()),
            };
            query
                .select(Conversation::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn insert_conversation(&self, conversation: Conversation) -> StoreResult<Conversation> {
        self.run(move |conn| {
            diesel::insert_into(conversations::table)
                .values(&conversation)
                .returning(Conversation::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn update_conversation(&self, conversation: Conversation) -> StoreResult<Conversation> {
        self.run(move |conn| {
            diesel::update(conversations::table.find(conversation.id))
                .set(&conversation)
                .returning(Conversation::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn list_conversations(&self, user_id: Uuid) -> StoreResult<Vec<Conversation>> {
        self.run(move |conn| {
            conversations::table
                .filter(
                    conversations::participant_a
                        .eq(user_id)
                        .or(conversations::participant_b.eq(user_id)),
                )
                .select(Conversation::as_select())
                .order(sql::<Nullable<diesel::sql_types::Timestamptz>>(
                    "COALESCE(last_message_at, created_at) DESC",
                ))
                .load(conn)
        })
        .await
    }

    async fn insert_message(&self, message: Message) -> StoreResult<Message> {
        self.run(move |conn| {
            diesel::insert_into(messages::table)
                .values(&message)
                .returning(Message::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<Message>> {
        self.run(move |conn| {
            messages::table
                .filter(messages::conversation_id.eq(conversation_id))
                .select(Message::as_select())
                .order(messages::created_at.asc())
                .load(conn)
        })
        .await
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> StoreResult<usize> {
        self.run(move |conn| {
            diesel::update(
                messages::table
                    .filter(messages::conversation_id.eq(conversation_id))
                    .filter(messages::receiver_id.eq(reader_id))
                    .filter(messages::read.eq(false)),
            )
            .set(messages::read.eq(true))
            .execute(conn)
        })
        .await
    }

    async fn count_unread_messages(&self, user_id: Uuid) -> StoreResult<i64> {
        self.run(move |conn| {
            messages::table
                .filter(messages::receiver_id.eq(user_id))
                .filter(messages::read.eq(false))
                .count()
                .get_result(conn)
        })
        .await
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification> {
        self.run(move |conn| {
            diesel::insert_into(notifications::table)
                .values(&notification)
                .returning(Notification::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> StoreResult<Vec<Notification>> {
        self.run(move |conn| {
            let mut query = notifications::table
                .filter(notifications::user_id.eq(user_id))
                .into_boxed();
            if unread_only {
                query = query.filter(notifications::read.eq(false));
            }
            query
                .select(Notification::as_select())
                .order(notifications::created_at.desc())
                .load(conn)
        })
        .await
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| {
            diesel::update(
                notifications::table
                    .find(id)
                    .filter(notifications::user_id.eq(user_id)),
            )
            .set(notifications::read.eq(true))
            .execute(conn)
        })
        .await
        .map(|n| n > 0)
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<usize> {
        self.run(move |conn| {
            diesel::update(
                notifications::table
                    .filter(notifications::user_id.eq(user_id))
                    .filter(notifications::read.eq(false)),
            )
            .set(notifications::read.eq(true))
            .execute(conn)
        })
        .await
    }

    async fn delete_notification(&self, id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        self.run(move |conn| {
            diesel::delete(
                notifications::table
                    .find(id)
                    .filter(notifications::user_id.eq(user_id)),
            )
            .execute(conn)
        })
        .await
        .map(|n| n > 0)
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> StoreResult<i64> {
        self.run(move |conn| {
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::read.eq(false))
                .count()
                .get_result(conn)
        })
        .await
    }

    async fn replace_verification(
        &self,
        verification: EmailVerification,
    ) -> StoreResult<EmailVerification> {
        self.run(move |conn| {
            conn.transaction(|conn| {
                diesel::delete(
                    email_verifications::table
                        .filter(email_verifications::user_id.eq(verification.user_id))
                        .filter(email_verifications::purpose.eq(verification.purpose))
                        .filter(email_verifications::consumed_at.is_null()),
                )
                .execute(conn)?;
                diesel::insert_into(email_verifications::table)
                    .values(&verification)
                    .returning(EmailVerification::as_returning())
                    .get_result(conn)
            })
        })
        .await
    }

    async fn find_active_verification(
        &self,
        user_id: Uuid,
        purpose: VerificationPurpose,
    ) -> StoreResult<Option<EmailVerification>> {
        self.run(move |conn| {
            email_verifications::table
                .filter(email_verifications::user_id.eq(user_id))
                .filter(email_verifications::purpose.eq(purpose))
                .filter(email_verifications::consumed_at.is_null())
                .order(email_verifications::created_at.desc())
                .select(EmailVerification::as_select())
                .first(conn)
                .optional()
        })
        .await
    }

    async fn update_verification(
        &self,
        verification: EmailVerification,
    ) -> StoreResult<EmailVerification> {
        self.run(move |conn| {
            diesel::update(email_verifications::table.find(verification.id))
                .set(&verification)
                .returning(EmailVerification::as_returning())
                .get_result(conn)
        })
        .await
    }

    async fn record_failed_attempt(&self, id: Uuid) -> StoreResult<Option<i32>> {
        self.run(move |conn| {
            diesel::update(
                email_verifications::table
                    .find(id)
                    .filter(email_verifications::consumed_at.is_null())
                    .filter(email_verifications::attempts.lt(MAX_ATTEMPTS)),
            )
            .set(email_verifications::attempts.eq(email_verifications::attempts + 1))
            .returning(email_verifications::attempts)
            .get_result(conn)
            .optional()
        })
        .await
    }

    async fn consume_verification(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        self.run(move |conn| {
            let updated = diesel::update(
                email_verifications::table
                    .find(id)
                    .filter(email_verifications::consumed_at.is_null())
                    .filter(email_verifications::attempts.lt(MAX_ATTEMPTS))
                    .filter(email_verifications::expires_at.gt(now)),
            )
            .set(email_verifications::consumed_at.eq(Some(now)))
            .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }

    async fn purge_expired_verifications(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        self.run(move |conn| {
            diesel::delete(email_verifications::table.filter(email_verifications::expires_at.le(now)))
                .execute(conn)
        })
        .await
    }
}
