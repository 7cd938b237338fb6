use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Serialize)]
#[diesel(table_name = crate::schema::conversations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub property_id: Option<Uuid>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Participants are stored in a fixed order so a pair maps to one row.
    pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn new(a: Uuid, b: Uuid, property_id: Option<Uuid>, now: DateTime<Utc>) -> Self {
        let (participant_a, participant_b) = Self::ordered_pair(a, b);
        Self {
            id: Uuid::new_v4(),
            participant_a,
            participant_b,
            property_id,
            last_message: None,
            last_message_at: None,
            created_at: now,
        }
    }

    pub fn includes(&self, user: Uuid) -> bool {
        self.participant_a == user || self.participant_b == user
    }

    pub fn other_participant(&self, user: Uuid) -> Uuid {
        if self.participant_a == user {
            self.participant_b
        } else {
            self.participant_a
        }
    }

    pub fn record_message(&mut self, content: &str, at: DateTime<Utc>) {
        let preview: String = content.chars().take(100).collect();
        self.last_message = Some(preview);
        self.last_message_at = Some(at);
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = crate::schema::messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_order_does_not_depend_on_sender() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(Conversation::ordered_pair(a, b), Conversation::ordered_pair(b, a));
    }

    #[test]
    fn preview_is_truncated() {
        let mut conversation = Conversation::new(Uuid::new_v4(), Uuid::new_v4(), None, Utc::now());
        conversation.record_message(&"x".repeat(500), Utc::now());
        assert_eq!(conversation.last_message.unwrap().len(), 100);
    }
}
