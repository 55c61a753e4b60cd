// models/chatmodel.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "sender_role", rename_all = "snake_case")]
pub enum SenderRole {
    User,
    Provider,
}

impl SenderRole {
    pub fn to_str(&self) -> &str {
        match self {
            SenderRole::User => "user",
            SenderRole::Provider => "provider",
        }
    }
}

#[derive(Debug, Serialize, Clone, Deserialize, sqlx::FromRow)]
pub struct ChatRoom {
    pub id: Uuid,
    pub conversation_key: String,
    pub participant_a_id: Uuid,
    pub participant_b_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub is_active: Option<bool>, // Database has DEFAULT TRUE, can be NULL
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
}

impl ChatRoom {
    /// Key for a direct conversation. Sorting the pair makes the key
    /// identical no matter which side opens the chat first.
    pub fn direct_key(one: Uuid, two: Uuid) -> String {
        let (lo, hi) = if one <= two { (one, two) } else { (two, one) };
        format!("dm:{}:{}", lo, hi)
    }

    /// Key for a booking-scoped conversation.
    pub fn booking_key(booking_id: Uuid) -> String {
        format!("booking:{}", booking_id)
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_a_id == user_id || self.participant_b_id == user_id
    }

    /// The participant who is not `user_id`. Rooms always have exactly two.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.participant_a_id == user_id {
            self.participant_b_id
        } else {
            self.participant_a_id
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: SenderRole,
    pub content: String,
    pub is_read: Option<bool>, // Database has DEFAULT FALSE, can be NULL
    pub created_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_key_ignores_argument_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(ChatRoom::direct_key(a, b), ChatRoom::direct_key(b, a));
        assert_ne!(ChatRoom::direct_key(a, b), ChatRoom::direct_key(a, a));
    }

    #[test]
    fn booking_key_is_stable() {
        let booking = Uuid::new_v4();
        assert_eq!(
            ChatRoom::booking_key(booking),
            format!("booking:{}", booking)
        );
    }

    #[test]
    fn other_participant_flips_sides() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let room = ChatRoom {
            id: Uuid::new_v4(),
            conversation_key: ChatRoom::direct_key(a, b),
            participant_a_id: a,
            participant_b_id: b,
            booking_id: None,
            is_active: Some(true),
            last_message_at: None,
            created_at: None,
        };

        assert_eq!(room.other_participant(a), b);
        assert_eq!(room.other_participant(b), a);
        assert!(room.has_participant(a));
        assert!(!room.has_participant(Uuid::new_v4()));
    }
}
