use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
pub enum NotificationKind {
    Chat,
    Request,
}

impl NotificationKind {
    pub fn to_str(&self) -> &str {
        match self {
            NotificationKind::Chat => "chat",
            NotificationKind::Request => "request",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    /// Room id for chat notifications, request id for request ones.
    pub reference_id: Uuid,
    pub message: String,
    /// Set by producers that must be exactly-once (fanout); NULL otherwise.
    pub dedup_key: Option<String>,
    pub is_read: Option<bool>, // Database has DEFAULT FALSE, can be NULL
    pub created_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
}

/// Dedup key for the request-creation fanout: one notification per
/// (request, recipient) no matter how many times dispatch runs.
pub fn fanout_dedup_key(request_id: Uuid, recipient_id: Uuid) -> String {
    format!("fanout:{}:{}", request_id, recipient_id)
}

/// Dedup key for the first-contact chat notification of a room.
pub fn room_dedup_key(room_id: Uuid, recipient_id: Uuid) -> String {
    format!("room:{}:{}", room_id, recipient_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fanout_dedup_key_is_per_request_and_recipient() {
        let request = Uuid::new_v4();
        let provider_one = Uuid::new_v4();
        let provider_two = Uuid::new_v4();

        let key_one = fanout_dedup_key(request, provider_one);
        // Repeated dispatch derives the identical key
        assert_eq!(key_one, fanout_dedup_key(request, provider_one));
        assert_ne!(key_one, fanout_dedup_key(request, provider_two));
        assert_ne!(key_one, fanout_dedup_key(Uuid::new_v4(), provider_one));
    }
}
