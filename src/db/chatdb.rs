// db/chatdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::chatmodel::{ChatMessage, ChatRoom, SenderRole};

/// Room row shaped for the inbox list: the other side's name, the last
/// message preview and how many messages the viewer has not read yet.
/// Serde both ways because inbox pages get cached in Redis.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomSummary {
    pub id: Uuid,
    pub conversation_key: String,
    pub booking_id: Option<Uuid>,
    pub other_participant_id: Uuid,
    pub other_participant_name: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ChatExt {
    // Room management
    /// Idempotent room lookup keyed on conversation_key. Two racing
    /// callers both end up with the same row; the bool says whether this
    /// call actually inserted it.
    async fn get_or_create_room(
        &self,
        conversation_key: &str,
        participant_a_id: Uuid,
        participant_b_id: Uuid,
        booking_id: Option<Uuid>,
    ) -> Result<(ChatRoom, bool), Error>;

    async fn get_room_by_id(&self, room_id: Uuid) -> Result<Option<ChatRoom>, Error>;

    async fn get_user_rooms(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RoomSummary>, Error>;

    // Message management
    async fn send_message(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        sender_role: SenderRole,
        content: &str,
    ) -> Result<ChatMessage, Error>;

    async fn get_room_messages(
        &self,
        room_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatMessage>, Error>;

    /// Flips the given messages to read for the viewer and returns only
    /// the ids that actually changed. Already-read ids and the viewer's
    /// own messages fall out of the result, which keeps repeated calls
    /// from inflating downstream counters.
    async fn mark_messages_read(
        &self,
        room_id: Uuid,
        viewer_id: Uuid,
        message_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, Error>;

    async fn get_unread_message_count(&self, user_id: Uuid) -> Result<i64, Error>;

    async fn get_room_unread_count(&self, room_id: Uuid, viewer_id: Uuid) -> Result<i64, Error>;
}

#[async_trait]
impl ChatExt for DBClient {
    async fn get_or_create_room(
        &self,
        conversation_key: &str,
        participant_a_id: Uuid,
        participant_b_id: Uuid,
        booking_id: Option<Uuid>,
    ) -> Result<(ChatRoom, bool), Error> {
        let inserted = sqlx::query_as::<_, ChatRoom>(
            r#"
            INSERT INTO chat_rooms (conversation_key, participant_a_id, participant_b_id, booking_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (conversation_key) DO NOTHING
            RETURNING id, conversation_key, participant_a_id, participant_b_id,
                      booking_id, is_active, last_message_at, created_at
            "#,
        )
        .bind(conversation_key)
        .bind(participant_a_id)
        .bind(participant_b_id)
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(room) = inserted {
            return Ok((room, true));
        }

        // Lost the race or the room predates this call; fetch the winner.
        let existing = sqlx::query_as::<_, ChatRoom>(
            r#"
            SELECT id, conversation_key, participant_a_id, participant_b_id,
                   booking_id, is_active, last_message_at, created_at
            FROM chat_rooms
            WHERE conversation_key = $1
            "#,
        )
        .bind(conversation_key)
        .fetch_one(&self.pool)
        .await?;

        Ok((existing, false))
    }

    async fn get_room_by_id(&self, room_id: Uuid) -> Result<Option<ChatRoom>, Error> {
        sqlx::query_as::<_, ChatRoom>(
            r#"
            SELECT id, conversation_key, participant_a_id, participant_b_id,
                   booking_id, is_active, last_message_at, created_at
            FROM chat_rooms
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_user_rooms(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RoomSummary>, Error> {
        sqlx::query_as::<_, RoomSummary>(
            r#"
            SELECT c.id, c.conversation_key, c.booking_id,
                   CASE WHEN c.participant_a_id = $1
                        THEN c.participant_b_id
                        ELSE c.participant_a_id
                   END AS other_participant_id,
                   u.name AS other_participant_name,
                   (SELECT m.content FROM chat_messages m
                     WHERE m.chat_id = c.id
                     ORDER BY m.created_at DESC, m.id DESC
                     LIMIT 1) AS last_message,
                   c.last_message_at,
                   (SELECT COUNT(*) FROM chat_messages m
                     WHERE m.chat_id = c.id
                       AND m.sender_id != $1
                       AND m.is_read = false) AS unread_count,
                   c.created_at
            FROM chat_rooms c
            JOIN users u ON u.id = CASE WHEN c.participant_a_id = $1
                                        THEN c.participant_b_id
                                        ELSE c.participant_a_id
                                   END
            WHERE (c.participant_a_id = $1 OR c.participant_b_id = $1)
              AND c.is_active = true
            ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn send_message(
        &self,
        room_id: Uuid,
        sender_id: Uuid,
        sender_role: SenderRole,
        content: &str,
    ) -> Result<ChatMessage, Error> {
        let mut tx = self.pool.begin().await?;

        // Insert message; the row id is the canonical one clients echo back.
        let message = sqlx::query_as::<_, ChatMessage>(
            r#"
            INSERT INTO chat_messages (chat_id, sender_id, sender_role, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, chat_id, sender_id, sender_role, content, is_read, created_at
            "#,
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(sender_role)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        // Update room's last_message_at
        sqlx::query(
            r#"
            UPDATE chat_rooms
            SET last_message_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    async fn get_room_messages(
        &self,
        room_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChatMessage>, Error> {
        sqlx::query_as::<_, ChatMessage>(
            r#"
            SELECT id, chat_id, sender_id, sender_role, content, is_read, created_at
            FROM chat_messages
            WHERE chat_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(room_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn mark_messages_read(
        &self,
        room_id: Uuid,
        viewer_id: Uuid,
        message_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE chat_messages
            SET is_read = true
            WHERE chat_id = $1
              AND id = ANY($3)
              AND sender_id != $2
              AND is_read = false
            RETURNING id
            "#,
        )
        .bind(room_id)
        .bind(viewer_id)
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_unread_message_count(&self, user_id: Uuid) -> Result<i64, Error> {
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM chat_messages m
            INNER JOIN chat_rooms c ON m.chat_id = c.id
            WHERE (c.participant_a_id = $1 OR c.participant_b_id = $1)
              AND m.sender_id != $1
              AND m.is_read = false
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn get_room_unread_count(&self, room_id: Uuid, viewer_id: Uuid) -> Result<i64, Error> {
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM chat_messages
            WHERE chat_id = $1
              AND sender_id != $2
              AND is_read = false
            "#,
        )
        .bind(room_id)
        .bind(viewer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }
}
