// db/notificationdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::notificationmodel::{Notification, NotificationKind};

#[async_trait]
pub trait NotificationExt {
    /// Inserts a notification. When a dedup key is given and a row with
    /// the same key already exists the insert is a no-op and None comes
    /// back, so retried fanouts never double-notify anyone.
    async fn store_notification(
        &self,
        recipient_id: Uuid,
        kind: NotificationKind,
        reference_id: Uuid,
        message: &str,
        dedup_key: Option<&str>,
    ) -> Result<Option<Notification>, Error>;

    async fn get_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, Error>;

    async fn count_notifications(&self, recipient_id: Uuid, unread_only: bool)
        -> Result<i64, Error>;

    async fn get_unread_notification_count(&self, recipient_id: Uuid) -> Result<i64, Error>;

    /// Returns the id only when this call actually flipped the row.
    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Uuid>, Error>;

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<Vec<Uuid>, Error>;

    async fn delete_notification(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, Error>;
}

#[async_trait]
impl NotificationExt for DBClient {
    async fn store_notification(
        &self,
        recipient_id: Uuid,
        kind: NotificationKind,
        reference_id: Uuid,
        message: &str,
        dedup_key: Option<&str>,
    ) -> Result<Option<Notification>, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient_id, kind, reference_id, message, dedup_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (dedup_key) DO NOTHING
            RETURNING id, recipient_id, kind, reference_id, message,
                      dedup_key, is_read, created_at
            "#,
        )
        .bind(recipient_id)
        .bind(kind)
        .bind(reference_id)
        .bind(message)
        .bind(dedup_key)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, Error> {
        sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, kind, reference_id, message,
                   dedup_key, is_read, created_at
            FROM notifications
            WHERE recipient_id = $1
              AND ($2 = false OR is_read = false)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(recipient_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
    ) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE recipient_id = $1
              AND ($2 = false OR is_read = false)
            "#,
        )
        .bind(recipient_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_unread_notification_count(&self, recipient_id: Uuid) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE recipient_id = $1 AND is_read = false
            "#,
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<Option<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE notifications
            SET is_read = true
            WHERE id = $1 AND recipient_id = $2 AND is_read = false
            RETURNING id
            "#,
        )
        .bind(notification_id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mark_all_notifications_read(&self, recipient_id: Uuid) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE notifications
            SET is_read = true
            WHERE recipient_id = $1 AND is_read = false
            RETURNING id
            "#,
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn delete_notification(
        &self,
        notification_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE id = $1 AND recipient_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
