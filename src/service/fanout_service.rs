// service/fanout_service.rs
use std::sync::Arc;

use rand::Rng;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::{
    db::{db::DBClient, notificationdb::NotificationExt, userdb::UserExt},
    models::{
        bidmodel::Bid,
        chatmodel::ChatRoom,
        notificationmodel::{fanout_dedup_key, room_dedup_key, Notification, NotificationKind},
        requestmodel::LiveRequest,
    },
    service::{
        error::ServiceError,
        realtime::{user_topic, RealtimeBus, RealtimeEvent},
    },
};

const STORE_ATTEMPTS: u32 = 3;

/// What one fanout run did, for the log line.
#[derive(Debug, Default)]
pub struct FanoutReport {
    pub notified: usize,
    pub suppressed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct FanoutService {
    db_client: Arc<DBClient>,
    bus: Arc<RealtimeBus>,
}

impl FanoutService {
    pub fn new(db_client: Arc<DBClient>, bus: Arc<RealtimeBus>) -> Self {
        Self { db_client, bus }
    }

    /// Notify every provider registered for the request's category.
    /// One recipient failing never stops the rest; duplicates from a
    /// retried run are suppressed by the per-recipient dedup key.
    pub async fn fanout_new_request(&self, request: &LiveRequest) -> FanoutReport {
        let providers = match self
            .db_client
            .get_providers_by_category(request.category)
            .await
        {
            Ok(providers) => providers,
            Err(e) => {
                tracing::error!(
                    "Fanout: could not load providers for request {}: {}",
                    request.id,
                    e.to_string()
                );
                return FanoutReport {
                    failed: 1,
                    ..Default::default()
                };
            }
        };

        let message = format!(
            "New {} {} request available!",
            request.urgency.to_str(),
            request.category.display_name()
        );

        let mut report = FanoutReport::default();

        for provider in providers {
            // Providers can post requests too; never notify the author
            if provider.id == request.requester_id {
                continue;
            }

            let dedup_key = fanout_dedup_key(request.id, provider.id);
            match self
                .store_with_retry(
                    provider.id,
                    NotificationKind::Request,
                    request.id,
                    &message,
                    Some(&dedup_key),
                )
                .await
            {
                Ok(Some(notification)) => {
                    report.notified += 1;
                    self.publish_notification(&notification).await;
                }
                Ok(None) => {
                    report.suppressed += 1;
                    tracing::debug!(
                        "Fanout: duplicate suppressed for provider {} on request {}",
                        provider.id,
                        request.id
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        "Fanout: giving up on provider {} for request {}: {}",
                        provider.id,
                        request.id,
                        e.to_string()
                    );
                }
            }
        }

        tracing::info!(
            "Fanout for request {}: {} notified, {} suppressed, {} failed",
            request.id,
            report.notified,
            report.suppressed,
            report.failed
        );

        report
    }

    /// Tell the other side a conversation was just opened with them.
    /// Only fires for rooms this call actually created.
    pub async fn notify_room_opened(
        &self,
        room: &ChatRoom,
        recipient_id: Uuid,
        counterpart_name: &str,
    ) -> Result<(), ServiceError> {
        let dedup_key = room_dedup_key(room.id, recipient_id);
        let message = format!("New chat started with {}", counterpart_name);

        if let Some(notification) = self
            .store_with_retry(
                recipient_id,
                NotificationKind::Chat,
                room.id,
                &message,
                Some(&dedup_key),
            )
            .await?
        {
            self.publish_notification(&notification).await;
        }
        Ok(())
    }

    pub async fn notify_new_bid(
        &self,
        request: &LiveRequest,
        bid: &Bid,
    ) -> Result<(), ServiceError> {
        let dedup_key = format!("bid:{}:new", bid.id);
        let message = format!("New bid on your request \"{}\"", request.title);

        if let Some(notification) = self
            .store_with_retry(
                request.requester_id,
                NotificationKind::Request,
                request.id,
                &message,
                Some(&dedup_key),
            )
            .await?
        {
            self.publish_notification(&notification).await;
        }
        Ok(())
    }

    pub async fn notify_bid_accepted(
        &self,
        request: &LiveRequest,
        bid: &Bid,
    ) -> Result<(), ServiceError> {
        let dedup_key = format!("bid:{}:accepted", bid.id);
        let message = format!("Your bid on \"{}\" was accepted", request.title);

        if let Some(notification) = self
            .store_with_retry(
                bid.provider_id,
                NotificationKind::Request,
                request.id,
                &message,
                Some(&dedup_key),
            )
            .await?
        {
            self.publish_notification(&notification).await;
        }
        Ok(())
    }

    /// Losing bidders after an acceptance or a cancellation. Failures are
    /// logged per recipient, same policy as the request fanout.
    pub async fn notify_bids_rejected(&self, request: &LiveRequest, bids: &[Bid]) -> FanoutReport {
        let message = format!("Your bid on \"{}\" was not selected", request.title);
        let mut report = FanoutReport::default();

        for bid in bids {
            let dedup_key = format!("bid:{}:rejected", bid.id);
            match self
                .store_with_retry(
                    bid.provider_id,
                    NotificationKind::Request,
                    request.id,
                    &message,
                    Some(&dedup_key),
                )
                .await
            {
                Ok(Some(notification)) => {
                    report.notified += 1;
                    self.publish_notification(&notification).await;
                }
                Ok(None) => report.suppressed += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        "Fanout: rejection notice for bid {} failed: {}",
                        bid.id,
                        e.to_string()
                    );
                }
            }
        }

        report
    }

    async fn publish_notification(&self, notification: &Notification) {
        self.bus
            .publish(
                &user_topic(notification.recipient_id),
                RealtimeEvent::NotificationCreated {
                    notification_id: notification.id,
                    recipient_id: notification.recipient_id,
                    kind: notification.kind,
                    reference_id: notification.reference_id,
                    message: notification.message.clone(),
                },
            )
            .await;
    }

    /// Insert with a few retries on transient database errors. The dedup
    /// key makes the retries safe; a duplicate lands as Ok(None).
    async fn store_with_retry(
        &self,
        recipient_id: Uuid,
        kind: NotificationKind,
        reference_id: Uuid,
        message: &str,
        dedup_key: Option<&str>,
    ) -> Result<Option<Notification>, ServiceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .db_client
                .store_notification(recipient_id, kind, reference_id, message, dedup_key)
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < STORE_ATTEMPTS => {
                    tracing::warn!(
                        "Fanout: store attempt {} for {} failed, retrying: {}",
                        attempt,
                        recipient_id,
                        e.to_string()
                    );
                    let jitter = rand::rng().random_range(0..50);
                    sleep(Duration::from_millis(50 * attempt as u64 + jitter)).await;
                }
                Err(e) => return Err(ServiceError::Database(e)),
            }
        }
    }
}
