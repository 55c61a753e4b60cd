use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::models::notificationmodel::NotificationKind;

/// In-process event bus with an optional Redis pub/sub relay
///
/// Every event is published to the local broadcast channel first, so a
/// single-instance deployment works with no Redis at all. When Redis is
/// configured the event also goes out on the topic channel, and the relay
/// loop feeds foreign instances' events back into the local channel.
/// Delivery is at-least-once; consumers dedup on the ids inside the event.

const BUS_CAPACITY: usize = 1024;

pub fn room_topic(room_id: Uuid) -> String {
    format!("room:{}", room_id)
}

pub fn user_topic(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    MessageCreated {
        message_id: Uuid,
        room_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        content: String,
        created_at: Option<DateTime<Utc>>,
    },
    MessagesRead {
        room_id: Uuid,
        viewer_id: Uuid,
        message_ids: Vec<Uuid>,
    },
    NotificationCreated {
        notification_id: Uuid,
        recipient_id: Uuid,
        kind: NotificationKind,
        reference_id: Uuid,
        message: String,
    },
    NotificationsRead {
        recipient_id: Uuid,
        notification_ids: Vec<Uuid>,
    },
}

/// One event addressed to one topic, as seen by local subscribers.
#[derive(Debug, Clone)]
pub struct TopicEvent {
    pub topic: String,
    pub event: RealtimeEvent,
}

/// What travels over Redis between instances. The origin id lets an
/// instance drop its own publishes when they echo back off the wire.
#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    origin: Uuid,
    topic: String,
    event: RealtimeEvent,
}

pub struct RealtimeBus {
    instance_id: Uuid,
    sender: broadcast::Sender<TopicEvent>,
    redis_client: Option<redis::Client>,
    redis: Option<Arc<ConnectionManager>>,
}

impl RealtimeBus {
    pub fn new(redis_client: Option<redis::Client>, redis: Option<Arc<ConnectionManager>>) -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            instance_id: Uuid::new_v4(),
            sender,
            redis_client,
            redis,
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Subscribers get the whole firehose and filter on topic themselves.
    pub fn subscribe(&self) -> broadcast::Receiver<TopicEvent> {
        self.sender.subscribe()
    }

    /// Publish locally, then relay over Redis when it is configured.
    /// A Redis failure is logged and swallowed; the write that produced
    /// this event has already committed and must not be failed here.
    pub async fn publish(&self, topic: &str, event: RealtimeEvent) {
        let _ = self.sender.send(TopicEvent {
            topic: topic.to_string(),
            event: event.clone(),
        });

        if let Some(redis) = &self.redis {
            let envelope = WireEnvelope {
                origin: self.instance_id,
                topic: topic.to_string(),
                event,
            };
            let payload = match serde_json::to_string(&envelope) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("RealtimeBus: failed to encode event: {}", e.to_string());
                    return;
                }
            };

            let mut conn = ConnectionManager::clone(redis);
            let result: Result<i64, redis::RedisError> = conn.publish(topic, payload).await;
            if let Err(e) = result {
                tracing::warn!("RealtimeBus: redis publish failed: {}", e.to_string());
            }
        }
    }

    /// Run the relay loop until the provided shutdown signal triggers.
    /// Without Redis there is nothing to relay, so the task just waits
    /// for shutdown.
    pub async fn run_forever(&self, shutdown: impl Future<Output = ()>) {
        let Some(client) = &self.redis_client else {
            tracing::info!("RealtimeBus: Redis not configured; running single-instance, no relay");
            shutdown.await;
            return;
        };

        let mut shutdown = Box::pin(shutdown);
        let mut retry_sleep = Duration::from_secs(1);

        'outer: loop {
            // Check shutdown first
            if futures::future::poll_immediate(&mut shutdown).await.is_some() {
                tracing::info!("RealtimeBus: shutdown requested, exiting loop");
                break;
            }

            let conn = match client.get_async_connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!("RealtimeBus: pubsub connect failed: {}", e.to_string());
                    sleep(retry_sleep).await;
                    retry_sleep = (retry_sleep * 2).min(Duration::from_secs(30));
                    continue;
                }
            };

            let mut pubsub = conn.into_pubsub();
            if let Err(e) = pubsub.psubscribe("room:*").await {
                tracing::error!("RealtimeBus: psubscribe room:* failed: {}", e.to_string());
                sleep(retry_sleep).await;
                retry_sleep = (retry_sleep * 2).min(Duration::from_secs(30));
                continue;
            }
            if let Err(e) = pubsub.psubscribe("user:*").await {
                tracing::error!("RealtimeBus: psubscribe user:* failed: {}", e.to_string());
                sleep(retry_sleep).await;
                retry_sleep = (retry_sleep * 2).min(Duration::from_secs(30));
                continue;
            }

            retry_sleep = Duration::from_secs(1);
            tracing::info!("RealtimeBus: relay connected as instance {}", self.instance_id);

            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("RealtimeBus: shutdown requested, exiting loop");
                        break 'outer;
                    }
                    msg = stream.next() => {
                        let Some(msg) = msg else {
                            tracing::warn!("RealtimeBus: pubsub stream closed, reconnecting");
                            break;
                        };
                        self.relay_message(msg);
                    }
                }
            }
        }

        tracing::info!("RealtimeBus: stopped");
    }

    fn relay_message(&self, msg: redis::Msg) {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("RealtimeBus: unreadable pubsub payload: {}", e.to_string());
                return;
            }
        };

        match serde_json::from_str::<WireEnvelope>(&payload) {
            Ok(envelope) => self.relay_envelope(envelope),
            Err(e) => {
                tracing::error!(
                    "RealtimeBus: invalid envelope: {} ; payload: {}",
                    e.to_string(),
                    payload
                );
            }
        }
    }

    fn relay_envelope(&self, envelope: WireEnvelope) {
        // Our own publish coming back off the wire; local delivery already happened
        if envelope.origin == self.instance_id {
            return;
        }

        let _ = self.sender.send(TopicEvent {
            topic: envelope.topic,
            event: envelope.event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_are_prefixed_by_kind() {
        let id = Uuid::new_v4();
        assert_eq!(room_topic(id), format!("room:{}", id));
        assert_eq!(user_topic(id), format!("user:{}", id));
    }

    #[test]
    fn events_are_tagged_on_the_wire() {
        let event = RealtimeEvent::MessagesRead {
            room_id: Uuid::new_v4(),
            viewer_id: Uuid::new_v4(),
            message_ids: vec![Uuid::new_v4()],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"messages_read\""));
    }

    #[tokio::test]
    async fn publish_reaches_local_subscribers_without_redis() {
        let bus = RealtimeBus::new(None, None);
        let mut rx = bus.subscribe();

        let room_id = Uuid::new_v4();
        bus.publish(
            &room_topic(room_id),
            RealtimeEvent::MessagesRead {
                room_id,
                viewer_id: Uuid::new_v4(),
                message_ids: vec![],
            },
        )
        .await;

        let got = rx.recv().await.unwrap();
        assert_eq!(got.topic, room_topic(room_id));
    }

    #[tokio::test]
    async fn own_wire_echo_is_dropped_but_foreign_events_pass() {
        let bus = RealtimeBus::new(None, None);
        let mut rx = bus.subscribe();

        let event = RealtimeEvent::NotificationsRead {
            recipient_id: Uuid::new_v4(),
            notification_ids: vec![],
        };

        bus.relay_envelope(WireEnvelope {
            origin: bus.instance_id(),
            topic: "user:echo".to_string(),
            event: event.clone(),
        });
        bus.relay_envelope(WireEnvelope {
            origin: Uuid::new_v4(),
            topic: "user:foreign".to_string(),
            event,
        });

        let got = rx.recv().await.unwrap();
        assert_eq!(got.topic, "user:foreign");
        assert!(rx.try_recv().is_err());
    }
}
