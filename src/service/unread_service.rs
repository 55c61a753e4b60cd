// service/unread_service.rs
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::{
        cache::{CacheHelper, UNREAD_CACHE_TTL},
        chatdb::ChatExt,
        db::DBClient,
        notificationdb::NotificationExt,
    },
    service::{
        error::ServiceError,
        realtime::{RealtimeBus, RealtimeEvent},
    },
};

/// How many subject ids the dedup ledger remembers before evicting the
/// oldest. Evicted ids can drift the counter on a very late duplicate;
/// the periodic reconcile pass absorbs that.
const SEEN_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnreadSnapshot {
    pub chat: i64,
    pub notifications: i64,
}

impl UnreadSnapshot {
    pub fn total(&self) -> i64 {
        self.chat + self.notifications
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CounterKind {
    Chat,
    Notification,
}

#[derive(Debug)]
struct SeenState {
    recipient: Uuid,
    kind: CounterKind,
    counted: bool,
    read: bool,
}

/// Pure projection of unread totals from bus events.
///
/// The bus is at-least-once, so every event can arrive twice and read
/// receipts can overtake the create they refer to. Each subject id gets
/// one ledger entry; an id is counted at most once and un-counted at
/// most once, in whatever order the halves show up.
pub struct UnreadCounters {
    chat: HashMap<Uuid, i64>,
    notifications: HashMap<Uuid, i64>,
    seen: HashMap<Uuid, SeenState>,
    order: VecDeque<Uuid>,
    baselined: HashSet<Uuid>,
    seen_capacity: usize,
}

impl Default for UnreadCounters {
    fn default() -> Self {
        Self::with_seen_capacity(SEEN_CAPACITY)
    }
}

impl UnreadCounters {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_seen_capacity(seen_capacity: usize) -> Self {
        Self {
            chat: HashMap::new(),
            notifications: HashMap::new(),
            seen: HashMap::new(),
            order: VecDeque::new(),
            baselined: HashSet::new(),
            seen_capacity,
        }
    }

    pub fn apply(&mut self, event: &RealtimeEvent) {
        match event {
            RealtimeEvent::MessageCreated {
                message_id,
                recipient_id,
                ..
            } => self.apply_created(*message_id, *recipient_id, CounterKind::Chat),
            RealtimeEvent::MessagesRead {
                viewer_id,
                message_ids,
                ..
            } => {
                for id in message_ids {
                    self.apply_read(*id, *viewer_id, CounterKind::Chat);
                }
            }
            RealtimeEvent::NotificationCreated {
                notification_id,
                recipient_id,
                ..
            } => self.apply_created(*notification_id, *recipient_id, CounterKind::Notification),
            RealtimeEvent::NotificationsRead {
                recipient_id,
                notification_ids,
            } => {
                for id in notification_ids {
                    self.apply_read(*id, *recipient_id, CounterKind::Notification);
                }
            }
        }
    }

    fn apply_created(&mut self, subject_id: Uuid, recipient_id: Uuid, kind: CounterKind) {
        self.remember(subject_id, recipient_id, kind);
        let (should_count, recipient, kind) = {
            let entry = self.seen.get_mut(&subject_id).expect("just inserted");
            if entry.counted {
                return; // duplicate delivery
            }
            entry.counted = true;
            // read arrived first: counted and read cancel out, nothing to add
            (!entry.read, entry.recipient, entry.kind)
        };
        if should_count {
            *self.counter(recipient, kind) += 1;
        }
    }

    fn apply_read(&mut self, subject_id: Uuid, recipient_id: Uuid, kind: CounterKind) {
        self.remember(subject_id, recipient_id, kind);
        let (should_discount, recipient, kind) = {
            let entry = self.seen.get_mut(&subject_id).expect("just inserted");
            if entry.read {
                return; // duplicate receipt
            }
            entry.read = true;
            (entry.counted, entry.recipient, entry.kind)
        };
        if should_discount {
            let counter = self.counter(recipient, kind);
            *counter = (*counter - 1).max(0);
        }
    }

    fn remember(&mut self, subject_id: Uuid, recipient_id: Uuid, kind: CounterKind) {
        if self.seen.contains_key(&subject_id) {
            return;
        }
        if self.seen.len() >= self.seen_capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(
            subject_id,
            SeenState {
                recipient: recipient_id,
                kind,
                counted: false,
                read: false,
            },
        );
        self.order.push_back(subject_id);
    }

    fn counter(&mut self, user_id: Uuid, kind: CounterKind) -> &mut i64 {
        match kind {
            CounterKind::Chat => self.chat.entry(user_id).or_insert(0),
            CounterKind::Notification => self.notifications.entry(user_id).or_insert(0),
        }
    }

    pub fn snapshot(&self, user_id: Uuid) -> UnreadSnapshot {
        UnreadSnapshot {
            chat: self.chat.get(&user_id).copied().unwrap_or(0),
            notifications: self.notifications.get(&user_id).copied().unwrap_or(0),
        }
    }

    /// Overwrites the projection with an authoritative count. The ledger
    /// is kept, so events already applied are not applied again later.
    pub fn set_absolute(&mut self, user_id: Uuid, snapshot: UnreadSnapshot) {
        self.chat.insert(user_id, snapshot.chat);
        self.notifications.insert(user_id, snapshot.notifications);
        self.baselined.insert(user_id);
    }

    pub fn is_baselined(&self, user_id: Uuid) -> bool {
        self.baselined.contains(&user_id)
    }

    pub fn baselined_users(&self) -> Vec<Uuid> {
        self.baselined.iter().copied().collect()
    }

    /// Drops everything. Used after the bus reports lost events, when the
    /// projection can no longer be trusted.
    pub fn reset(&mut self) {
        self.chat.clear();
        self.notifications.clear();
        self.seen.clear();
        self.order.clear();
        self.baselined.clear();
    }
}

#[derive(Clone)]
pub struct UnreadService {
    db_client: Arc<DBClient>,
    bus: Arc<RealtimeBus>,
    counters: Arc<RwLock<UnreadCounters>>,
}

impl UnreadService {
    pub fn new(db_client: Arc<DBClient>, bus: Arc<RealtimeBus>) -> Self {
        Self {
            db_client,
            bus,
            counters: Arc::new(RwLock::new(UnreadCounters::new())),
        }
    }

    /// Cheap read for the badge. Served from the projection once a user
    /// has a baseline; the first call per user primes it from cache or
    /// the database.
    pub async fn live_count(&self, user_id: Uuid) -> Result<UnreadSnapshot, ServiceError> {
        {
            let counters = self.counters.read().await;
            if counters.is_baselined(user_id) {
                return Ok(counters.snapshot(user_id));
            }
        }

        if let Some(redis) = &self.db_client.redis_client {
            let cache_key = format!("unread_count:{}", user_id);
            if let Ok(Some(cached)) = CacheHelper::get::<UnreadSnapshot>(redis, &cache_key).await {
                self.counters.write().await.set_absolute(user_id, cached);
                return Ok(cached);
            }
        }

        self.recount(user_id).await
    }

    /// Authoritative recount straight from the database. Replaces the
    /// projection and refreshes the cache.
    pub async fn recount(&self, user_id: Uuid) -> Result<UnreadSnapshot, ServiceError> {
        let chat = self.db_client.get_unread_message_count(user_id).await?;
        let notifications = self
            .db_client
            .get_unread_notification_count(user_id)
            .await?;

        let snapshot = UnreadSnapshot {
            chat,
            notifications,
        };

        self.counters.write().await.set_absolute(user_id, snapshot);

        if let Some(redis) = &self.db_client.redis_client {
            let cache_key = format!("unread_count:{}", user_id);
            let _ = CacheHelper::set(redis, &cache_key, &snapshot, UNREAD_CACHE_TTL).await;
        }

        Ok(snapshot)
    }

    /// Recounts every user the projection is tracking and logs how far
    /// the projection had drifted. Called from the background job.
    pub async fn reconcile(&self) -> Result<usize, ServiceError> {
        let users = self.counters.read().await.baselined_users();
        let mut corrected = 0;

        for user_id in users {
            let before = self.counters.read().await.snapshot(user_id);
            let after = self.recount(user_id).await?;
            if before != after {
                corrected += 1;
                tracing::warn!(
                    "Unread drift for {}: chat {} -> {}, notifications {} -> {}",
                    user_id,
                    before.chat,
                    after.chat,
                    before.notifications,
                    after.notifications
                );
            }
        }

        Ok(corrected)
    }

    /// Consume the bus until shutdown. A lagged receiver means events were
    /// dropped, at which point every projected value is suspect and the
    /// whole projection starts over.
    pub async fn run_forever(&self, shutdown: impl Future<Output = ()>) {
        let mut shutdown = Box::pin(shutdown);
        let mut rx = self.bus.subscribe();

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("UnreadService: shutdown requested, exiting loop");
                    break;
                }
                received = rx.recv() => {
                    match received {
                        Ok(topic_event) => {
                            self.counters.write().await.apply(&topic_event.event);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(
                                "UnreadService: lost {} events, resetting projection",
                                skipped
                            );
                            self.counters.write().await.reset();
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            tracing::info!("UnreadService: bus closed, exiting loop");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("UnreadService: stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_created(message_id: Uuid, recipient_id: Uuid) -> RealtimeEvent {
        RealtimeEvent::MessageCreated {
            message_id,
            room_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            recipient_id,
            content: "hello".to_string(),
            created_at: None,
        }
    }

    fn messages_read(viewer_id: Uuid, message_ids: Vec<Uuid>) -> RealtimeEvent {
        RealtimeEvent::MessagesRead {
            room_id: Uuid::new_v4(),
            viewer_id,
            message_ids,
        }
    }

    fn notification_created(notification_id: Uuid, recipient_id: Uuid) -> RealtimeEvent {
        RealtimeEvent::NotificationCreated {
            notification_id,
            recipient_id,
            kind: crate::models::notificationmodel::NotificationKind::Request,
            reference_id: Uuid::new_v4(),
            message: "New plumbing request".to_string(),
        }
    }

    #[test]
    fn duplicate_message_events_count_once() {
        let mut counters = UnreadCounters::new();
        let user = Uuid::new_v4();
        let message = Uuid::new_v4();

        counters.apply(&message_created(message, user));
        counters.apply(&message_created(message, user));

        assert_eq!(counters.snapshot(user).chat, 1);
    }

    #[test]
    fn duplicate_read_receipts_decrement_once() {
        let mut counters = UnreadCounters::new();
        let user = Uuid::new_v4();
        let message = Uuid::new_v4();

        counters.apply(&message_created(message, user));
        counters.apply(&messages_read(user, vec![message]));
        counters.apply(&messages_read(user, vec![message]));

        assert_eq!(counters.snapshot(user).chat, 0);
    }

    #[test]
    fn read_receipt_overtaking_create_nets_zero() {
        let mut counters = UnreadCounters::new();
        let user = Uuid::new_v4();
        let message = Uuid::new_v4();

        counters.apply(&messages_read(user, vec![message]));
        counters.apply(&message_created(message, user));

        assert_eq!(counters.snapshot(user).chat, 0);
    }

    #[test]
    fn chat_and_notification_counters_are_independent() {
        let mut counters = UnreadCounters::new();
        let user = Uuid::new_v4();

        counters.apply(&message_created(Uuid::new_v4(), user));
        counters.apply(&notification_created(Uuid::new_v4(), user));
        counters.apply(&notification_created(Uuid::new_v4(), user));

        let snapshot = counters.snapshot(user);
        assert_eq!(snapshot.chat, 1);
        assert_eq!(snapshot.notifications, 2);
        assert_eq!(snapshot.total(), 3);
    }

    #[test]
    fn interleaved_redelivery_matches_the_quiescent_recount() {
        // 3 messages, 2 of them read; 2 notifications, 1 read.
        // Expected steady state: chat 1, notifications 1.
        let user = Uuid::new_v4();
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        let m3 = Uuid::new_v4();
        let n1 = Uuid::new_v4();
        let n2 = Uuid::new_v4();

        let deliveries = vec![
            messages_read(user, vec![m1]), // receipt before its create
            message_created(m1, user),
            message_created(m2, user),
            message_created(m2, user), // duplicate
            notification_created(n1, user),
            message_created(m3, user),
            messages_read(user, vec![m2]),
            notification_created(n2, user),
            RealtimeEvent::NotificationsRead {
                recipient_id: user,
                notification_ids: vec![n1],
            },
            messages_read(user, vec![m1, m2]), // duplicates of both receipts
            message_created(m1, user),         // late duplicate
        ];

        let mut counters = UnreadCounters::new();
        for event in &deliveries {
            counters.apply(event);
        }

        assert_eq!(
            counters.snapshot(user),
            UnreadSnapshot {
                chat: 1,
                notifications: 1
            }
        );
    }

    #[test]
    fn events_for_other_users_do_not_leak() {
        let mut counters = UnreadCounters::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        counters.apply(&message_created(Uuid::new_v4(), alice));
        counters.apply(&notification_created(Uuid::new_v4(), bob));

        assert_eq!(counters.snapshot(alice).chat, 1);
        assert_eq!(counters.snapshot(alice).notifications, 0);
        assert_eq!(counters.snapshot(bob).chat, 0);
        assert_eq!(counters.snapshot(bob).notifications, 1);
    }

    #[test]
    fn baseline_survives_already_applied_events() {
        let mut counters = UnreadCounters::new();
        let user = Uuid::new_v4();
        let message = Uuid::new_v4();

        counters.apply(&message_created(message, user));

        // Recount says 5 unread, which already includes the message above
        counters.set_absolute(
            user,
            UnreadSnapshot {
                chat: 5,
                notifications: 0,
            },
        );
        assert!(counters.is_baselined(user));

        // A duplicate of the applied event must not bump the baseline
        counters.apply(&message_created(message, user));
        assert_eq!(counters.snapshot(user).chat, 5);

        // Reading it still decrements exactly once
        counters.apply(&messages_read(user, vec![message]));
        counters.apply(&messages_read(user, vec![message]));
        assert_eq!(counters.snapshot(user).chat, 4);
    }

    #[test]
    fn evicted_ledger_entries_allow_drift_until_reconcile() {
        let mut counters = UnreadCounters::with_seen_capacity(2);
        let user = Uuid::new_v4();
        let m1 = Uuid::new_v4();
        let m2 = Uuid::new_v4();
        let m3 = Uuid::new_v4();

        counters.apply(&message_created(m1, user));
        counters.apply(&message_created(m2, user));
        counters.apply(&message_created(m3, user)); // evicts m1's entry

        // The late duplicate of m1 is no longer recognized
        counters.apply(&message_created(m1, user));
        assert_eq!(counters.snapshot(user).chat, 4);

        // reset() is the recovery hatch the lag path uses
        counters.reset();
        assert_eq!(counters.snapshot(user).chat, 0);
        assert!(!counters.is_baselined(user));
    }
}
