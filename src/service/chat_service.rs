// service/chat_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{
        cache::{CacheHelper, MESSAGE_CACHE_TTL, ROOM_CACHE_TTL},
        chatdb::{ChatExt, RoomSummary},
        db::DBClient,
        userdb::UserExt,
    },
    dtos::chatdtos::{MarkReadDto, OpenRoomDto, SendMessageDto},
    models::{
        chatmodel::{ChatMessage, ChatRoom, SenderRole},
        usermodel::{User, UserRole},
    },
    service::{
        error::ServiceError,
        fanout_service::FanoutService,
        realtime::{room_topic, user_topic, RealtimeBus, RealtimeEvent},
    },
};

#[derive(Clone)]
pub struct ChatService {
    db_client: Arc<DBClient>,
    bus: Arc<RealtimeBus>,
    fanout: FanoutService,
}

impl ChatService {
    pub fn new(db_client: Arc<DBClient>, bus: Arc<RealtimeBus>, fanout: FanoutService) -> Self {
        Self {
            db_client,
            bus,
            fanout,
        }
    }

    /// Opens (or re-opens) the room between the caller and the other
    /// participant. Keyed on the conversation key, so any number of
    /// concurrent opens land on the same single row. The other side is
    /// only notified when the room is actually new.
    pub async fn open_room(
        &self,
        caller: &User,
        dto: OpenRoomDto,
    ) -> Result<(ChatRoom, bool), ServiceError> {
        if dto.participant_id == caller.id {
            return Err(ServiceError::Validation(
                "You cannot open a chat with yourself".to_string(),
            ));
        }

        let participant = self
            .db_client
            .get_user(Some(dto.participant_id), None)
            .await?
            .ok_or_else(|| {
                ServiceError::Validation(format!("User {} does not exist", dto.participant_id))
            })?;

        let conversation_key = match dto.booking_id {
            Some(booking_id) => ChatRoom::booking_key(booking_id),
            None => ChatRoom::direct_key(caller.id, dto.participant_id),
        };

        let (room, created) = self
            .db_client
            .get_or_create_room(&conversation_key, caller.id, dto.participant_id, dto.booking_id)
            .await?;

        if created {
            tracing::info!(
                "Room {} opened between {} and {}",
                room.id,
                caller.id,
                participant.id
            );

            self.invalidate_room(&room).await;

            if let Err(e) = self
                .fanout
                .notify_room_opened(&room, dto.participant_id, &caller.name)
                .await
            {
                tracing::warn!("Room-opened notification failed: {}", e.to_string());
            }
        }

        Ok((room, created))
    }

    pub async fn my_rooms(
        &self,
        user_id: Uuid,
        page: u32,
        limit: usize,
    ) -> Result<Vec<RoomSummary>, ServiceError> {
        let offset = (page - 1) as i64 * limit as i64;
        let cache_key = format!("user_rooms:{}:{}:{}", user_id, page, limit);

        if let Some(redis) = &self.db_client.redis_client {
            if let Ok(Some(cached)) = CacheHelper::get::<Vec<RoomSummary>>(redis, &cache_key).await
            {
                return Ok(cached);
            }
        }

        let rooms = self
            .db_client
            .get_user_rooms(user_id, limit as i64, offset)
            .await?;

        if let Some(redis) = &self.db_client.redis_client {
            let _ = CacheHelper::set(redis, &cache_key, &rooms, ROOM_CACHE_TTL).await;
        }

        Ok(rooms)
    }

    /// Loads the room and enforces membership in one step. Everything
    /// that touches a room goes through here first.
    pub async fn get_room_for(
        &self,
        viewer_id: Uuid,
        room_id: Uuid,
    ) -> Result<ChatRoom, ServiceError> {
        let room = self
            .db_client
            .get_room_by_id(room_id)
            .await?
            .ok_or(ServiceError::RoomNotFound(room_id))?;

        if !room.has_participant(viewer_id) {
            return Err(ServiceError::NotAParticipant(viewer_id, room_id));
        }

        Ok(room)
    }

    /// Persists the message, then pushes it to the room topic and to the
    /// recipient's user topic. The broadcast id IS the database id, so
    /// clients can safely dedup whatever reaches them twice.
    pub async fn send_message(
        &self,
        sender: &User,
        room_id: Uuid,
        dto: SendMessageDto,
    ) -> Result<ChatMessage, ServiceError> {
        let room = self.get_room_for(sender.id, room_id).await?;

        if room.is_active == Some(false) {
            return Err(ServiceError::Validation(
                "This conversation is closed".to_string(),
            ));
        }

        let content = dto.content.trim();
        if content.is_empty() {
            return Err(ServiceError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }

        let sender_role = match sender.role {
            UserRole::Provider => SenderRole::Provider,
            _ => SenderRole::User,
        };

        let message = self
            .db_client
            .send_message(room_id, sender.id, sender_role, content)
            .await?;

        let recipient_id = room.other_participant(sender.id);

        let event = RealtimeEvent::MessageCreated {
            message_id: message.id,
            room_id,
            sender_id: sender.id,
            recipient_id,
            content: message.content.clone(),
            created_at: message.created_at,
        };
        self.bus.publish(&room_topic(room_id), event.clone()).await;
        self.bus.publish(&user_topic(recipient_id), event).await;

        self.invalidate_room(&room).await;
        self.invalidate_unread(recipient_id).await;

        Ok(message)
    }

    pub async fn room_messages(
        &self,
        viewer_id: Uuid,
        room_id: Uuid,
        page: u32,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ServiceError> {
        self.get_room_for(viewer_id, room_id).await?;

        let offset = (page - 1) as i64 * limit as i64;
        let cache_key = format!("room_messages:{}:{}:{}", room_id, page, limit);

        if let Some(redis) = &self.db_client.redis_client {
            if let Ok(Some(cached)) =
                CacheHelper::get::<Vec<ChatMessage>>(redis, &cache_key).await
            {
                return Ok(cached);
            }
        }

        let messages = self
            .db_client
            .get_room_messages(room_id, limit as i64, offset)
            .await?;

        if let Some(redis) = &self.db_client.redis_client {
            let _ = CacheHelper::set(redis, &cache_key, &messages, MESSAGE_CACHE_TTL).await;
        }

        Ok(messages)
    }

    /// Marks the listed messages read for the viewer and reports only the
    /// ids this call flipped. An empty request and a repeat of an already
    /// read set are both quiet no-ops; read events only carry ids that
    /// really changed, so counters never double-decrement.
    pub async fn mark_read(
        &self,
        viewer_id: Uuid,
        room_id: Uuid,
        dto: MarkReadDto,
    ) -> Result<Vec<Uuid>, ServiceError> {
        let room = self.get_room_for(viewer_id, room_id).await?;

        if dto.message_ids.is_empty() {
            return Ok(vec![]);
        }

        let flipped = self
            .db_client
            .mark_messages_read(room_id, viewer_id, &dto.message_ids)
            .await?;

        if !flipped.is_empty() {
            let event = RealtimeEvent::MessagesRead {
                room_id,
                viewer_id,
                message_ids: flipped.clone(),
            };
            self.bus.publish(&room_topic(room_id), event.clone()).await;
            self.bus.publish(&user_topic(viewer_id), event).await;

            self.invalidate_room(&room).await;
            self.invalidate_unread(viewer_id).await;
        }

        Ok(flipped)
    }

    pub async fn room_unread_count(
        &self,
        viewer_id: Uuid,
        room_id: Uuid,
    ) -> Result<i64, ServiceError> {
        self.get_room_for(viewer_id, room_id).await?;
        Ok(self
            .db_client
            .get_room_unread_count(room_id, viewer_id)
            .await?)
    }

    async fn invalidate_room(&self, room: &ChatRoom) {
        if let Some(redis) = &self.db_client.redis_client {
            if let Err(e) = CacheHelper::invalidate_room_caches(
                redis,
                room.id,
                room.participant_a_id,
                room.participant_b_id,
            )
            .await
            {
                tracing::warn!("Failed to invalidate room caches: {}", e.to_string());
            }
        }
    }

    async fn invalidate_unread(&self, user_id: Uuid) {
        if let Some(redis) = &self.db_client.redis_client {
            if let Err(e) = CacheHelper::invalidate_unread_count(redis, user_id).await {
                tracing::warn!("Failed to invalidate unread count: {}", e.to_string());
            }
        }
    }
}
