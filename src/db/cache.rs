// db/cache.rs
use redis::{AsyncCommands, aio::ConnectionManager};
use std::sync::Arc;
use uuid::Uuid;
use serde::{Serialize, de::DeserializeOwned};

/// Cache TTL constants (in seconds)
pub const ROOM_CACHE_TTL: usize = 3600;        // 1 hour
pub const MESSAGE_CACHE_TTL: usize = 1800;     // 30 minutes
pub const UNREAD_CACHE_TTL: usize = 300;       // 5 minutes
pub const REQUEST_CACHE_TTL: usize = 120;      // 2 minutes, browse lists go stale fast

pub struct CacheHelper;

impl CacheHelper {
    /// Generic get from cache
    pub async fn get<T: DeserializeOwned>(
        redis: &Arc<ConnectionManager>,
        key: &str,
    ) -> Result<Option<T>, redis::RedisError> {
        let mut redis = ConnectionManager::clone(redis);
        let cached: Result<String, redis::RedisError> = redis.get(key).await;

        match cached {
            Ok(data) => {
                if let Ok(value) = serde_json::from_str::<T>(&data) {
                    tracing::debug!("Cache HIT: {}", key);
                    Ok(Some(value))
                } else {
                    tracing::warn!("Cache deserialization failed for: {}", key);
                    Ok(None)
                }
            }
            Err(_) => {
                tracing::debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    /// Generic set to cache with TTL
    pub async fn set<T: Serialize>(
        redis: &Arc<ConnectionManager>,
        key: &str,
        value: &T,
        ttl_seconds: usize,
    ) -> Result<(), redis::RedisError> {
        if let Ok(json) = serde_json::to_string(value) {
            let mut conn = ConnectionManager::clone(redis);
            let _: () = conn.set_ex(key, json, ttl_seconds).await?;
            tracing::debug!("Cache SET: {} (TTL: {}s)", key, ttl_seconds);
        }
        Ok(())
    }

    /// Invalidate everything cached for one room and both of its sides
    pub async fn invalidate_room_caches(
        redis: &Arc<ConnectionManager>,
        room_id: Uuid,
        participant_a_id: Uuid,
        participant_b_id: Uuid,
    ) -> Result<(), redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);

        let room_key = format!("room:{}", room_id);
        let _: () = redis::AsyncCommands::del(&mut conn, &room_key).await?;

        // SCAN rather than KEYS so a busy instance never blocks Redis
        Self::scan_and_delete(&conn, &format!("room_messages:{}:*", room_id), "room_messages").await?;

        Self::scan_and_delete(&conn, &format!("user_rooms:{}:*", participant_a_id), "user_rooms_a").await?;
        Self::scan_and_delete(&conn, &format!("user_rooms:{}:*", participant_b_id), "user_rooms_b").await?;

        tracing::debug!("Invalidated all caches for room: {}", room_id);
        Ok(())
    }

    /// Helper: Scan and delete keys matching a pattern without blocking Redis
    async fn scan_and_delete(
        conn: &ConnectionManager,
        pattern: &str,
        pattern_name: &str,
    ) -> Result<(), redis::RedisError> {
        let mut cursor: u64 = 0;
        let mut deleted_count = 0;
        let mut conn = ConnectionManager::clone(conn);

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)  // Process 100 keys per iteration
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                deleted_count += keys.len();
                let _: () = redis::AsyncCommands::del(&mut conn, &keys).await?;
            }

            cursor = new_cursor;
            if cursor == 0 {
                break;  // SCAN complete
            }
        }

        if deleted_count > 0 {
            tracing::debug!("Cache INVALIDATE {}: {} pattern ({} keys deleted)", pattern_name, pattern, deleted_count);
        }
        Ok(())
    }

    /// Invalidate unread count cache for a user
    pub async fn invalidate_unread_count(
        redis: &Arc<ConnectionManager>,
        user_id: Uuid,
    ) -> Result<(), redis::RedisError> {
        let mut conn = ConnectionManager::clone(redis);
        let unread_key = format!("unread_count:{}", user_id);
        let _: () = redis::AsyncCommands::del(&mut conn, &unread_key).await?;
        tracing::debug!("Invalidated unread count for user: {}", user_id);
        Ok(())
    }

    /// Invalidate the open-request browse lists after any request mutation
    pub async fn invalidate_open_requests(
        redis: &Arc<ConnectionManager>,
    ) -> Result<(), redis::RedisError> {
        let conn = ConnectionManager::clone(redis);
        Self::scan_and_delete(&conn, "open_requests:*", "open_requests").await?;
        Ok(())
    }
}
