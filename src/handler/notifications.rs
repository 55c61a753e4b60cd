// handler/notifications.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    db::{cache::CacheHelper, notificationdb::NotificationExt},
    dtos::notificationdtos::FilterNotificationsDto,
    dtos::requestdtos::ApiResponse,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::notificationmodel::Notification,
    service::realtime::{user_topic, RealtimeEvent},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub notification_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, serde::Serialize)]
pub struct NotificationResponse {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub unread_count: i64,
}

pub fn notification_routes() -> Router {
    Router::new()
        .route("/", get(get_user_notifications))
        .route("/unread-count", get(get_unread_count))
        .route("/read", post(mark_notifications_read))
        .route("/read-all", post(mark_all_notifications_read))
        .route("/:id/read", put(mark_single_notification_read))
        .route("/:id", delete(delete_notification))
}

pub fn unread_handler() -> Router {
    Router::new()
        .route("/", get(get_live_unread))
        .route("/recount", post(recount_unread))
}

async fn get_user_notifications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(filter): Query<FilterNotificationsDto>,
) -> Result<impl IntoResponse, HttpError> {
    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter.limit.unwrap_or(20).min(100) as i64;
    let offset = (page - 1) as i64 * limit;
    let unread_only = filter.unread_only.unwrap_or(false);

    println!("📬 [get_user_notifications] Fetching for user: {}", auth.user.id);

    let total = app_state
        .db_client
        .count_notifications(auth.user.id, unread_only)
        .await
        .map_err(|e| HttpError::server_error(format!("Failed to count notifications: {}", e)))?;

    let unread_count = app_state
        .db_client
        .get_unread_notification_count(auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(format!("Failed to count unread notifications: {}", e)))?;

    let notifications = app_state
        .db_client
        .get_notifications(auth.user.id, unread_only, limit, offset)
        .await
        .map_err(|e| HttpError::server_error(format!("Failed to fetch notifications: {}", e)))?;

    println!("✅ [get_user_notifications] Found {} notifications", notifications.len());

    let response = NotificationResponse {
        notifications,
        total,
        page,
        limit: limit as u32,
        unread_count,
    };

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": response
    })))
}

async fn get_unread_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let count = app_state
        .db_client
        .get_unread_notification_count(auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(format!("Failed to count notifications: {}", e)))?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "unread_count": count
        }
    })))
}

async fn mark_notifications_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, HttpError> {
    println!("📬 [mark_notifications_read] For user: {}", auth.user.id);

    let mut flipped = Vec::new();

    if let Some(notification_ids) = payload.notification_ids {
        for notification_id in notification_ids {
            let read = app_state
                .db_client
                .mark_notification_read(notification_id, auth.user.id)
                .await
                .map_err(|e| {
                    HttpError::server_error(format!("Failed to mark notification as read: {}", e))
                })?;
            if let Some(id) = read {
                flipped.push(id);
            }
        }
    }

    println!("✅ [mark_notifications_read] Marked {} notifications as read", flipped.len());

    publish_notifications_read(&app_state, auth.user.id, &flipped).await;

    Ok(Json(ApiResponse::success(
        "Notifications marked as read",
        serde_json::json!({
            "read_ids": flipped
        }),
    )))
}

async fn mark_all_notifications_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    println!("📬 [mark_all_notifications_read] For user: {}", auth.user.id);

    let flipped = app_state
        .db_client
        .mark_all_notifications_read(auth.user.id)
        .await
        .map_err(|e| {
            HttpError::server_error(format!("Failed to mark all notifications as read: {}", e))
        })?;

    println!("✅ [mark_all_notifications_read] Marked {} notifications as read", flipped.len());

    publish_notifications_read(&app_state, auth.user.id, &flipped).await;

    Ok(Json(ApiResponse::success(
        "All notifications marked as read",
        serde_json::json!({
            "updated_count": flipped.len()
        }),
    )))
}

async fn mark_single_notification_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    println!("📬 [mark_single_notification_read] Notification: {}", notification_id);

    let flipped = app_state
        .db_client
        .mark_notification_read(notification_id, auth.user.id)
        .await
        .map_err(|e| {
            HttpError::server_error(format!("Failed to mark notification as read: {}", e))
        })?
        .map(|id| vec![id])
        .unwrap_or_default();

    publish_notifications_read(&app_state, auth.user.id, &flipped).await;

    Ok(Json(ApiResponse::success(
        "Notification marked as read",
        serde_json::json!({
            "read_ids": flipped
        }),
    )))
}

async fn delete_notification(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    println!("📬 [delete_notification] Notification: {}", notification_id);

    let deleted = app_state
        .db_client
        .delete_notification(notification_id, auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(format!("Failed to delete notification: {}", e)))?;

    if !deleted {
        return Err(HttpError::not_found("Notification not found or already deleted"));
    }

    println!("✅ [delete_notification] Deleted successfully");

    Ok(Json(ApiResponse::success(
        "Notification deleted",
        serde_json::json!({}),
    )))
}

async fn get_live_unread(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = app_state.unread_service.live_count(auth.user.id).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "chat": snapshot.chat,
            "notifications": snapshot.notifications,
            "total": snapshot.total()
        }
    })))
}

async fn recount_unread(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let snapshot = app_state.unread_service.recount(auth.user.id).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Unread counts recounted",
        "data": {
            "chat": snapshot.chat,
            "notifications": snapshot.notifications,
            "total": snapshot.total()
        }
    })))
}

/// Read receipts feed the live counters the same way message reads do.
/// Only ids that actually flipped are published.
async fn publish_notifications_read(app_state: &Arc<AppState>, user_id: Uuid, flipped: &[Uuid]) {
    if flipped.is_empty() {
        return;
    }

    app_state
        .bus
        .publish(
            &user_topic(user_id),
            RealtimeEvent::NotificationsRead {
                recipient_id: user_id,
                notification_ids: flipped.to_vec(),
            },
        )
        .await;

    if let Some(redis) = &app_state.db_client.redis_client {
        if let Err(e) = CacheHelper::invalidate_unread_count(redis, user_id).await {
            tracing::warn!("Failed to invalidate unread count: {}", e.to_string());
        }
    }
}
