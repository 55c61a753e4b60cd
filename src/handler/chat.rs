// handler/chat.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::chatdtos::{MarkReadDto, OpenRoomDto, SendMessageDto},
    dtos::requestdtos::PaginationParams,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn chat_handler() -> Router {
    Router::new()
        .route("/", get(get_user_rooms).post(open_room))
        .route("/:room_id", get(get_room_details))
        .route("/:room_id/messages", get(get_messages).post(send_message))
        .route("/:room_id/read", put(mark_room_read))
}

pub async fn open_room(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<OpenRoomDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (room, created) = app_state.chat_service.open_room(&auth.user, body).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "room": room,
            "created": created
        }
    })))
}

pub async fn get_user_rooms(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, HttpError> {
    let page = pagination.page.unwrap_or(1).max(1);
    let limit = pagination.limit.unwrap_or(20).min(100);

    let rooms = app_state
        .chat_service
        .my_rooms(auth.user.id, page, limit)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "rooms": rooms,
            "page": page,
            "limit": limit
        }
    })))
}

pub async fn get_room_details(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(room_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let room = app_state
        .chat_service
        .get_room_for(auth.user.id, room_id)
        .await?;

    let unread_count = app_state
        .chat_service
        .room_unread_count(auth.user.id, room_id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "room": room,
            "unread_count": unread_count
        }
    })))
}

pub async fn send_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<SendMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let message = app_state
        .chat_service
        .send_message(&auth.user, room_id, body)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": message
    })))
}

pub async fn get_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(room_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, HttpError> {
    let page = pagination.page.unwrap_or(1).max(1);
    let limit = pagination.limit.unwrap_or(50).min(200);

    let messages = app_state
        .chat_service
        .room_messages(auth.user.id, room_id, page, limit)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": messages
    })))
}

pub async fn mark_room_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<MarkReadDto>,
) -> Result<impl IntoResponse, HttpError> {
    let flipped = app_state
        .chat_service
        .mark_read(auth.user.id, room_id, body)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Messages marked as read",
        "data": {
            "read_ids": flipped
        }
    })))
}
