// handler/bids.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    dtos::requestdtos::{ApiResponse, PaginationParams},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn bid_handler() -> Router {
    Router::new()
        .route("/my", get(get_my_bids))
        .route("/:bid_id/withdraw", put(withdraw_bid))
        .route("/:bid_id/accept", put(accept_bid))
}

pub async fn get_my_bids(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, HttpError> {
    let page = pagination.page.unwrap_or(1).max(1);
    let limit = pagination.limit.unwrap_or(20).min(100);

    let bids = app_state
        .bid_service
        .my_bids(auth.user.id, page, limit)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "bids": bids,
            "page": page,
            "limit": limit
        }
    })))
}

pub async fn withdraw_bid(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(bid_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let bid = app_state
        .bid_service
        .withdraw_bid(bid_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Bid withdrawn", bid)))
}

pub async fn accept_bid(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(bid_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (request, bid, rejected) = app_state
        .bid_service
        .accept_bid(bid_id, auth.user.id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Bid accepted",
        "data": {
            "request": request,
            "accepted_bid": bid,
            "rejected_bids": rejected.len()
        }
    })))
}
