// handler/requests.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::biddtos::SubmitBidDto,
    dtos::requestdtos::{
        ApiResponse, CreateRequestDto, FilterRequestsDto, PaginationParams, RequestOverviewDto,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn request_handler() -> Router {
    Router::new()
        .route("/", post(create_request).get(browse_open_requests))
        .route("/my", get(get_my_requests))
        .route("/:request_id", get(get_request_detail))
        .route("/:request_id/bids", post(submit_bid).get(get_request_bids))
        .route("/:request_id/cancel", put(cancel_request))
        .route("/:request_id/close-bidding", put(close_bidding))
        .route("/:request_id/complete", put(complete_request))
}

pub async fn create_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let request = app_state
        .request_service
        .create_request(auth.user.id, body)
        .await?;

    Ok(Json(ApiResponse::success(
        "Request created successfully",
        request,
    )))
}

pub async fn browse_open_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(_auth): Extension<JWTAuthMiddeware>,
    Query(filter): Query<FilterRequestsDto>,
) -> Result<impl IntoResponse, HttpError> {
    let page = filter.page.unwrap_or(1).max(1);
    let limit = filter.limit.unwrap_or(20).min(100);

    let requests = app_state
        .request_service
        .browse_open_requests(filter.category, page, limit)
        .await?;

    let now = Utc::now();
    let overviews: Vec<RequestOverviewDto> = requests
        .into_iter()
        .map(|row| RequestOverviewDto::from_stats(row, now))
        .collect();

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "requests": overviews,
            "page": page,
            "limit": limit
        }
    })))
}

pub async fn get_my_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, HttpError> {
    let page = pagination.page.unwrap_or(1).max(1);
    let limit = pagination.limit.unwrap_or(20).min(100);

    let requests = app_state
        .request_service
        .my_requests(auth.user.id, page, limit)
        .await?;

    let now = Utc::now();
    let overviews: Vec<RequestOverviewDto> = requests
        .into_iter()
        .map(|row| RequestOverviewDto::from_stats(row, now))
        .collect();

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "requests": overviews,
            "page": page,
            "limit": limit
        }
    })))
}

pub async fn get_request_detail(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (request, bids) = app_state
        .request_service
        .get_request_detail(request_id, auth.user.id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "request": request,
            "bids": bids
        }
    })))
}

pub async fn get_request_bids(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (_, bids) = app_state
        .request_service
        .get_request_detail(request_id, auth.user.id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": bids
    })))
}

pub async fn submit_bid(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<SubmitBidDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let bid = app_state
        .bid_service
        .submit_bid(&auth.user, request_id, body)
        .await?;

    Ok(Json(ApiResponse::success("Bid submitted successfully", bid)))
}

pub async fn cancel_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (request, rejected) = app_state
        .request_service
        .cancel_request(request_id, auth.user.id)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Request cancelled",
        "data": {
            "request": request,
            "rejected_bids": rejected.len()
        }
    })))
}

pub async fn close_bidding(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state
        .request_service
        .close_bidding(request_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Bidding closed", request)))
}

pub async fn complete_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state
        .request_service
        .complete_request(request_id, auth.user.id)
        .await?;

    Ok(Json(ApiResponse::success("Request completed", request)))
}
