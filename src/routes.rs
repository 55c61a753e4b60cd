// routes.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Extension, Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        bids::bid_handler,
        chat::chat_handler,
        events::events_handler,
        notifications::{notification_routes, unread_handler},
        requests::request_handler,
    },
    middleware::auth,
    AppState,
};

// Health check handler
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest(
            "/requests",
            request_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/bids",
            bid_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/chats",
            chat_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/notifications",
            notification_routes()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/unread",
            unread_handler()
                .layer(middleware::from_fn(auth))
        )
        .nest(
            "/events",
            events_handler()
                .layer(middleware::from_fn(auth))
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}
