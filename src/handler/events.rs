// handler/events.rs
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::Path,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::{
    error::HttpError,
    middleware::JWTAuthMiddeware,
    service::realtime::{room_topic, user_topic, TopicEvent},
    AppState,
};

pub fn events_handler() -> Router {
    Router::new()
        .route("/rooms/:room_id", get(room_events))
        .route("/me", get(my_events))
}

/// Live events for one chat room. The membership check runs once before
/// the stream opens; a user removed later just stops getting messages
/// addressed to them.
async fn room_events(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(room_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    app_state
        .chat_service
        .get_room_for(auth.user.id, room_id)
        .await?;

    let receiver = app_state.bus.subscribe();

    Ok(stream_topic(receiver, room_topic(room_id)))
}

/// Live events addressed to the authenticated user: incoming messages,
/// notifications and read receipts from other devices.
async fn my_events(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let receiver = app_state.bus.subscribe();

    Ok(stream_topic(receiver, user_topic(auth.user.id)))
}

fn stream_topic(
    mut receiver: broadcast::Receiver<TopicEvent>,
    topic: String,
) -> Sse<UnboundedReceiverStream<Result<Event, Infallible>>> {
    let (sender, rx) = mpsc::unbounded_channel::<Result<Event, Infallible>>();

    tokio::spawn(async move {
        let mut heartbeat = interval(Duration::from_secs(15));
        loop {
            tokio::select! {
                event = receiver.recv() => {
                    match event {
                        Ok(topic_event) => {
                            if topic_event.topic != topic {
                                continue;
                            }
                            if sender.send(Ok(bus_event(&topic_event))).is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(_)) => {
                            // The bus keeps no replay buffer; the client refetches
                            if sender
                                .send(Ok(Event::default().event("lagged").data("resync")))
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    if sender.send(Ok(Event::default().event("ping").data("keep-alive"))).is_err() {
                        break;
                    }
                }
            }
        }
    });

    Sse::new(UnboundedReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn bus_event(topic_event: &TopicEvent) -> Event {
    Event::default()
        .json_data(&topic_event.event)
        .unwrap_or_else(|_| Event::default().event("error").data("failed-to-serialize-event"))
}
