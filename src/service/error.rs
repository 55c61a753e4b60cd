use thiserror::Error;
use uuid::Uuid;
use crate::error::HttpError;
use axum::http::StatusCode;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Request {0} not found")]
    RequestNotFound(Uuid),

    #[error("Bid {0} not found")]
    BidNotFound(Uuid),

    #[error("Chat room {0} not found")]
    RoomNotFound(Uuid),

    #[error("Request {0} is no longer accepting bids")]
    RequestNotBiddable(Uuid),

    #[error("You already have a pending bid on request {0}")]
    DuplicateBid(Uuid),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("User {0} is not authorized to perform this action on {1}")]
    NotAuthorized(Uuid, Uuid),

    #[error("User {0} is not a participant of room {1}")]
    NotAParticipant(Uuid, Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        HttpError::new(error.to_string(), error.status_code())
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::RequestNotFound(_)
            | ServiceError::BidNotFound(_)
            | ServiceError::RoomNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::RequestNotBiddable(_)
            | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,

            // Losing a race is a conflict, not a client mistake
            ServiceError::InvalidTransition(_)
            | ServiceError::DuplicateBid(_) => StatusCode::CONFLICT,

            ServiceError::NotAuthorized(_, _)
            | ServiceError::NotAParticipant(_, _) => StatusCode::FORBIDDEN,

            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
