use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

//Chat DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct OpenRoomDto {
    pub participant_id: Uuid,
    /// When present the room is scoped to the booking instead of being
    /// the one shared direct-message room for the pair.
    pub booking_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SendMessageDto {
    #[validate(length(min = 1, max = 5000, message = "Message must be between 1 and 5000 characters"))]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadDto {
    pub message_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn oversized_messages_are_rejected() {
        let dto = SendMessageDto {
            content: "x".repeat(5001),
        };
        assert!(dto.validate().is_err());

        let at_limit = SendMessageDto {
            content: "x".repeat(5000),
        };
        assert!(at_limit.validate().is_ok());
    }
}
