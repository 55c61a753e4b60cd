use serde::{Deserialize, Serialize};
use validator::Validate;

//Bid DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubmitBidDto {
    #[validate(range(min = 1.0, message = "Amount must be positive"))]
    pub amount: f64,

    #[validate(length(min = 1, max = 100, message = "Estimated time is required"))]
    pub estimated_time: String,

    #[validate(length(max = 1000, message = "Message must be at most 1000 characters"))]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn zero_amount_bids_are_rejected() {
        let dto = SubmitBidDto {
            amount: 0.0,
            estimated_time: "2 hours".to_string(),
            message: None,
        };
        assert!(dto.validate().is_err());
    }
}
