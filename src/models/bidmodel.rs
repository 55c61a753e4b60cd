use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "bid_status", rename_all = "snake_case")]
pub enum BidStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl BidStatus {
    pub fn to_str(&self) -> &str {
        match self {
            BidStatus::Pending => "pending",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
            BidStatus::Withdrawn => "withdrawn",
        }
    }

    /// Pending is the only state a bid can leave. Accepted, rejected and
    /// withdrawn are all terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BidStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: Uuid,
    pub request_id: Uuid,
    pub provider_id: Uuid,
    pub amount: BigDecimal,
    pub estimated_time: String,
    pub message: Option<String>,
    pub status: Option<BidStatus>, // Database has DEFAULT 'pending', can be NULL
    pub created_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
    pub updated_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_bids_can_move() {
        assert!(!BidStatus::Pending.is_terminal());
        assert!(BidStatus::Accepted.is_terminal());
        assert!(BidStatus::Rejected.is_terminal());
        assert!(BidStatus::Withdrawn.is_terminal());
    }
}
