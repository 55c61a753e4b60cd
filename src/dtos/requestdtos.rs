use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;
use validator::Validate;

use crate::db::requestdb::RequestWithStats;
use crate::models::requestmodel::*;
use crate::utils::timefmt::time_remaining;

//Request DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateRequestDto {
    /// Optional; a missing or blank title falls back to the default.
    #[validate(length(max = 100, message = "Title must be at most 100 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 20, max = 2000, message = "Description must be between 20 and 2000 characters"))]
    pub description: String,

    pub category: ServiceCategory,

    pub urgency: Option<UrgencyLevel>,

    #[validate(range(min = 0.0, message = "budget_min must be positive"))]
    pub budget_min: f64,

    #[validate(range(min = 0.0, message = "budget_max must be positive"))]
    pub budget_max: f64,

    #[validate(length(max = 255, message = "Address must be at most 255 characters"))]
    pub location_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FilterRequestsDto {
    pub category: Option<ServiceCategory>,
    pub page: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RequestOverviewDto {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: ServiceCategory,
    pub urgency: UrgencyLevel,
    pub budget_min: BigDecimal,
    pub budget_max: BigDecimal,
    pub location_address: Option<String>,
    pub status: Option<RequestStatus>,
    pub expires_at: DateTime<Utc>,
    pub time_remaining: String,
    pub bid_count: i64,
    pub pending_bid_count: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl RequestOverviewDto {
    pub fn from_stats(row: RequestWithStats, now: DateTime<Utc>) -> Self {
        Self {
            id: row.id,
            requester_id: row.requester_id,
            title: row.title,
            description: row.description,
            category: row.category,
            urgency: row.urgency,
            budget_min: row.budget_min,
            budget_max: row.budget_max,
            location_address: row.location_address,
            status: row.status,
            expires_at: row.expires_at,
            time_remaining: time_remaining(row.expires_at, now),
            bid_count: row.bid_count,
            pending_bid_count: row.pending_bid_count,
            created_at: row.created_at,
        }
    }
}

//Pagination
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<usize>,
}

//Response wrappers
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn short_descriptions_are_rejected() {
        let dto = CreateRequestDto {
            title: None,
            description: "too short".to_string(),
            category: ServiceCategory::Plumbing,
            urgency: None,
            budget_min: 100.0,
            budget_max: 500.0,
            location_address: None,
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn negative_budgets_are_rejected() {
        let dto = CreateRequestDto {
            title: Some("Leaking sink".to_string()),
            description: "Kitchen sink is leaking under the counter".to_string(),
            category: ServiceCategory::Plumbing,
            urgency: Some(UrgencyLevel::High),
            budget_min: -1.0,
            budget_max: 500.0,
            location_address: None,
        };
        assert!(dto.validate().is_err());
    }
}
