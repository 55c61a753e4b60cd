use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "service_category", rename_all = "snake_case")]
pub enum ServiceCategory {
    Plumbing,
    Electrical,
    Cleaning,
    Carpentry,
    Painting,
    Carwash,
    Beauty,
    Catering,
    Photography,
    Tutoring,
}

impl ServiceCategory {
    pub fn to_str(&self) -> &str {
        match self {
            ServiceCategory::Plumbing => "plumbing",
            ServiceCategory::Electrical => "electrical",
            ServiceCategory::Cleaning => "cleaning",
            ServiceCategory::Carpentry => "carpentry",
            ServiceCategory::Painting => "painting",
            ServiceCategory::Carwash => "carwash",
            ServiceCategory::Beauty => "beauty",
            ServiceCategory::Catering => "catering",
            ServiceCategory::Photography => "photography",
            ServiceCategory::Tutoring => "tutoring",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ServiceCategory::Plumbing => "Plumbing",
            ServiceCategory::Electrical => "Electrical",
            ServiceCategory::Cleaning => "Cleaning",
            ServiceCategory::Carpentry => "Carpentry",
            ServiceCategory::Painting => "Painting",
            ServiceCategory::Carwash => "Car Wash",
            ServiceCategory::Beauty => "Beauty & Wellness",
            ServiceCategory::Catering => "Catering",
            ServiceCategory::Photography => "Photography",
            ServiceCategory::Tutoring => "Tutoring",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "urgency_level", rename_all = "snake_case")]
pub enum UrgencyLevel {
    Low,
    Medium,
    High,
    Urgent,
}

impl UrgencyLevel {
    pub fn to_str(&self) -> &str {
        match self {
            UrgencyLevel::Low => "low",
            UrgencyLevel::Medium => "medium",
            UrgencyLevel::High => "high",
            UrgencyLevel::Urgent => "urgent",
        }
    }

    /// How long a fresh request stays open for bidding when the caller
    /// gives no explicit expiry.
    pub fn default_expiry_window(&self) -> Duration {
        match self {
            UrgencyLevel::Low => Duration::hours(72),
            UrgencyLevel::Medium => Duration::hours(24),
            UrgencyLevel::High => Duration::hours(6),
            UrgencyLevel::Urgent => Duration::hours(2),
        }
    }
}

impl Default for UrgencyLevel {
    fn default() -> Self {
        UrgencyLevel::Medium
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
pub enum RequestStatus {
    Active,
    BiddingClosed,
    Assigned,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn to_str(&self) -> &str {
        match self {
            RequestStatus::Active => "active",
            RequestStatus::BiddingClosed => "bidding_closed",
            RequestStatus::Assigned => "assigned",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    /// Forward-only transition graph. The SQL guards mirror this table;
    /// anything not listed here is an invalid transition.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Active, BiddingClosed)
                | (Active, Assigned)
                | (Active, Cancelled)
                | (BiddingClosed, Assigned)
                | (BiddingClosed, Cancelled)
                | (Assigned, Completed)
        )
    }

    /// Statuses a bid acceptance may land on. Used as the predicate of the
    /// conditional assignment update.
    pub fn is_acceptable_from(&self) -> bool {
        matches!(self, RequestStatus::Active | RequestStatus::BiddingClosed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LiveRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: ServiceCategory,
    pub urgency: UrgencyLevel,
    pub budget_min: BigDecimal,
    pub budget_max: BigDecimal,
    pub location_address: Option<String>,
    pub status: Option<RequestStatus>, // Database has DEFAULT 'active', can be NULL
    pub assigned_bid_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
    pub updated_at: Option<DateTime<Utc>>, // Database has DEFAULT NOW(), can be NULL
}

impl LiveRequest {
    /// Expiry is a derived condition, never a stored status. A request can
    /// read as `active` in the row and still be expired for every caller.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    pub fn is_biddable(&self, now: DateTime<Utc>) -> bool {
        self.status == Some(RequestStatus::Active) && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_graph_is_forward_only() {
        use RequestStatus::*;

        assert!(Active.can_transition_to(BiddingClosed));
        assert!(Active.can_transition_to(Assigned));
        assert!(Active.can_transition_to(Cancelled));
        assert!(BiddingClosed.can_transition_to(Assigned));
        assert!(BiddingClosed.can_transition_to(Cancelled));
        assert!(Assigned.can_transition_to(Completed));

        // No transition leaves a terminal state
        for next in [Active, BiddingClosed, Assigned, Completed, Cancelled] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }

        // No backward edges
        assert!(!BiddingClosed.can_transition_to(Active));
        assert!(!Assigned.can_transition_to(Active));
        assert!(!Assigned.can_transition_to(BiddingClosed));
        assert!(!Assigned.can_transition_to(Cancelled));
    }

    #[test]
    fn acceptance_only_from_open_states() {
        assert!(RequestStatus::Active.is_acceptable_from());
        assert!(RequestStatus::BiddingClosed.is_acceptable_from());
        assert!(!RequestStatus::Assigned.is_acceptable_from());
        assert!(!RequestStatus::Completed.is_acceptable_from());
        assert!(!RequestStatus::Cancelled.is_acceptable_from());
    }

    #[test]
    fn urgency_controls_expiry_window() {
        assert_eq!(UrgencyLevel::Low.default_expiry_window(), Duration::hours(72));
        assert_eq!(UrgencyLevel::Medium.default_expiry_window(), Duration::hours(24));
        assert_eq!(UrgencyLevel::High.default_expiry_window(), Duration::hours(6));
        assert_eq!(UrgencyLevel::Urgent.default_expiry_window(), Duration::hours(2));
        assert_eq!(UrgencyLevel::default(), UrgencyLevel::Medium);
    }

    #[test]
    fn expired_active_request_is_not_biddable() {
        let now = Utc::now();
        let request = LiveRequest {
            id: Uuid::new_v4(),
            requester_id: Uuid::new_v4(),
            title: "Urgent Service Request".to_string(),
            description: "Kitchen sink is leaking under the counter".to_string(),
            category: ServiceCategory::Plumbing,
            urgency: UrgencyLevel::Urgent,
            budget_min: BigDecimal::from(500),
            budget_max: BigDecimal::from(1500),
            location_address: None,
            status: Some(RequestStatus::Active),
            assigned_bid_id: None,
            expires_at: now - Duration::minutes(1),
            created_at: Some(now - Duration::hours(3)),
            updated_at: None,
        };

        assert!(request.is_expired(now));
        assert!(!request.is_biddable(now));

        let mut fresh = request.clone();
        fresh.expires_at = now + Duration::hours(1);
        assert!(fresh.is_biddable(now));

        fresh.status = Some(RequestStatus::BiddingClosed);
        assert!(!fresh.is_biddable(now));
    }
}
