// db/requestdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::{
    bidmodel::Bid,
    requestmodel::{LiveRequest, RequestStatus, ServiceCategory, UrgencyLevel},
};

/// Request row plus the bid counters the dashboards show next to it.
/// Serde both ways because browse pages get cached in Redis.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct RequestWithStats {
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
    pub assigned_bid_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub bid_count: i64,
    pub pending_bid_count: i64,
}

#[async_trait]
pub trait RequestExt {
    #[allow(clippy::too_many_arguments)]
    async fn create_request(
        &self,
        requester_id: Uuid,
        title: &str,
        description: &str,
        category: ServiceCategory,
        urgency: UrgencyLevel,
        budget_min: BigDecimal,
        budget_max: BigDecimal,
        location_address: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<LiveRequest, Error>;

    async fn get_request(&self, request_id: Uuid) -> Result<Option<LiveRequest>, Error>;

    /// Provider browse view: active, unexpired, optionally one category.
    /// Expired rows are filtered here at read time, regardless of what
    /// their stored status still says.
    async fn get_open_requests(
        &self,
        category: Option<ServiceCategory>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RequestWithStats>, Error>;

    async fn get_requester_requests(
        &self,
        requester_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RequestWithStats>, Error>;

    /// Conditional update active -> bidding_closed. None when the guard
    /// matched nothing (wrong state, or a concurrent transition won).
    async fn close_bidding(&self, request_id: Uuid) -> Result<Option<LiveRequest>, Error>;

    /// Conditional update assigned -> completed.
    async fn complete_request(&self, request_id: Uuid) -> Result<Option<LiveRequest>, Error>;

    /// Conditional update {active,bidding_closed} -> cancelled, and in the
    /// same transaction every still-pending bid flips to rejected. The
    /// status filter leaves withdrawn and rejected bids untouched.
    async fn cancel_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<(LiveRequest, Vec<Bid>)>, Error>;
}

#[async_trait]
impl RequestExt for DBClient {
    async fn create_request(
        &self,
        requester_id: Uuid,
        title: &str,
        description: &str,
        category: ServiceCategory,
        urgency: UrgencyLevel,
        budget_min: BigDecimal,
        budget_max: BigDecimal,
        location_address: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<LiveRequest, Error> {
        sqlx::query_as::<_, LiveRequest>(
            r#"
            INSERT INTO live_requests
                (requester_id, title, description, category, urgency,
                 budget_min, budget_max, location_address, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, requester_id, title, description, category, urgency,
                      budget_min, budget_max, location_address, status,
                      assigned_bid_id, expires_at, created_at, updated_at
            "#,
        )
        .bind(requester_id)
        .bind(title)
        .bind(description)
        .bind(category)
        .bind(urgency)
        .bind(budget_min)
        .bind(budget_max)
        .bind(location_address)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_request(&self, request_id: Uuid) -> Result<Option<LiveRequest>, Error> {
        sqlx::query_as::<_, LiveRequest>(
            r#"
            SELECT id, requester_id, title, description, category, urgency,
                   budget_min, budget_max, location_address, status,
                   assigned_bid_id, expires_at, created_at, updated_at
            FROM live_requests
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_open_requests(
        &self,
        category: Option<ServiceCategory>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RequestWithStats>, Error> {
        sqlx::query_as::<_, RequestWithStats>(
            r#"
            SELECT r.id, r.requester_id, r.title, r.description, r.category,
                   r.urgency, r.budget_min, r.budget_max, r.location_address,
                   r.status, r.assigned_bid_id, r.expires_at, r.created_at,
                   r.updated_at,
                   (SELECT COUNT(*) FROM bids b WHERE b.request_id = r.id) AS bid_count,
                   (SELECT COUNT(*) FROM bids b
                     WHERE b.request_id = r.id
                       AND b.status = 'pending'::bid_status) AS pending_bid_count
            FROM live_requests r
            WHERE r.status = 'active'::request_status
              AND r.expires_at > NOW()
              AND ($1::service_category IS NULL OR r.category = $1)
            ORDER BY r.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(category)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_requester_requests(
        &self,
        requester_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RequestWithStats>, Error> {
        sqlx::query_as::<_, RequestWithStats>(
            r#"
            SELECT r.id, r.requester_id, r.title, r.description, r.category,
                   r.urgency, r.budget_min, r.budget_max, r.location_address,
                   r.status, r.assigned_bid_id, r.expires_at, r.created_at,
                   r.updated_at,
                   (SELECT COUNT(*) FROM bids b WHERE b.request_id = r.id) AS bid_count,
                   (SELECT COUNT(*) FROM bids b
                     WHERE b.request_id = r.id
                       AND b.status = 'pending'::bid_status) AS pending_bid_count
            FROM live_requests r
            WHERE r.requester_id = $1
            ORDER BY r.created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(requester_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn close_bidding(&self, request_id: Uuid) -> Result<Option<LiveRequest>, Error> {
        sqlx::query_as::<_, LiveRequest>(
            r#"
            UPDATE live_requests
            SET status = 'bidding_closed'::request_status, updated_at = NOW()
            WHERE id = $1 AND status = 'active'::request_status
            RETURNING id, requester_id, title, description, category, urgency,
                      budget_min, budget_max, location_address, status,
                      assigned_bid_id, expires_at, created_at, updated_at
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn complete_request(&self, request_id: Uuid) -> Result<Option<LiveRequest>, Error> {
        sqlx::query_as::<_, LiveRequest>(
            r#"
            UPDATE live_requests
            SET status = 'completed'::request_status, updated_at = NOW()
            WHERE id = $1 AND status = 'assigned'::request_status
            RETURNING id, requester_id, title, description, category, urgency,
                      budget_min, budget_max, location_address, status,
                      assigned_bid_id, expires_at, created_at, updated_at
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn cancel_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<(LiveRequest, Vec<Bid>)>, Error> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, LiveRequest>(
            r#"
            UPDATE live_requests
            SET status = 'cancelled'::request_status, updated_at = NOW()
            WHERE id = $1
              AND status IN ('active'::request_status, 'bidding_closed'::request_status)
            RETURNING id, requester_id, title, description, category, urgency,
                      budget_min, budget_max, location_address, status,
                      assigned_bid_id, expires_at, created_at, updated_at
            "#,
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request) = request else {
            tx.rollback().await?;
            return Ok(None);
        };

        let rejected = sqlx::query_as::<_, Bid>(
            r#"
            UPDATE bids
            SET status = 'rejected'::bid_status, updated_at = NOW()
            WHERE request_id = $1 AND status = 'pending'::bid_status
            RETURNING id, request_id, provider_id, amount, estimated_time,
                      message, status, created_at, updated_at
            "#,
        )
        .bind(request_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some((request, rejected)))
    }
}
