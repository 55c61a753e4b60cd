// db/biddb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::BigDecimal;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::{bidmodel::Bid, requestmodel::LiveRequest};

/// Bid row joined with the provider's display name for requester views.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BidWithProvider {
    pub id: Uuid,
    pub request_id: Uuid,
    pub provider_id: Uuid,
    pub provider_name: String,
    pub amount: BigDecimal,
    pub estimated_time: String,
    pub message: Option<String>,
    pub status: Option<crate::models::bidmodel::BidStatus>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of the acceptance transaction. Exactly one bid can ever be
/// accepted per request; losing callers get told which guard failed.
#[derive(Debug)]
pub enum AcceptOutcome {
    Accepted {
        request: LiveRequest,
        bid: Bid,
        rejected: Vec<Bid>,
    },
    /// The request was not in active or bidding_closed anymore.
    RequestNotAssignable,
    /// The bid had already been withdrawn, rejected or accepted.
    BidNotPending,
}

#[async_trait]
pub trait BidExt {
    /// Inserts a pending bid. Returns None when the provider already has
    /// a pending bid on the request (unique index conflict).
    async fn insert_bid(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        amount: BigDecimal,
        estimated_time: &str,
        message: Option<String>,
    ) -> Result<Option<Bid>, Error>;

    async fn get_bid(&self, bid_id: Uuid) -> Result<Option<Bid>, Error>;

    async fn get_bids_for_request(&self, request_id: Uuid) -> Result<Vec<BidWithProvider>, Error>;

    async fn get_bids_by_provider(
        &self,
        provider_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bid>, Error>;

    /// Conditional update pending -> withdrawn. None when the bid was not
    /// pending anymore.
    async fn withdraw_bid(&self, bid_id: Uuid) -> Result<Option<Bid>, Error>;

    /// The acceptance transaction. Assigns the request, accepts the bid
    /// and rejects every other pending bid, or rolls the whole thing back.
    /// Both updates are guarded on current status, so two concurrent
    /// accepts cannot both win.
    async fn accept_bid(&self, request_id: Uuid, bid_id: Uuid) -> Result<AcceptOutcome, Error>;
}

#[async_trait]
impl BidExt for DBClient {
    async fn insert_bid(
        &self,
        request_id: Uuid,
        provider_id: Uuid,
        amount: BigDecimal,
        estimated_time: &str,
        message: Option<String>,
    ) -> Result<Option<Bid>, Error> {
        sqlx::query_as::<_, Bid>(
            r#"
            INSERT INTO bids (request_id, provider_id, amount, estimated_time, message)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (request_id, provider_id) WHERE status = 'pending'::bid_status
            DO NOTHING
            RETURNING id, request_id, provider_id, amount, estimated_time,
                      message, status, created_at, updated_at
            "#,
        )
        .bind(request_id)
        .bind(provider_id)
        .bind(amount)
        .bind(estimated_time)
        .bind(message)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_bid(&self, bid_id: Uuid) -> Result<Option<Bid>, Error> {
        sqlx::query_as::<_, Bid>(
            r#"
            SELECT id, request_id, provider_id, amount, estimated_time,
                   message, status, created_at, updated_at
            FROM bids
            WHERE id = $1
            "#,
        )
        .bind(bid_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_bids_for_request(&self, request_id: Uuid) -> Result<Vec<BidWithProvider>, Error> {
        sqlx::query_as::<_, BidWithProvider>(
            r#"
            SELECT b.id, b.request_id, b.provider_id, u.name AS provider_name,
                   b.amount, b.estimated_time, b.message, b.status,
                   b.created_at, b.updated_at
            FROM bids b
            JOIN users u ON u.id = b.provider_id
            WHERE b.request_id = $1
            ORDER BY b.created_at ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_bids_by_provider(
        &self,
        provider_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Bid>, Error> {
        sqlx::query_as::<_, Bid>(
            r#"
            SELECT id, request_id, provider_id, amount, estimated_time,
                   message, status, created_at, updated_at
            FROM bids
            WHERE provider_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(provider_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn withdraw_bid(&self, bid_id: Uuid) -> Result<Option<Bid>, Error> {
        sqlx::query_as::<_, Bid>(
            r#"
            UPDATE bids
            SET status = 'withdrawn'::bid_status, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'::bid_status
            RETURNING id, request_id, provider_id, amount, estimated_time,
                      message, status, created_at, updated_at
            "#,
        )
        .bind(bid_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn accept_bid(&self, request_id: Uuid, bid_id: Uuid) -> Result<AcceptOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, LiveRequest>(
            r#"
            UPDATE live_requests
            SET status = 'assigned'::request_status,
                assigned_bid_id = $2,
                updated_at = NOW()
            WHERE id = $1
              AND status IN ('active'::request_status, 'bidding_closed'::request_status)
            RETURNING id, requester_id, title, description, category, urgency,
                      budget_min, budget_max, location_address, status,
                      assigned_bid_id, expires_at, created_at, updated_at
            "#,
        )
        .bind(request_id)
        .bind(bid_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request) = request else {
            tx.rollback().await?;
            return Ok(AcceptOutcome::RequestNotAssignable);
        };

        let bid = sqlx::query_as::<_, Bid>(
            r#"
            UPDATE bids
            SET status = 'accepted'::bid_status, updated_at = NOW()
            WHERE id = $1 AND request_id = $2 AND status = 'pending'::bid_status
            RETURNING id, request_id, provider_id, amount, estimated_time,
                      message, status, created_at, updated_at
            "#,
        )
        .bind(bid_id)
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(bid) = bid else {
            // Undo the assignment, the chosen bid was gone.
            tx.rollback().await?;
            return Ok(AcceptOutcome::BidNotPending);
        };

        let rejected = sqlx::query_as::<_, Bid>(
            r#"
            UPDATE bids
            SET status = 'rejected'::bid_status, updated_at = NOW()
            WHERE request_id = $1 AND status = 'pending'::bid_status AND id <> $2
            RETURNING id, request_id, provider_id, amount, estimated_time,
                      message, status, created_at, updated_at
            "#,
        )
        .bind(request_id)
        .bind(bid_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(AcceptOutcome::Accepted {
            request,
            bid,
            rejected,
        })
    }
}
