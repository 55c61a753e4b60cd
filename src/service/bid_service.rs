// service/bid_service.rs
use std::sync::Arc;

use chrono::Utc;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::{
        biddb::{AcceptOutcome, BidExt},
        cache::CacheHelper,
        db::DBClient,
        requestdb::RequestExt,
    },
    dtos::biddtos::SubmitBidDto,
    models::{bidmodel::Bid, requestmodel::LiveRequest, usermodel::User},
    service::{error::ServiceError, fanout_service::FanoutService},
};

#[derive(Clone)]
pub struct BidService {
    db_client: Arc<DBClient>,
    fanout: FanoutService,
}

impl BidService {
    pub fn new(db_client: Arc<DBClient>, fanout: FanoutService) -> Self {
        Self { db_client, fanout }
    }

    /// Providers only, one pending bid per request, and only while the
    /// request is active and unexpired. Expiry is checked against the
    /// clock here, not against the stored status.
    pub async fn submit_bid(
        &self,
        provider: &User,
        request_id: Uuid,
        dto: SubmitBidDto,
    ) -> Result<Bid, ServiceError> {
        if !provider.is_provider() {
            return Err(ServiceError::NotAuthorized(provider.id, request_id));
        }

        let request = self
            .db_client
            .get_request(request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))?;

        if request.requester_id == provider.id {
            return Err(ServiceError::Validation(
                "You cannot bid on your own request".to_string(),
            ));
        }

        if !request.is_biddable(Utc::now()) {
            return Err(ServiceError::RequestNotBiddable(request_id));
        }

        let amount = BigDecimal::try_from(dto.amount)
            .map_err(|_| ServiceError::Validation("amount is not a valid amount".to_string()))?;

        let bid = self
            .db_client
            .insert_bid(
                request_id,
                provider.id,
                amount,
                dto.estimated_time.trim(),
                dto.message,
            )
            .await?
            .ok_or(ServiceError::DuplicateBid(request_id))?;

        tracing::info!(
            "Bid {} submitted on request {} by provider {}",
            bid.id,
            request_id,
            provider.id
        );

        if let Err(e) = self.fanout.notify_new_bid(&request, &bid).await {
            tracing::warn!("New-bid notification failed: {}", e.to_string());
        }

        Ok(bid)
    }

    pub async fn my_bids(
        &self,
        provider_id: Uuid,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Bid>, ServiceError> {
        let offset = (page - 1) as i64 * limit as i64;
        Ok(self
            .db_client
            .get_bids_by_provider(provider_id, limit as i64, offset)
            .await?)
    }

    /// Providers can pull a pending bid back at any time before a decision.
    pub async fn withdraw_bid(&self, bid_id: Uuid, caller_id: Uuid) -> Result<Bid, ServiceError> {
        let current = self
            .db_client
            .get_bid(bid_id)
            .await?
            .ok_or(ServiceError::BidNotFound(bid_id))?;

        if current.provider_id != caller_id {
            return Err(ServiceError::NotAuthorized(caller_id, bid_id));
        }

        let Some(bid) = self.db_client.withdraw_bid(bid_id).await? else {
            return Err(self.bid_conflict(bid_id, "withdrawn").await?);
        };

        Ok(bid)
    }

    /// Requester picks the winner. Exactly one acceptance can ever succeed
    /// per request; everyone who raced and lost gets a conflict. Notifies
    /// the winner and every rejected bidder once the transaction holds.
    pub async fn accept_bid(
        &self,
        bid_id: Uuid,
        caller_id: Uuid,
    ) -> Result<(LiveRequest, Bid, Vec<Bid>), ServiceError> {
        let bid = self
            .db_client
            .get_bid(bid_id)
            .await?
            .ok_or(ServiceError::BidNotFound(bid_id))?;

        let request = self
            .db_client
            .get_request(bid.request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(bid.request_id))?;

        if request.requester_id != caller_id {
            return Err(ServiceError::NotAuthorized(caller_id, bid_id));
        }

        match self.db_client.accept_bid(bid.request_id, bid_id).await? {
            AcceptOutcome::Accepted {
                request,
                bid,
                rejected,
            } => {
                tracing::info!(
                    "Request {} assigned to provider {} via bid {}, {} bids rejected",
                    request.id,
                    bid.provider_id,
                    bid.id,
                    rejected.len()
                );

                self.invalidate_browse_cache().await;

                if let Err(e) = self.fanout.notify_bid_accepted(&request, &bid).await {
                    tracing::warn!("Acceptance notification failed: {}", e.to_string());
                }
                if !rejected.is_empty() {
                    self.fanout.notify_bids_rejected(&request, &rejected).await;
                }

                Ok((request, bid, rejected))
            }
            AcceptOutcome::RequestNotAssignable => {
                // Re-read so the error names the state that won the race
                let status = self
                    .db_client
                    .get_request(bid.request_id)
                    .await?
                    .and_then(|current| current.status)
                    .map(|s| s.to_str().to_owned())
                    .unwrap_or_else(|| "unknown".to_string());
                Err(ServiceError::InvalidTransition(format!(
                    "request {} is {} and cannot be assigned",
                    bid.request_id, status
                )))
            }
            AcceptOutcome::BidNotPending => Err(self.bid_conflict(bid_id, "accepted").await?),
        }
    }

    async fn bid_conflict(&self, bid_id: Uuid, wanted: &str) -> Result<ServiceError, ServiceError> {
        let current = self
            .db_client
            .get_bid(bid_id)
            .await?
            .ok_or(ServiceError::BidNotFound(bid_id))?;

        let status = current
            .status
            .map(|s| s.to_str().to_owned())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ServiceError::InvalidTransition(format!(
            "bid {} is {} and cannot be {}",
            bid_id, status, wanted
        )))
    }

    async fn invalidate_browse_cache(&self) {
        if let Some(redis) = &self.db_client.redis_client {
            if let Err(e) = CacheHelper::invalidate_open_requests(redis).await {
                tracing::warn!("Failed to invalidate request caches: {}", e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::realtime::RealtimeBus;
    use sqlx::PgPool;

    // Signature smoke only; the accept protocol itself needs a live
    // database and is exercised against one.
    #[tokio::test]
    async fn bid_service_compiles() {
        let pool = PgPool::connect_lazy("postgres://localhost/hazir").unwrap();
        let db_client = Arc::new(DBClient::new(pool));
        let bus = Arc::new(RealtimeBus::new(None, None));
        let svc = BidService::new(db_client.clone(), FanoutService::new(db_client, bus));

        let _ = svc.my_bids(Uuid::nil(), 1, 20);
        let _ = svc.withdraw_bid(Uuid::nil(), Uuid::nil());
    }
}
