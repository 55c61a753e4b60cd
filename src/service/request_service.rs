// service/request_service.rs
use std::sync::Arc;

use chrono::Utc;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::{
    db::{
        cache::{CacheHelper, REQUEST_CACHE_TTL},
        db::DBClient,
        biddb::{BidExt, BidWithProvider},
        requestdb::{RequestExt, RequestWithStats},
    },
    dtos::requestdtos::CreateRequestDto,
    models::{
        bidmodel::Bid,
        requestmodel::{LiveRequest, ServiceCategory},
    },
    service::{error::ServiceError, fanout_service::FanoutService},
};

const DEFAULT_TITLE: &str = "Urgent Service Request";

#[derive(Clone)]
pub struct RequestService {
    db_client: Arc<DBClient>,
    fanout: FanoutService,
}

impl RequestService {
    pub fn new(db_client: Arc<DBClient>, fanout: FanoutService) -> Self {
        Self { db_client, fanout }
    }

    /// Creates the request and kicks off provider fanout in the background.
    /// The request is committed either way; a fanout failure only costs
    /// notifications, never the request itself.
    pub async fn create_request(
        &self,
        requester_id: Uuid,
        dto: CreateRequestDto,
    ) -> Result<LiveRequest, ServiceError> {
        let budget_min = BigDecimal::try_from(dto.budget_min)
            .map_err(|_| ServiceError::Validation("budget_min is not a valid amount".to_string()))?;
        let budget_max = BigDecimal::try_from(dto.budget_max)
            .map_err(|_| ServiceError::Validation("budget_max is not a valid amount".to_string()))?;

        if budget_min > budget_max {
            return Err(ServiceError::Validation(
                "budget_min cannot exceed budget_max".to_string(),
            ));
        }

        let title = match dto.title.as_deref() {
            Some(title) if !title.trim().is_empty() => title.trim().to_string(),
            _ => DEFAULT_TITLE.to_string(),
        };

        let urgency = dto.urgency.unwrap_or_default();
        let expires_at = Utc::now() + urgency.default_expiry_window();

        let request = self
            .db_client
            .create_request(
                requester_id,
                &title,
                dto.description.trim(),
                dto.category,
                urgency,
                budget_min,
                budget_max,
                dto.location_address,
                expires_at,
            )
            .await?;

        tracing::info!(
            "Request {} created by {} ({} / {}), open until {}",
            request.id,
            requester_id,
            request.category.to_str(),
            request.urgency.to_str(),
            request.expires_at
        );

        self.invalidate_browse_cache().await;

        // Fanout runs off the request path; its own log line reports the outcome
        let fanout = self.fanout.clone();
        let created = request.clone();
        tokio::spawn(async move {
            fanout.fanout_new_request(&created).await;
        });

        Ok(request)
    }

    pub async fn get_request(&self, request_id: Uuid) -> Result<LiveRequest, ServiceError> {
        self.db_client
            .get_request(request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))
    }

    /// Request plus its bids. The owner sees every bid; anyone else only
    /// sees their own.
    pub async fn get_request_detail(
        &self,
        request_id: Uuid,
        viewer_id: Uuid,
    ) -> Result<(LiveRequest, Vec<BidWithProvider>), ServiceError> {
        let request = self.get_request(request_id).await?;

        let mut bids = self.db_client.get_bids_for_request(request_id).await?;
        if request.requester_id != viewer_id {
            bids.retain(|bid| bid.provider_id == viewer_id);
        }

        Ok((request, bids))
    }

    pub async fn browse_open_requests(
        &self,
        category: Option<ServiceCategory>,
        page: u32,
        limit: usize,
    ) -> Result<Vec<RequestWithStats>, ServiceError> {
        let offset = (page - 1) as i64 * limit as i64;

        let cache_key = format!(
            "open_requests:{}:{}:{}",
            category.map(|c| c.to_str().to_owned()).unwrap_or_else(|| "all".to_string()),
            page,
            limit
        );

        if let Some(redis) = &self.db_client.redis_client {
            if let Ok(Some(cached)) =
                CacheHelper::get::<Vec<RequestWithStats>>(redis, &cache_key).await
            {
                return Ok(cached);
            }
        }

        let requests = self
            .db_client
            .get_open_requests(category, limit as i64, offset)
            .await?;

        if let Some(redis) = &self.db_client.redis_client {
            let _ = CacheHelper::set(redis, &cache_key, &requests, REQUEST_CACHE_TTL).await;
        }

        Ok(requests)
    }

    pub async fn my_requests(
        &self,
        requester_id: Uuid,
        page: u32,
        limit: usize,
    ) -> Result<Vec<RequestWithStats>, ServiceError> {
        let offset = (page - 1) as i64 * limit as i64;
        Ok(self
            .db_client
            .get_requester_requests(requester_id, limit as i64, offset)
            .await?)
    }

    /// Owner-only. Rejects every pending bid in the same transaction and
    /// notifies the losing providers afterwards.
    pub async fn cancel_request(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
    ) -> Result<(LiveRequest, Vec<Bid>), ServiceError> {
        let current = self.get_request(request_id).await?;
        if current.requester_id != caller_id {
            return Err(ServiceError::NotAuthorized(caller_id, request_id));
        }

        let Some((request, rejected)) = self.db_client.cancel_request(request_id).await? else {
            return Err(self.transition_conflict(request_id, "cancelled").await?);
        };

        tracing::info!(
            "Request {} cancelled, {} pending bids rejected",
            request.id,
            rejected.len()
        );

        self.invalidate_browse_cache().await;

        if !rejected.is_empty() {
            self.fanout.notify_bids_rejected(&request, &rejected).await;
        }

        Ok((request, rejected))
    }

    /// Owner-only transition active -> bidding_closed. Existing bids stay
    /// pending; the owner can still accept one of them.
    pub async fn close_bidding(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
    ) -> Result<LiveRequest, ServiceError> {
        let current = self.get_request(request_id).await?;
        if current.requester_id != caller_id {
            return Err(ServiceError::NotAuthorized(caller_id, request_id));
        }

        let Some(request) = self.db_client.close_bidding(request_id).await? else {
            return Err(self.transition_conflict(request_id, "closed for bidding").await?);
        };

        self.invalidate_browse_cache().await;
        Ok(request)
    }

    /// Owner-only transition assigned -> completed.
    pub async fn complete_request(
        &self,
        request_id: Uuid,
        caller_id: Uuid,
    ) -> Result<LiveRequest, ServiceError> {
        let current = self.get_request(request_id).await?;
        if current.requester_id != caller_id {
            return Err(ServiceError::NotAuthorized(caller_id, request_id));
        }

        let Some(request) = self.db_client.complete_request(request_id).await? else {
            return Err(self.transition_conflict(request_id, "completed").await?);
        };

        self.invalidate_browse_cache().await;
        Ok(request)
    }

    /// The conditional update matched nothing; read the row again so the
    /// error names the state that actually won.
    async fn transition_conflict(
        &self,
        request_id: Uuid,
        wanted: &str,
    ) -> Result<ServiceError, ServiceError> {
        let current = self
            .db_client
            .get_request(request_id)
            .await?
            .ok_or(ServiceError::RequestNotFound(request_id))?;

        let status = current
            .status
            .map(|s| s.to_str().to_owned())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ServiceError::InvalidTransition(format!(
            "request {} is {} and cannot be {}",
            request_id, status, wanted
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
