// service/background_jobs.rs
use std::sync::Arc;
use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::AppState;

/// Start background job that reconciles projected unread counters against
/// the database. Expiry needs no job at all, it is derived at read time;
/// this is the only periodic sweep the service runs.
pub async fn start_unread_reconciliation_job(app_state: Arc<AppState>) {
    let mut interval = interval(Duration::from_secs(300)); // Run every 5 minutes

    loop {
        interval.tick().await;

        tracing::info!("Running unread reconciliation job at {}", Utc::now());

        match app_state.unread_service.reconcile().await {
            Ok(0) => tracing::info!("Unread reconciliation completed, no drift"),
            Ok(corrected) => tracing::info!(
                "Unread reconciliation completed: {} users corrected",
                corrected
            ),
            Err(e) => tracing::error!("Unread reconciliation failed: {}", e),
        }
    }
}
