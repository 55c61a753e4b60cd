// db/db.rs
use redis::aio::ConnectionManager;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
    pub redis_client: Option<Arc<ConnectionManager>>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .field("redis_client", &self.redis_client.is_some())
            .finish()
    }
}

impl DBClient {
    /// Postgres only; caching and cross-instance events stay off.
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient {
            pool,
            redis_client: None,
        }
    }

    /// Postgres plus Redis. A Redis failure is not fatal, the client just
    /// comes up without it.
    pub async fn with_redis(pool: Pool<Postgres>, redis_url: &str) -> Result<Self, String> {
        match redis::Client::open(redis_url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => {
                    tracing::info!("✅ Redis connection established successfully");
                    Ok(DBClient {
                        pool,
                        redis_client: Some(Arc::new(conn)),
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Failed to connect to Redis: {}. Continuing without cache.",
                        e
                    );
                    Ok(DBClient {
                        pool,
                        redis_client: None,
                    })
                }
            },
            Err(e) => {
                tracing::warn!(
                    "⚠️ Failed to create Redis client: {}. Continuing without cache.",
                    e
                );
                Ok(DBClient {
                    pool,
                    redis_client: None,
                })
            }
        }
    }

    pub fn is_redis_available(&self) -> bool {
        self.redis_client.is_some()
    }

    pub fn cache_status(&self) -> &str {
        if self.redis_client.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    }
}
