mod models;
mod service;
mod config;
mod dtos;
mod error;
mod db;
mod utils;
mod middleware;
mod handler;
mod routes;

use std::sync::Arc;

use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::Config;
use crate::db::db::DBClient;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

// Import the services
use service::{
    bid_service::BidService,
    chat_service::ChatService,
    fanout_service::FanoutService,
    realtime::RealtimeBus,
    request_service::RequestService,
    unread_service::UnreadService,
};

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    pub bus: Arc<RealtimeBus>,
    // Services
    pub request_service: Arc<RequestService>,
    pub bid_service: Arc<BidService>,
    pub chat_service: Arc<ChatService>,
    pub unread_service: Arc<UnreadService>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        let db_client_arc = Arc::new(db_client);

        // The relay loop needs its own client for pub/sub; publishes go
        // through the shared connection manager.
        let relay_client = match &config.redis_url {
            Some(url) => match redis::Client::open(url.as_str()) {
                Ok(client) => Some(client),
                Err(e) => {
                    println!("⚠️  Redis client init failed: {} - Cross-instance relay disabled", e);
                    None
                }
            },
            None => None,
        };

        let bus = Arc::new(RealtimeBus::new(
            relay_client,
            db_client_arc.redis_client.clone(),
        ));

        let fanout = FanoutService::new(db_client_arc.clone(), bus.clone());

        let request_service = Arc::new(RequestService::new(db_client_arc.clone(), fanout.clone()));
        let bid_service = Arc::new(BidService::new(db_client_arc.clone(), fanout.clone()));
        let chat_service = Arc::new(ChatService::new(
            db_client_arc.clone(),
            bus.clone(),
            fanout,
        ));
        let unread_service = Arc::new(UnreadService::new(db_client_arc.clone(), bus.clone()));

        Self {
            env: config,
            db_client: db_client_arc,
            bus,
            request_service,
            bid_service,
            chat_service,
            unread_service,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    // Connect to PostgreSQL
    let pool = match PgPoolOptions::new()
            .max_connections(20)
            .min_connections(5)
            .connect(&config.database_url)
            .await
    {
        Ok(pool) => {
            println!("✅ Connection to the database is successful!");

            // Log connection pool stats for monitoring
            println!("📊 Connection Pool Stats:");
            println!("   - Max connections: 20");
            println!("   - Min connections: 5");

            // Store max connections for monitoring
            let max_connections = 20;

            // Start a background task to monitor pool health
            let pool_for_monitoring = pool.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
                loop {
                    interval.tick().await;
                    let size = pool_for_monitoring.size();
                    let idle = pool_for_monitoring.num_idle();
                    tracing::debug!("🔍 Pool Status - Active: {}, Idle: {}, Total: {}",
                        size - idle as u32, idle, size);

                    // Warning if pool is getting full
                    if size >= max_connections * 8 / 10 {
                        tracing::warn!("⚠️  Connection pool at 80% capacity! Consider increasing max_connections");
                    }
                }
            });

            pool
        }
        Err(err) => {
            println!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    // Initialize DBClient with optional Redis
    let db_client = if let Some(ref redis_url) = config.redis_url {
        match DBClient::with_redis(pool.clone(), redis_url).await {
            Ok(client) => {
                if client.is_redis_available() {
                    println!("✅ Redis caching is ACTIVE - Performance boosted! 🚀");
                } else {
                    println!("⚠️  Redis connection failed - Running without cache");
                }
                client
            }
            Err(e) => {
                println!("⚠️  Redis initialization error: {} - Running without cache", e);
                DBClient::new(pool)
            }
        }
    } else {
        println!("ℹ️  Redis not configured - Running without cache (set REDIS_URL to enable)");
        DBClient::new(pool)
    };

    let allowed_origins = vec![
        "https://hazir.app".parse::<HeaderValue>().unwrap(),
        "https://hazir.up.railway.app".parse::<HeaderValue>().unwrap(),
        "http://localhost:5173".parse::<HeaderValue>().unwrap(),
        "http://localhost:8000".parse::<HeaderValue>().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH]);

    let app_state = Arc::new(AppState::new(db_client, config.clone()));

    let app = create_router(app_state.clone()).layer(cors);

    println!(
        "🚀 Server is running on http://localhost:{}",
        config.port
    );
    println!("📊 Cache status: {}", app_state.db_client.cache_status());

    // Relay cross-instance events into the local bus
    let bus = app_state.bus.clone();
    tokio::spawn(async move {
        // Shutdown when the process receives CTRL+C
        bus.run_forever(async { let _ = tokio::signal::ctrl_c().await; }).await;
    });

    // Project unread counters from the bus
    let unread_service = app_state.unread_service.clone();
    tokio::spawn(async move {
        unread_service.run_forever(async { let _ = tokio::signal::ctrl_c().await; }).await;
    });

    // Periodic drift check against the database
    let app_state_clone = app_state.clone();
    tokio::spawn(async move {
        service::background_jobs::start_unread_reconciliation_job(app_state_clone).await;
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port))
        .await
        .unwrap();

    axum::serve(listener, app).await.unwrap();
}
