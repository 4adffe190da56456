mod analysis;
mod auth;
mod config;
mod db;
mod errors;
mod intake;
mod llm_client;
mod models;
mod routes;
mod screening;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::screening::shortlist::{InMemorySessionStore, RedisSessionStore, SessionStore};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Fails fast on missing required env vars
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screener API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Session shortlists live in Redis when configured
    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            let store = RedisSessionStore::connect(client, config.session_ttl_secs).await?;
            info!("Redis session store initialized");
            Arc::new(store)
        }
        None => {
            warn!("REDIS_URL not set; session shortlists are kept in memory and lost on restart");
            Arc::new(InMemorySessionStore::default())
        }
    };

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize completion client
    let retry = RetryPolicy::new(
        config.completion_max_attempts,
        config.completion_backoff.with_delay(config.completion_retry_delay),
    );
    let mut gemini = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.completion_timeout,
        retry,
    )?;
    if let Some(base_url) = &config.completion_base_url {
        gemini = gemini.with_base_url(base_url.as_str());
    }
    let completer = Arc::new(gemini);
    info!("Completion client initialized (model: {})", llm_client::MODEL);

    info!(
        "Batch policy: groups of {} with {:?} between groups, shortlist {:?}",
        config.batch_size, config.batch_delay, config.shortlist_policy
    );

    let state = AppState {
        db,
        s3,
        completer,
        sessions,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// S3 client for a custom endpoint (MinIO) when one is configured, AWS otherwise.
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "screener-static",
    );

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .credentials_provider(credentials);
    if let Some(endpoint) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let shared = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(config.s3_endpoint.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
