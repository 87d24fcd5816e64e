//! Prize draw API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use prize_common::config::AppConfig;
use prize_common::db::{create_pool, run_migrations};
use prize_common::store::{MemoryPrizeStore, PgPrizeStore, PrizeStore};
use prize_notifier::providers::build_dispatcher;
use prize_notifier::worker::{DeliveryWorker, RetryDriver};

use prize_api::routes::create_router;
use prize_api::state::AppState;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Starting prize API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Pick the storage backend
    let store: Arc<dyn PrizeStore> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = create_pool(url, config.db_max_connections).await?;
            run_migrations(&pool).await?;
            Arc::new(PgPrizeStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, prizes are kept in memory only");
            Arc::new(MemoryPrizeStore::new())
        }
    };

    let dispatcher = build_dispatcher(&config)?;
    let port = config.port;
    let retry_interval = config.retry_interval_secs.map(Duration::from_secs);

    let (state, jobs) = AppState::new(config, store, dispatcher);

    // Background delivery
    tokio::spawn(DeliveryWorker::new(jobs, state.tracker.clone()).run());
    if let Some(interval) = retry_interval {
        tokio::spawn(RetryDriver::new(state.tracker.clone(), interval).run());
    }

    // Build router
    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run with graceful shutdown on Ctrl+C
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Prize API server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal, stopping gracefully...");
}

/// `LOG_FORMAT=json` switches to structured JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("prize_api=debug,prize_engine=debug,prize_notifier=debug,tower_http=debug")
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
