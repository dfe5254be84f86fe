//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use auth_guard::domain::repository::AttemptStore;
use auth_guard::infra::HttpAuthenticator;
use auth_guard::presentation::GuardAppState;
use auth_guard::{
    AttemptStoreBackend, GuardSettings, StoreBackend, build_attempt_store, guard_router,
};
use axum::{
    Router, http,
    http::{Method, header},
};
use platform::clock::{Clock, SystemClock};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Re-export unified error types for use in handlers
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:31113";
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;
const AUTH_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "api=info,auth_guard=info,platform=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Every setting is validated here; nothing is deferred to the first request
    let settings = GuardSettings::from_env()?;
    tracing::info!(
        backend = ?settings.store.backend,
        environment = ?settings.store.environment,
        trust = ?settings.trust,
        "Guard settings loaded"
    );

    let pool = match settings.store.backend {
        StoreBackend::Postgres => Some(connect_database().await?),
        StoreBackend::Memory => None,
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = build_attempt_store(&settings.store, pool, clock.clone())?;

    // Startup cleanup: remove expired rate-limit state
    // Errors here should not prevent server startup
    match store.cleanup_expired().await {
        Ok(removed) => {
            tracing::info!(rows_deleted = removed, "Rate limit cleanup completed");
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Rate limit cleanup failed, continuing anyway"
            );
        }
    }
    spawn_cleanup(store.clone(), cleanup_interval()?);

    // Authentication provider
    let provider_url =
        env::var("AUTH_PROVIDER_URL").context("AUTH_PROVIDER_URL must be set in environment")?;
    let authenticator = HttpAuthenticator::new(provider_url, AUTH_PROVIDER_TIMEOUT)?;
    tracing::info!(provider = authenticator.base_url(), "Authentication provider configured");

    let state = GuardAppState::new(
        Arc::new(store),
        Arc::new(authenticator),
        Arc::new(settings.policy.clone()),
        Arc::new(settings.trust.clone()),
        Arc::new(settings.identifier_hasher()),
        clock,
    );

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([Method::POST, Method::OPTIONS]))
        .allow_headers(AllowHeaders::list([header::CONTENT_TYPE, header::ACCEPT]))
        .expose_headers([header::RETRY_AFTER])
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .nest("/api/auth", guard_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()
        .context("BIND_ADDR must be a socket address")?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn connect_database() -> anyhow::Result<PgPool> {
    let database_url = env::var("DATABASE_URL")
        .context("DATABASE_URL must be set when RATE_LIMIT_BACKEND=postgres")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    Ok(pool)
}

fn cleanup_interval() -> anyhow::Result<Duration> {
    let secs = match env::var("RATE_LIMIT_CLEANUP_INTERVAL_SECS") {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .context("RATE_LIMIT_CLEANUP_INTERVAL_SECS must be a number")?,
        Err(_) => DEFAULT_CLEANUP_INTERVAL_SECS,
    };
    Ok(Duration::from_secs(secs.max(1)))
}

/// Periodically purge expired windows and locks
fn spawn_cleanup(store: AttemptStoreBackend, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately; startup already cleaned up
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.cleanup_expired().await {
                Ok(removed) => {
                    tracing::debug!(rows_deleted = removed, "Periodic rate limit cleanup");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Periodic rate limit cleanup failed");
                }
            }
        }
    });
}
