//! Attempt store selection
//!
//! The backend is resolved once at startup into a closed enum. Invalid
//! selections fail here, never on first use.

use std::sync::Arc;

use platform::clock::Clock;
use sqlx::PgPool;

use crate::application::config::{StoreBackend, StoreSettings};
use crate::domain::repository::AttemptStore;
use crate::domain::scope::Scope;
use crate::error::{GuardError, GuardResult};
use crate::infra::memory::MemoryAttemptStore;
use crate::infra::postgres::PgAttemptStore;

/// Concrete attempt store chosen at startup
#[derive(Clone)]
pub enum AttemptStoreBackend {
    Memory(MemoryAttemptStore),
    Postgres(PgAttemptStore),
}

impl AttemptStoreBackend {
    pub fn kind(&self) -> StoreBackend {
        match self {
            AttemptStoreBackend::Memory(_) => StoreBackend::Memory,
            AttemptStoreBackend::Postgres(_) => StoreBackend::Postgres,
        }
    }
}

/// Build the configured store
///
/// # Errors
/// `Configuration` when postgres is selected without a pool, or when the
/// memory store is selected in production without the explicit override.
pub fn build_attempt_store(
    settings: &StoreSettings,
    pool: Option<PgPool>,
    clock: Arc<dyn Clock>,
) -> GuardResult<AttemptStoreBackend> {
    match settings.backend {
        StoreBackend::Postgres => {
            let pool = pool.ok_or_else(|| {
                GuardError::Configuration(
                    "RATE_LIMIT_BACKEND=postgres requires a database connection".to_string(),
                )
            })?;
            let mut store = PgAttemptStore::with_clock(pool, clock);
            if let Some(timeout) = settings.operation_timeout {
                store = store.with_timeout(timeout);
            }
            tracing::info!(backend = "postgres", "Rate limit store initialized");
            Ok(AttemptStoreBackend::Postgres(store))
        }
        StoreBackend::Memory => {
            if settings.environment.is_production() {
                if !settings.allow_memory_in_production {
                    return Err(GuardError::Configuration(
                        "in-memory rate limiting is not allowed in production; \
                         use RATE_LIMIT_BACKEND=postgres or set ALLOW_MEMORY_RATE_LIMIT=true"
                            .to_string(),
                    ));
                }
                tracing::warn!(
                    "In-memory rate limiting enabled in production; limits are per process"
                );
            }
            tracing::info!(backend = "memory", "Rate limit store initialized");
            Ok(AttemptStoreBackend::Memory(MemoryAttemptStore::new(clock)))
        }
    }
}

impl AttemptStore for AttemptStoreBackend {
    async fn increment_counter(
        &self,
        scope: Scope,
        key: &str,
        window_secs: u32,
    ) -> GuardResult<u32> {
        match self {
            Self::Memory(s) => s.increment_counter(scope, key, window_secs).await,
            Self::Postgres(s) => s.increment_counter(scope, key, window_secs).await,
        }
    }

    async fn get_counter(&self, scope: Scope, key: &str, window_secs: u32) -> GuardResult<u32> {
        match self {
            Self::Memory(s) => s.get_counter(scope, key, window_secs).await,
            Self::Postgres(s) => s.get_counter(scope, key, window_secs).await,
        }
    }

    async fn set_lock(&self, scope: Scope, key: &str, until_epoch_ms: i64) -> GuardResult<()> {
        match self {
            Self::Memory(s) => s.set_lock(scope, key, until_epoch_ms).await,
            Self::Postgres(s) => s.set_lock(scope, key, until_epoch_ms).await,
        }
    }

    async fn get_lock(&self, scope: Scope, key: &str) -> GuardResult<Option<i64>> {
        match self {
            Self::Memory(s) => s.get_lock(scope, key).await,
            Self::Postgres(s) => s.get_lock(scope, key).await,
        }
    }

    async fn reset(&self, scope: Scope, key: &str) -> GuardResult<()> {
        match self {
            Self::Memory(s) => s.reset(scope, key).await,
            Self::Postgres(s) => s.reset(scope, key).await,
        }
    }

    async fn cleanup_expired(&self) -> GuardResult<u64> {
        match self {
            Self::Memory(s) => s.cleanup_expired().await,
            Self::Postgres(s) => s.cleanup_expired().await,
        }
    }
}
