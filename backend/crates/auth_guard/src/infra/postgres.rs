//! PostgreSQL attempt store
//!
//! One row per `(scope, key, window_secs)` in `auth_rate_limits`. Locks use
//! the reserved `window_secs = 0` row of a key, with the lock expiry stored
//! in `expires_at_ms`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use platform::clock::{Clock, SystemClock};
use sqlx::PgPool;

use crate::domain::repository::{AttemptStore, LOCK_WINDOW_SECS, ensure_counter_window};
use crate::domain::scope::Scope;
use crate::error::{GuardError, GuardResult};

/// PostgreSQL-backed attempt store
#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
    op_timeout: Option<Duration>,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            clock,
            op_timeout: None,
        }
    }

    /// Bound every store operation; an elapsed timeout is a backend failure
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    async fn bounded<T>(&self, op: impl Future<Output = GuardResult<T>>) -> GuardResult<T> {
        match self.op_timeout {
            Some(limit) => tokio::time::timeout(limit, op).await.map_err(|_| {
                GuardError::BackendUnavailable(format!(
                    "rate limit store timed out after {}ms",
                    limit.as_millis()
                ))
            })?,
            None => op.await,
        }
    }
}

fn to_count(raw: i32) -> GuardResult<u32> {
    u32::try_from(raw).map_err(|_| {
        GuardError::BackendUnavailable(format!("rate limit store returned invalid count {raw}"))
    })
}

fn to_window(window_secs: u32) -> GuardResult<i32> {
    i32::try_from(window_secs).map_err(|_| {
        GuardError::Configuration(format!("window of {window_secs}s is too large"))
    })
}

impl AttemptStore for PgAttemptStore {
    async fn increment_counter(
        &self,
        scope: Scope,
        key: &str,
        window_secs: u32,
    ) -> GuardResult<u32> {
        ensure_counter_window(window_secs)?;
        let window = to_window(window_secs)?;
        let now_ms = self.clock.now_ms();
        let expires_at_ms = now_ms.saturating_add(i64::from(window_secs) * 1000);

        // Single upsert: concurrent increments serialize on the row lock
        let row = self
            .bounded(async {
                sqlx::query_as::<_, (i32,)>(
                    r#"
                    INSERT INTO auth_rate_limits (scope, key, window_secs, count, expires_at_ms)
                    VALUES ($1, $2, $3, 1, $5)
                    ON CONFLICT (scope, key, window_secs)
                    DO UPDATE SET
                        count = CASE
                            WHEN auth_rate_limits.expires_at_ms <= $4 THEN 1
                            ELSE auth_rate_limits.count + 1
                        END,
                        expires_at_ms = EXCLUDED.expires_at_ms
                    RETURNING count
                    "#,
                )
                .bind(scope.as_str())
                .bind(key)
                .bind(window)
                .bind(now_ms)
                .bind(expires_at_ms)
                .fetch_optional(&self.pool)
                .await
                .map_err(GuardError::from)
            })
            .await?;

        let (count,) = row.ok_or_else(|| {
            GuardError::BackendUnavailable("counter upsert returned no row".to_string())
        })?;
        to_count(count)
    }

    async fn get_counter(&self, scope: Scope, key: &str, window_secs: u32) -> GuardResult<u32> {
        ensure_counter_window(window_secs)?;
        let window = to_window(window_secs)?;
        let now_ms = self.clock.now_ms();

        let row = self
            .bounded(async {
                sqlx::query_as::<_, (i32,)>(
                    r#"
                    SELECT count FROM auth_rate_limits
                    WHERE scope = $1 AND key = $2 AND window_secs = $3 AND expires_at_ms > $4
                    "#,
                )
                .bind(scope.as_str())
                .bind(key)
                .bind(window)
                .bind(now_ms)
                .fetch_optional(&self.pool)
                .await
                .map_err(GuardError::from)
            })
            .await?;

        // Not found is a legitimate zero
        row.map_or(Ok(0), |(count,)| to_count(count))
    }

    async fn set_lock(&self, scope: Scope, key: &str, until_epoch_ms: i64) -> GuardResult<()> {
        self.bounded(async {
            sqlx::query(
                r#"
                INSERT INTO auth_rate_limits (scope, key, window_secs, count, expires_at_ms)
                VALUES ($1, $2, $3, 0, $4)
                ON CONFLICT (scope, key, window_secs)
                DO UPDATE SET expires_at_ms = EXCLUDED.expires_at_ms
                "#,
            )
            .bind(scope.as_str())
            .bind(key)
            .bind(LOCK_WINDOW_SECS as i32)
            .bind(until_epoch_ms)
            .execute(&self.pool)
            .await
            .map_err(GuardError::from)
        })
        .await?;
        Ok(())
    }

    async fn get_lock(&self, scope: Scope, key: &str) -> GuardResult<Option<i64>> {
        let now_ms = self.clock.now_ms();

        let row = self
            .bounded(async {
                sqlx::query_as::<_, (i64,)>(
                    r#"
                    SELECT expires_at_ms FROM auth_rate_limits
                    WHERE scope = $1 AND key = $2 AND window_secs = $3 AND expires_at_ms > $4
                    "#,
                )
                .bind(scope.as_str())
                .bind(key)
                .bind(LOCK_WINDOW_SECS as i32)
                .bind(now_ms)
                .fetch_optional(&self.pool)
                .await
                .map_err(GuardError::from)
            })
            .await?;

        Ok(row.map(|(until,)| until))
    }

    async fn reset(&self, scope: Scope, key: &str) -> GuardResult<()> {
        self.bounded(async {
            sqlx::query("DELETE FROM auth_rate_limits WHERE scope = $1 AND key = $2")
                .bind(scope.as_str())
                .bind(key)
                .execute(&self.pool)
                .await
                .map_err(GuardError::from)
        })
        .await?;
        Ok(())
    }

    async fn cleanup_expired(&self) -> GuardResult<u64> {
        let now_ms = self.clock.now_ms();

        let deleted = self
            .bounded(async {
                sqlx::query("DELETE FROM auth_rate_limits WHERE expires_at_ms <= $1")
                    .bind(now_ms)
                    .execute(&self.pool)
                    .await
                    .map_err(GuardError::from)
            })
            .await?
            .rows_affected();

        tracing::info!(rows_deleted = deleted, "Cleaned up expired rate-limit rows");

        Ok(deleted)
    }
}
