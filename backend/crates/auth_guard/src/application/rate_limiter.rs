//! Rate Limiter
//!
//! Policy engine over an [`AttemptStore`]. Gate order on every attempt:
//!
//! 1. Identifier lock (hard lockout after consecutive failures)
//! 2. Per-IP minute window, then per-IP hour window
//! 3. Per-identifier soft limit with exponential backoff
//! 4. Consume: bump all three counters and allow
//!
//! Any store error aborts the check and propagates; it is never turned
//! into an allow.

use std::net::IpAddr;
use std::sync::Arc;

use platform::clock::Clock;

use crate::application::config::RateLimitPolicy;
use crate::domain::identifier::IdentifierKey;
use crate::domain::repository::AttemptStore;
use crate::domain::scope::Scope;
use crate::domain::verdict::{DenyReason, Verdict};
use crate::error::GuardResult;

pub struct RateLimiter<S>
where
    S: AttemptStore,
{
    store: Arc<S>,
    policy: Arc<RateLimitPolicy>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for RateLimiter<S>
where
    S: AttemptStore,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            policy: self.policy.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<S> RateLimiter<S>
where
    S: AttemptStore + Sync,
{
    pub fn new(store: Arc<S>, policy: Arc<RateLimitPolicy>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Decide whether an attempt may proceed and, if so, count it
    ///
    /// `ip` is `None` when the client address is unknown; IP windows are
    /// then skipped and only identifier limits apply.
    pub async fn check_and_consume(
        &self,
        ip: Option<IpAddr>,
        identifier: &IdentifierKey,
    ) -> GuardResult<Verdict> {
        let policy = &self.policy;
        let id_key = identifier.as_str();

        if let Some(until_ms) = self.store.get_lock(Scope::Identifier, id_key).await? {
            let retry_after_secs = retry_after_from(until_ms, self.clock.now_ms());
            tracing::warn!(
                identifier = identifier.short(),
                retry_after_secs,
                "Attempt denied: identifier locked"
            );
            return Ok(Verdict::denied(DenyReason::Lockout, retry_after_secs));
        }

        let ip_bucket = ip.map(ip_key);
        if let Some(ip_key) = ip_bucket.as_deref() {
            let windows = [
                (
                    policy.ip_minute_window_secs(),
                    policy.ip_minute_limit,
                    policy.ip_minute_retry_after,
                ),
                (
                    policy.ip_hour_window_secs(),
                    policy.ip_hour_limit,
                    policy.ip_hour_retry_after,
                ),
            ];
            for (window_secs, limit, retry_after) in windows {
                let count = self.store.get_counter(Scope::Ip, ip_key, window_secs).await?;
                if count >= limit {
                    tracing::warn!(
                        ip = %ip_key,
                        window_secs,
                        count,
                        "Attempt denied: IP rate limit"
                    );
                    return Ok(Verdict::denied(DenyReason::Ip, retry_after.as_secs()));
                }
            }
        }

        let id_window = policy.identifier_window_secs();
        let id_count = self
            .store
            .get_counter(Scope::Identifier, id_key, id_window)
            .await?;
        if id_count >= policy.identifier_soft_limit {
            let backoff = policy.backoff_secs(id_count);
            tracing::warn!(
                identifier = identifier.short(),
                count = id_count,
                retry_after_secs = backoff,
                "Attempt denied: identifier backoff"
            );
            return Ok(Verdict::denied(DenyReason::Identifier, backoff));
        }

        if let Some(ip_key) = ip_bucket.as_deref() {
            self.store
                .increment_counter(Scope::Ip, ip_key, policy.ip_minute_window_secs())
                .await?;
            self.store
                .increment_counter(Scope::Ip, ip_key, policy.ip_hour_window_secs())
                .await?;
        }
        self.store
            .increment_counter(Scope::Identifier, id_key, id_window)
            .await?;

        Ok(Verdict::Allowed)
    }

    /// Count a rejected attempt; installs a lock once the threshold is reached
    ///
    /// IP counters are left alone, they were consumed by the gate check.
    pub async fn record_failure(
        &self,
        ip: Option<IpAddr>,
        identifier: &IdentifierKey,
    ) -> GuardResult<()> {
        let count = self
            .store
            .increment_counter(
                Scope::Identifier,
                identifier.as_str(),
                self.policy.failure_window_secs(),
            )
            .await?;

        if count >= self.policy.lockout_threshold {
            let until_ms = self
                .clock
                .now_ms()
                .saturating_add(self.policy.lockout_duration_ms());
            self.store
                .set_lock(Scope::Identifier, identifier.as_str(), until_ms)
                .await?;
            tracing::warn!(
                identifier = identifier.short(),
                ip = ?ip,
                failures = count,
                locked_until_ms = until_ms,
                "Identifier locked after repeated failures"
            );
        } else {
            tracing::debug!(
                identifier = identifier.short(),
                ip = ?ip,
                failures = count,
                "Failed attempt recorded"
            );
        }
        Ok(())
    }

    /// Forget every counter and the lock of an identifier
    pub async fn record_success(&self, identifier: &IdentifierKey) -> GuardResult<()> {
        self.store
            .reset(Scope::Identifier, identifier.as_str())
            .await?;
        tracing::debug!(identifier = identifier.short(), "Identifier counters reset");
        Ok(())
    }

    /// Active lock expiry of an identifier, if any
    pub async fn lock_status(&self, identifier: &IdentifierKey) -> GuardResult<Option<i64>> {
        self.store
            .get_lock(Scope::Identifier, identifier.as_str())
            .await
    }
}

/// Store key for an address; IPv4-mapped IPv6 shares the IPv4 bucket
fn ip_key(ip: IpAddr) -> String {
    ip.to_canonical().to_string()
}

/// Whole seconds until `until_ms`, rounded up, at least 1
fn retry_after_from(until_ms: i64, now_ms: i64) -> u64 {
    let remaining_ms = until_ms.saturating_sub(now_ms).max(0);
    let secs = remaining_ms.saturating_add(999) / 1000;
    u64::try_from(secs).unwrap_or(u64::MAX).max(1)
}
