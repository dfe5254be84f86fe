//! Repository traits - the guard's outbound seams

use super::credentials::{Credentials, ProviderOutcome};
use super::scope::Scope;
use crate::error::{GuardError, GuardResult};

/// Window length reserved for lock rows in persistent stores
pub const LOCK_WINDOW_SECS: u32 = 0;

/// Attempt store: fixed-window counters and identifier locks
///
/// Counters are keyed by `(scope, key, window_secs)`; locks by `(scope, key)`.
/// All timestamps are epoch milliseconds taken from the store's clock.
///
/// Every failure (unreachable backend, timeout, unexpected result shape)
/// must surface as [`GuardError::BackendUnavailable`]. Implementations never
/// report "no data" in place of an error.
#[trait_variant::make(AttemptStore: Send)]
pub trait LocalAttemptStore {
    /// Atomically bump a counter and return the post-increment count
    ///
    /// A missing or expired window restarts at 1; every increment moves the
    /// window expiry to `now + window_secs`.
    async fn increment_counter(&self, scope: Scope, key: &str, window_secs: u32)
    -> GuardResult<u32>;

    /// Current count of a live window, 0 when missing or expired
    async fn get_counter(&self, scope: Scope, key: &str, window_secs: u32) -> GuardResult<u32>;

    /// Install or overwrite a lock until `until_epoch_ms`
    async fn set_lock(&self, scope: Scope, key: &str, until_epoch_ms: i64) -> GuardResult<()>;

    /// Lock expiry if the lock is still active
    async fn get_lock(&self, scope: Scope, key: &str) -> GuardResult<Option<i64>>;

    /// Remove every counter window and the lock of a key
    async fn reset(&self, scope: Scope, key: &str) -> GuardResult<()>;

    /// Delete expired windows and locks; returns how many were removed
    async fn cleanup_expired(&self) -> GuardResult<u64>;
}

/// External authentication provider
#[trait_variant::make(Authenticator: Send)]
pub trait LocalAuthenticator {
    async fn sign_in(&self, credentials: &Credentials) -> GuardResult<ProviderOutcome>;

    async fn sign_up(&self, credentials: &Credentials) -> GuardResult<ProviderOutcome>;
}

/// Reject windows that would collide with lock rows
pub(crate) fn ensure_counter_window(window_secs: u32) -> GuardResult<()> {
    if window_secs == LOCK_WINDOW_SECS {
        return Err(GuardError::Configuration(
            "counter window must be at least one second".to_string(),
        ));
    }
    Ok(())
}
