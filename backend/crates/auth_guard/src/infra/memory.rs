//! In-process attempt store
//!
//! Counters live in a mutex-guarded map owned by the store instance.
//! State is per process and lost on restart, so this backend is only
//! suitable for development and single-instance deployments.

use std::collections::HashMap;
use std::sync::Arc;

use platform::clock::{Clock, SystemClock};
use tokio::sync::Mutex;

use crate::domain::repository::{AttemptStore, ensure_counter_window};
use crate::domain::scope::Scope;
use crate::error::GuardResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    scope: Scope,
    key: String,
    window_secs: u32,
}

#[derive(Debug, Clone, Copy)]
struct CounterWindow {
    count: u32,
    expires_at_ms: i64,
}

#[derive(Debug, Default)]
struct State {
    counters: HashMap<CounterKey, CounterWindow>,
    locks: HashMap<(Scope, String), i64>,
}

/// In-process store; clones share the same state
#[derive(Clone)]
pub struct MemoryAttemptStore {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl MemoryAttemptStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
        }
    }

    /// Number of live and expired entries currently held
    pub async fn len(&self) -> usize {
        let state = self.state.lock().await;
        state.counters.len() + state.locks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryAttemptStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl AttemptStore for MemoryAttemptStore {
    async fn increment_counter(
        &self,
        scope: Scope,
        key: &str,
        window_secs: u32,
    ) -> GuardResult<u32> {
        ensure_counter_window(window_secs)?;
        let now_ms = self.clock.now_ms();
        let expires_at_ms = now_ms.saturating_add(i64::from(window_secs) * 1000);

        let mut state = self.state.lock().await;
        let window = state
            .counters
            .entry(CounterKey {
                scope,
                key: key.to_string(),
                window_secs,
            })
            .or_insert(CounterWindow {
                count: 0,
                expires_at_ms,
            });

        if window.expires_at_ms <= now_ms {
            window.count = 0;
        }
        window.count = window.count.saturating_add(1);
        window.expires_at_ms = expires_at_ms;

        Ok(window.count)
    }

    async fn get_counter(&self, scope: Scope, key: &str, window_secs: u32) -> GuardResult<u32> {
        ensure_counter_window(window_secs)?;
        let now_ms = self.clock.now_ms();
        let state = self.state.lock().await;
        let lookup = CounterKey {
            scope,
            key: key.to_string(),
            window_secs,
        };
        Ok(state
            .counters
            .get(&lookup)
            .filter(|w| w.expires_at_ms > now_ms)
            .map_or(0, |w| w.count))
    }

    async fn set_lock(&self, scope: Scope, key: &str, until_epoch_ms: i64) -> GuardResult<()> {
        let mut state = self.state.lock().await;
        state.locks.insert((scope, key.to_string()), until_epoch_ms);
        Ok(())
    }

    async fn get_lock(&self, scope: Scope, key: &str) -> GuardResult<Option<i64>> {
        let now_ms = self.clock.now_ms();
        let state = self.state.lock().await;
        Ok(state
            .locks
            .get(&(scope, key.to_string()))
            .copied()
            .filter(|until| *until > now_ms))
    }

    async fn reset(&self, scope: Scope, key: &str) -> GuardResult<()> {
        let mut state = self.state.lock().await;
        state
            .counters
            .retain(|k, _| !(k.scope == scope && k.key == key));
        state.locks.remove(&(scope, key.to_string()));
        Ok(())
    }

    async fn cleanup_expired(&self) -> GuardResult<u64> {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock().await;
        let before = state.counters.len() + state.locks.len();
        state.counters.retain(|_, w| w.expires_at_ms > now_ms);
        state.locks.retain(|_, until| *until > now_ms);
        let removed = before - (state.counters.len() + state.locks.len());

        tracing::debug!(removed, "Purged expired in-memory rate-limit entries");
        Ok(removed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::clock::ManualClock;
    use std::time::Duration;

    fn store() -> (MemoryAttemptStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        (MemoryAttemptStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_increment_counts_up() {
        let (store, _) = store();
        for expected in 1..=3 {
            let count = store.increment_counter(Scope::Ip, "1.2.3.4", 60).await.unwrap();
            assert_eq!(count, expected);
        }
        assert_eq!(store.get_counter(Scope::Ip, "1.2.3.4", 60).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_windows_are_independent() {
        let (store, _) = store();
        store.increment_counter(Scope::Ip, "k", 60).await.unwrap();
        store.increment_counter(Scope::Ip, "k", 3600).await.unwrap();
        store.increment_counter(Scope::Identifier, "k", 60).await.unwrap();

        assert_eq!(store.get_counter(Scope::Ip, "k", 60).await.unwrap(), 1);
        assert_eq!(store.get_counter(Scope::Ip, "k", 3600).await.unwrap(), 1);
        assert_eq!(store.get_counter(Scope::Identifier, "k", 60).await.unwrap(), 1);
        assert_eq!(store.get_counter(Scope::Identifier, "k", 3600).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_window_restarts() {
        let (store, clock) = store();
        store.increment_counter(Scope::Ip, "k", 60).await.unwrap();
        store.increment_counter(Scope::Ip, "k", 60).await.unwrap();

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.get_counter(Scope::Ip, "k", 60).await.unwrap(), 0);
        assert_eq!(store.increment_counter(Scope::Ip, "k", 60).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_increment_extends_expiry() {
        let (store, clock) = store();
        store.increment_counter(Scope::Ip, "k", 60).await.unwrap();
        clock.advance(Duration::from_secs(59));
        store.increment_counter(Scope::Ip, "k", 60).await.unwrap();
        clock.advance(Duration::from_secs(59));
        assert_eq!(store.get_counter(Scope::Ip, "k", 60).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lock_expires() {
        let (store, clock) = store();
        let until = clock.now_ms() + 1_000;
        store.set_lock(Scope::Identifier, "k", until).await.unwrap();
        assert_eq!(store.get_lock(Scope::Identifier, "k").await.unwrap(), Some(until));

        clock.advance(Duration::from_millis(1_000));
        assert_eq!(store.get_lock(Scope::Identifier, "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_clears_counters_and_lock() {
        let (store, clock) = store();
        store.increment_counter(Scope::Identifier, "k", 60).await.unwrap();
        store.increment_counter(Scope::Identifier, "k", 900).await.unwrap();
        store
            .set_lock(Scope::Identifier, "k", clock.now_ms() + 60_000)
            .await
            .unwrap();
        store.increment_counter(Scope::Identifier, "other", 60).await.unwrap();

        store.reset(Scope::Identifier, "k").await.unwrap();

        assert_eq!(store.get_counter(Scope::Identifier, "k", 60).await.unwrap(), 0);
        assert_eq!(store.get_counter(Scope::Identifier, "k", 900).await.unwrap(), 0);
        assert_eq!(store.get_lock(Scope::Identifier, "k").await.unwrap(), None);
        assert_eq!(store.get_counter(Scope::Identifier, "other", 60).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let (store, clock) = store();
        store.increment_counter(Scope::Ip, "short", 60).await.unwrap();
        store.increment_counter(Scope::Ip, "long", 3600).await.unwrap();
        store
            .set_lock(Scope::Identifier, "k", clock.now_ms() + 30_000)
            .await
            .unwrap();

        clock.advance(Duration::from_secs(61));
        assert_eq!(store.cleanup_expired().await.unwrap(), 2);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get_counter(Scope::Ip, "long", 3600).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lock_window_is_reserved() {
        let (store, _) = store();
        assert!(store.increment_counter(Scope::Ip, "k", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_instances_are_isolated() {
        let (a, _) = store();
        let (b, _) = store();
        a.increment_counter(Scope::Ip, "k", 60).await.unwrap();
        assert_eq!(b.get_counter(Scope::Ip, "k", 60).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let (store, _) = store();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment_counter(Scope::Ip, "k", 60).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get_counter(Scope::Ip, "k", 60).await.unwrap(), 50);
    }
}
