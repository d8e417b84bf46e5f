//! In-process counter store with per-entry expiry.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::trace;

use super::CounterStore;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: u64,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A counter store kept in a concurrent map.
///
/// Expiry follows the tokio clock, so tests can move time with
/// `tokio::time::advance`. Each map shard is locked for the duration of an
/// update, which makes increment-and-expire atomic per key.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<String, Entry>,
    unavailable: AtomicBool,
    fail_transactions: AtomicBool,
    increments: AtomicU64,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make increment-and-expire fail with [`StoreError::TransactionFailed`]
    /// without touching the counter.
    pub fn set_fail_transactions(&self, fail: bool) {
        self.fail_transactions.store(fail, Ordering::SeqCst);
    }

    /// Number of increment-and-expire calls that reached the store.
    pub fn increment_calls(&self) -> u64 {
        self.increments.load(Ordering::SeqCst)
    }

    /// Time left before `key` expires, or `None` if it is absent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.counters
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.counters.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        self.check_available()?;
        let now = Instant::now();
        let value = self
            .counters
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value);

        if value.is_none() {
            self.counters.remove_if(key, |_, entry| entry.is_expired(now));
        }
        Ok(value)
    }

    async fn increment_and_expire(
        &self,
        key: &str,
        by: u64,
        expire_in: Duration,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        self.increments.fetch_add(1, Ordering::SeqCst);
        if self.fail_transactions.load(Ordering::SeqCst) {
            return Err(StoreError::TransactionFailed("in-memory transaction aborted".into()));
        }

        let now = Instant::now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(Entry {
            value: 0,
            expires_at: now,
        });
        if entry.is_expired(now) {
            entry.value = 0;
        }
        entry.value += by;
        entry.expires_at = now + expire_in;

        trace!(key = %key, value = entry.value, expire_in = ?expire_in, "Incremented counter");
        Ok(entry.value)
    }

    async fn decrement(&self, key: &str) -> Result<u64, StoreError> {
        self.check_available()?;
        let now = Instant::now();
        let value = match self.counters.get_mut(key) {
            Some(mut entry) if !entry.is_expired(now) => {
                entry.value = entry.value.saturating_sub(1);
                Some(entry.value)
            }
            _ => None,
        };

        match value {
            Some(value) => Ok(value),
            None => {
                self.counters.remove_if(key, |_, entry| entry.is_expired(now));
                Ok(0)
            }
        }
    }
}
