//! Counter store abstraction and implementations.
//!
//! The gate never owns counter state. Every value lives in a [`CounterStore`],
//! which is responsible for serializing updates and expiring entries.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use self::memory::InMemoryCounterStore;
pub use self::redis::RedisCounterStore;

/// Trait for counter store implementations.
///
/// This trait abstracts over the Redis-backed store and the in-memory store
/// so the gate can work with either.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the current counter for `key`. An absent or expired key is `None`.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Add `by` to the counter and set its expiry to `expire_in` from now,
    /// as one atomic unit. Returns the new value.
    async fn increment_and_expire(
        &self,
        key: &str,
        by: u64,
        expire_in: Duration,
    ) -> Result<u64, StoreError>;

    /// Subtract one from an existing counter, keeping its expiry.
    ///
    /// An absent key stays absent and yields 0.
    async fn decrement(&self, key: &str) -> Result<u64, StoreError>;
}
