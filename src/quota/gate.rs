//! Core quota gate implementation.

use std::sync::Arc;

use chrono::NaiveTime;
use tracing::{debug, info, instrument, warn};

use super::decision::{Decision, Usage};
use super::key::QuotaKey;
use super::window::Window;
use crate::config::{AdmissionMode, QuotaConfig};
use crate::error::Result;
use crate::store::CounterStore;

/// Default operations per key per window.
pub const DEFAULT_LIMIT: u64 = 10;

/// Per-key fixed-window rate limiter over a shared counter store.
///
/// The gate holds no counter state of its own. It can be cloned freely and
/// called from any number of tasks; all serialization happens in the store.
#[derive(Clone)]
pub struct QuotaGate {
    store: Arc<dyn CounterStore>,
    limit: u64,
    window: Window,
    admission: AdmissionMode,
}

impl std::fmt::Debug for QuotaGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaGate")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("admission", &self.admission)
            .finish()
    }
}

impl QuotaGate {
    /// Create a gate with the default limit, a one-minute window and
    /// check-then-record admission.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            limit: DEFAULT_LIMIT,
            window: Window::MINUTE,
            admission: AdmissionMode::CheckThenRecord,
        }
    }

    /// Create a gate from quota configuration.
    pub fn with_config(store: Arc<dyn CounterStore>, config: &QuotaConfig) -> Self {
        Self {
            store,
            limit: config.limit.max(1),
            window: Window::from_secs(config.window_seconds),
            admission: config.admission,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn admission(&self) -> AdmissionMode {
        self.admission
    }

    /// Decide whether `key` may perform one more operation in the window
    /// containing `now`, and record it if so.
    ///
    /// `now` is a wall-clock time of day, UTC or local at the caller's
    /// choice. It sets the counter's expiry to the next window boundary and
    /// becomes the timestamp of an `Allowed` decision.
    ///
    /// Store failures are returned as errors. They are never turned into
    /// an `Allowed` or `Denied` decision.
    #[instrument(skip(self), fields(limit = self.limit))]
    pub async fn check_and_record(&self, key: &str, now: NaiveTime) -> Result<Decision> {
        let key = QuotaKey::parse(key)?;

        match self.admission {
            AdmissionMode::CheckThenRecord => self.check_then_record(key, now).await,
            AdmissionMode::RecordThenCheck => self.record_then_check(key, now).await,
        }
    }

    /// Report the counter for `key` without recording anything.
    pub async fn usage(&self, key: &str) -> Result<Usage> {
        let key = QuotaKey::parse(key)?;
        let current_count = self.store.get(key.as_str()).await?.unwrap_or(0);

        Ok(Usage {
            key: key.into_string(),
            current_count,
            limit: self.limit,
            remaining: self.limit.saturating_sub(current_count),
        })
    }

    async fn check_then_record(&self, key: QuotaKey, now: NaiveTime) -> Result<Decision> {
        // Read and increment are separate round trips. Callers racing on the
        // same key can each pass the check before any of them increments.
        let current = self.store.get(key.as_str()).await?.unwrap_or(0);

        if current >= self.limit {
            info!(key = %key, current = current, limit = self.limit, "Rate limit reached");
            return Ok(self.denied(key, current));
        }

        debug!(key = %key, current = current, limit = self.limit, "Current quota");

        let expire_in = self.window.remaining(now);
        self.store
            .increment_and_expire(key.as_str(), 1, expire_in)
            .await?;

        Ok(Decision::Allowed {
            timestamp: now.to_string(),
        })
    }

    async fn record_then_check(&self, key: QuotaKey, now: NaiveTime) -> Result<Decision> {
        let expire_in = self.window.remaining(now);
        let recorded = self
            .store
            .increment_and_expire(key.as_str(), 1, expire_in)
            .await?;

        if recorded <= self.limit {
            debug!(key = %key, current = recorded, limit = self.limit, "Current quota");
            return Ok(Decision::Allowed {
                timestamp: now.to_string(),
            });
        }

        if let Err(e) = self.store.decrement(key.as_str()).await {
            warn!(key = %key, error = %e, "Failed to compensate over-limit increment");
            return Err(e.into());
        }

        let current = recorded - 1;
        info!(key = %key, current = current, limit = self.limit, "Rate limit reached");
        Ok(self.denied(key, current))
    }

    fn denied(&self, key: QuotaKey, current_count: u64) -> Decision {
        Decision::Denied {
            key: key.into_string(),
            current_count,
            limit: self.limit,
        }
    }
}
