//! Quota Gate - fixed-window rate limiting over a shared counter store
//!
//! This crate answers one question for a caller-supplied key: has this key
//! used up its quota for the current wall-clock window, and if not, record
//! one more operation. Counters live in an external store (Redis in
//! production) and expire at the next window boundary.

pub mod config;
pub mod error;
pub mod quota;
pub mod store;

pub use crate::config::{AdmissionMode, GateConfig};
pub use crate::error::{QuotaGateError, Result, StoreError};
pub use crate::quota::{Decision, QuotaGate};
pub use crate::store::{CounterStore, InMemoryCounterStore, RedisCounterStore};
