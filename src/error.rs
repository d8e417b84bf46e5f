//! Error types for the quota gate.

use thiserror::Error;

/// Errors raised by a counter store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or did not answer in time.
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),

    /// The atomic increment-and-expire did not complete. Nothing was recorded.
    #[error("Counter store transaction failed: {0}")]
    TransactionFailed(String),

    /// The stored counter is not a non-negative integer.
    #[error("Counter store holds invalid value {value:?} for key {key}")]
    InvalidValue { key: String, value: String },
}

/// Main error type for quota gate operations.
#[derive(Error, Debug)]
pub enum QuotaGateError {
    /// Empty or malformed quota key, rejected before touching the store
    #[error("Invalid quota key: {0}")]
    InvalidKey(String),

    /// Counter store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl QuotaGateError {
    /// Stable machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            QuotaGateError::InvalidKey(_) => "invalid_key",
            QuotaGateError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            QuotaGateError::Store(StoreError::TransactionFailed(_)) => "store_transaction_failed",
            QuotaGateError::Store(StoreError::InvalidValue { .. }) => "store_invalid_value",
            QuotaGateError::Config(_) => "config",
        }
    }

    /// Whether this error came from the counter store rather than the caller.
    pub fn is_store_error(&self) -> bool {
        matches!(self, QuotaGateError::Store(_))
    }
}

impl From<::config::ConfigError> for QuotaGateError {
    fn from(err: ::config::ConfigError) -> Self {
        QuotaGateError::Config(err.to_string())
    }
}

/// Result type alias for quota gate operations.
pub type Result<T> = std::result::Result<T, QuotaGateError>;
