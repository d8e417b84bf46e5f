//! Redis-backed counter store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, Script};
use tracing::{debug, info, warn};

use super::CounterStore;
use crate::error::{QuotaGateError, StoreError};

/// Decrement only while the key still exists, so an expired counter is not
/// brought back without a TTL.
const DECREMENT_EXISTING: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return redis.call('DECR', KEYS[1])
end
return 0
"#;

/// A counter store backed by a shared Redis server.
///
/// Reads use `GET`. Increments run `INCRBY` and `EXPIRE` inside one
/// `MULTI`/`EXEC` transaction so a counter never outlives its window.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: MultiplexedConnection,
    timeout: Duration,
    decrement_script: Arc<Script>,
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisCounterStore {
    /// Connect to Redis at `url`. Every round trip, including this one, is
    /// bounded by `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, QuotaGateError> {
        let client = redis::Client::open(url)
            .map_err(|e| QuotaGateError::Config(format!("Invalid Redis URL: {}", e)))?;

        let connection = with_timeout(timeout, client.get_multiplexed_async_connection())
            .await?
            .map_err(|e| classify(e, false))?;

        info!(timeout_ms = timeout.as_millis() as u64, "Connected to Redis counter store");
        Ok(Self {
            connection,
            timeout,
            decrement_script: Arc::new(Script::new(DECREMENT_EXISTING)),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = with_timeout(self.timeout, conn.get(key))
            .await?
            .map_err(|e| classify(e, false))?;

        match raw {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| StoreError::InvalidValue {
                    key: key.to_string(),
                    value,
                }),
        }
    }

    async fn increment_and_expire(
        &self,
        key: &str,
        by: u64,
        expire_in: Duration,
    ) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .incr(key, by)
            .expire(key, expire_in.as_secs() as i64)
            .ignore();

        let (value,): (u64,) = with_timeout(self.timeout, pipe.query_async(&mut conn))
            .await?
            .map_err(|e| classify(e, true))?;

        debug!(key = %key, value = value, expire_secs = expire_in.as_secs(), "Counter incremented");
        Ok(value)
    }

    async fn decrement(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        let invocation = self.decrement_script.key(key);
        let value: i64 = with_timeout(self.timeout, invocation.invoke_async(&mut conn))
            .await?
            .map_err(|e| classify(e, true))?;

        Ok(value.max(0) as u64)
    }
}

async fn with_timeout<F: Future>(timeout: Duration, fut: F) -> Result<F::Output, StoreError> {
    tokio::time::timeout(timeout, fut).await.map_err(|_| {
        warn!(timeout_ms = timeout.as_millis() as u64, "Counter store round trip timed out");
        StoreError::Unavailable(format!("timed out after {}ms", timeout.as_millis()))
    })
}

/// Map a Redis error onto the store taxonomy. Connection-level failures are
/// always `Unavailable`; anything else inside a transaction means the write
/// did not happen.
fn classify(err: RedisError, in_transaction: bool) -> StoreError {
    let connection_level = err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout();

    if connection_level || !in_transaction {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::TransactionFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ErrorKind;

    #[test]
    fn test_classify_io_error_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = RedisError::from(io);
        assert!(matches!(classify(err, true), StoreError::Unavailable(_)));
    }

    #[test]
    fn test_classify_exec_abort_is_transaction_failure() {
        let err = RedisError::from((ErrorKind::ExecAbortError, "EXECABORT"));
        assert!(matches!(classify(err, true), StoreError::TransactionFailed(_)));
    }

    #[test]
    fn test_classify_read_error_is_unavailable() {
        let err = RedisError::from((ErrorKind::ResponseError, "WRONGTYPE"));
        assert!(matches!(classify(err, false), StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let result = RedisCounterStore::connect("not a url", Duration::from_millis(100)).await;
        assert!(matches!(result, Err(QuotaGateError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        // Port 1 is reserved and nothing listens there.
        let result = RedisCounterStore::connect("redis://127.0.0.1:1/", Duration::from_millis(500)).await;
        assert!(matches!(
            result,
            Err(QuotaGateError::Store(StoreError::Unavailable(_)))
        ));
    }
}
