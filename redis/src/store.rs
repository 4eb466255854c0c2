//! The Redis-backed rendezvous store.

use crate::pool::{ConnectionFactory, ConnectionPool, PoolConfig};
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use relay_core::{CorrelationId, ResultStore, StoreError};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Opens and probes multiplexed Redis connections for the pool.
pub struct RedisConnectionFactory {
    client: redis::Client,
}

impl RedisConnectionFactory {
    /// Build a factory from a Redis URL (e.g. `redis://localhost:6379`).
    ///
    /// # Errors
    ///
    /// [`StoreError::ConnectionUnavailable`] if the URL does not parse. No
    /// connection is opened here; that happens lazily in the pool.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::ConnectionUnavailable(format!("invalid Redis URL: {e}")))?;
        Ok(Self { client })
    }
}

impl ConnectionFactory for RedisConnectionFactory {
    type Connection = MultiplexedConnection;

    async fn connect(&self) -> Result<MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::ConnectionUnavailable(e.to_string()))
    }

    async fn validate(&self, conn: &mut MultiplexedConnection) -> bool {
        redis::cmd("PING")
            .query_async::<String>(conn)
            .await
            .is_ok()
    }
}

/// [`ResultStore`] backed by Redis `GET`s over a bounded pool.
///
/// Each lookup borrows one pooled connection and issues a single `GET`,
/// bounded by `get_timeout` so one stalled store round-trip cannot eat the
/// caller's whole poll budget.
pub struct RedisResultStore {
    pool: ConnectionPool<RedisConnectionFactory>,
    get_timeout: Duration,
}

impl RedisResultStore {
    /// Connect to Redis and pre-warm the pool.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConnectionUnavailable`] if the URL is invalid or the
    /// pool cannot open its initial connections.
    pub async fn connect(
        url: &str,
        pool_config: PoolConfig,
        get_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let factory = RedisConnectionFactory::new(url)?;
        let pool = ConnectionPool::new(factory, pool_config).await?;
        tracing::info!(url = %url, get_timeout_ms = get_timeout.as_millis() as u64, "Redis result store connected");
        Ok(Self { pool, get_timeout })
    }

    /// The underlying pool, for health reporting.
    #[must_use]
    pub fn pool(&self) -> &ConnectionPool<RedisConnectionFactory> {
        &self.pool
    }
}

impl ResultStore for RedisResultStore {
    fn get(
        &self,
        key: CorrelationId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let get_timeout = self.get_timeout;
            self.pool
                .with_connection(async |conn| {
                    let lookup = conn.get::<_, Option<String>>(key.to_string());
                    match tokio::time::timeout(get_timeout, lookup).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(StoreError::ConnectionUnavailable(e.to_string())),
                        Err(_) => Err(StoreError::Timeout(get_timeout)),
                    }
                })
                .await
        })
    }
}
