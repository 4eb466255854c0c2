//! Bounded, validate-on-borrow connection pooling.
//!
//! Modeled on classic store-client pools (max total, min idle,
//! test-on-borrow): a semaphore bounds the total connection count, idle
//! connections are kept for reuse and probed for liveness before being
//! handed out, and a lease is an RAII guard so release happens on every exit
//! path, including errors and cancellation.

use relay_core::StoreError;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Pool bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum total connections. Acquisitions past this bound wait.
    pub max_size: usize,
    /// Connections opened eagerly at pool construction.
    pub min_idle: usize,
    /// How long an acquisition may wait for a free slot before failing with
    /// [`StoreError::PoolExhausted`].
    pub acquire_timeout: std::time::Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: 2,
            acquire_timeout: std::time::Duration::from_secs(5),
        }
    }
}

/// How the pool opens and probes connections.
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The pooled connection type.
    type Connection: Send + 'static;

    /// Open a fresh connection.
    fn connect(&self)
    -> impl Future<Output = Result<Self::Connection, StoreError>> + Send;

    /// Cheap liveness probe, run on borrow. A `false` discards the
    /// connection and the pool tries the next idle one (or opens fresh).
    fn validate(&self, conn: &mut Self::Connection) -> impl Future<Output = bool> + Send;
}

struct PoolInner<F: ConnectionFactory> {
    factory: F,
    config: PoolConfig,
    slots: Arc<Semaphore>,
    idle: Mutex<Vec<F::Connection>>,
    outstanding: AtomicUsize,
}

impl<F: ConnectionFactory> PoolInner<F> {
    fn idle_lock(&self) -> MutexGuard<'_, Vec<F::Connection>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A bounded connection pool.
///
/// Cloning is cheap and shares the pool; it is safe for concurrent use by
/// many tasks.
pub struct ConnectionPool<F: ConnectionFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ConnectionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ConnectionFactory> ConnectionPool<F> {
    /// Build a pool and eagerly open `min_idle` connections.
    ///
    /// # Errors
    ///
    /// Propagates the factory's [`StoreError`] if pre-warming fails: a store
    /// that cannot produce `min_idle` connections at startup is better
    /// reported immediately than at first request.
    pub async fn new(factory: F, config: PoolConfig) -> Result<Self, StoreError> {
        let inner = Arc::new(PoolInner {
            factory,
            config,
            slots: Arc::new(Semaphore::new(config.max_size)),
            idle: Mutex::new(Vec::with_capacity(config.max_size)),
            outstanding: AtomicUsize::new(0),
        });

        for _ in 0..config.min_idle.min(config.max_size) {
            let conn = inner.factory.connect().await?;
            inner.idle_lock().push(conn);
        }

        tracing::debug!(
            max_size = config.max_size,
            min_idle = config.min_idle,
            "connection pool ready"
        );

        Ok(Self { inner })
    }

    /// Borrow a connection, validated on borrow.
    ///
    /// Waits up to `acquire_timeout` for a free slot when the pool is at its
    /// bound. The returned lease returns the connection on drop, on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// [`StoreError::PoolExhausted`] if no slot frees up in time;
    /// [`StoreError::ConnectionUnavailable`] if a fresh connection cannot be
    /// opened.
    pub async fn acquire(&self) -> Result<PooledConnection<F>, StoreError> {
        let waited = self.inner.config.acquire_timeout;
        let permit = match tokio::time::timeout(
            waited,
            Arc::clone(&self.inner.slots).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(StoreError::ConnectionUnavailable("pool closed".to_string()));
            }
            Err(_) => {
                tracing::warn!(waited_ms = waited.as_millis() as u64, "connection pool exhausted");
                return Err(StoreError::PoolExhausted { waited });
            }
        };

        // Reuse an idle connection if it still answers the liveness probe.
        loop {
            let candidate = self.inner.idle_lock().pop();
            let Some(mut conn) = candidate else { break };
            if self.inner.factory.validate(&mut conn).await {
                return Ok(self.lease(conn, permit));
            }
            tracing::debug!("discarding dead pooled connection");
            drop(conn);
        }

        // No reusable idle connection; open a fresh one. If that fails the
        // permit drops here and the slot frees up again.
        let conn = self.inner.factory.connect().await?;
        Ok(self.lease(conn, permit))
    }

    /// Run one operation on a borrowed connection.
    ///
    /// The lease is released when the operation returns, on success, error
    /// and cancellation alike.
    ///
    /// # Errors
    ///
    /// Acquisition errors from [`acquire`](Self::acquire), or whatever the
    /// operation itself returns.
    pub async fn with_connection<T>(
        &self,
        op: impl AsyncFnOnce(&mut F::Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut lease = self.acquire().await?;
        op(lease.connection()).await
    }

    /// Connections currently leased out.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Connections currently idle in the pool.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.inner.idle_lock().len()
    }

    fn lease(&self, conn: F::Connection, permit: OwnedSemaphorePermit) -> PooledConnection<F> {
        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        PooledConnection {
            conn: Some(conn),
            inner: Arc::clone(&self.inner),
            _permit: permit,
        }
    }
}

/// An RAII lease on a pooled connection.
///
/// Dropping the lease returns the connection to the idle set and frees the
/// pool slot; every acquisition is matched by exactly one release.
pub struct PooledConnection<F: ConnectionFactory> {
    conn: Option<F::Connection>,
    inner: Arc<PoolInner<F>>,
    _permit: OwnedSemaphorePermit,
}

impl<F: ConnectionFactory> PooledConnection<F> {
    /// The borrowed connection.
    pub fn connection(&mut self) -> &mut F::Connection {
        match self.conn.as_mut() {
            Some(conn) => conn,
            // The Option is only emptied in Drop.
            None => unreachable!("pooled connection accessed after drop"),
        }
    }
}

impl<F: ConnectionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Returned as-is; a connection that died while leased is caught
            // by the next borrower's validate.
            self.inner.idle_lock().push(conn);
        }
        self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    struct TestFactory {
        created: Arc<AtomicUsize>,
        healthy: Arc<AtomicBool>,
        connectable: Arc<AtomicBool>,
    }

    impl TestFactory {
        fn new() -> (Self, Arc<AtomicUsize>, Arc<AtomicBool>, Arc<AtomicBool>) {
            let created = Arc::new(AtomicUsize::new(0));
            let healthy = Arc::new(AtomicBool::new(true));
            let connectable = Arc::new(AtomicBool::new(true));
            (
                Self {
                    created: Arc::clone(&created),
                    healthy: Arc::clone(&healthy),
                    connectable: Arc::clone(&connectable),
                },
                created,
                healthy,
                connectable,
            )
        }
    }

    impl ConnectionFactory for TestFactory {
        type Connection = usize;

        async fn connect(&self) -> Result<usize, StoreError> {
            if self.connectable.load(Ordering::SeqCst) {
                Ok(self.created.fetch_add(1, Ordering::SeqCst))
            } else {
                Err(StoreError::ConnectionUnavailable("refused".to_string()))
            }
        }

        async fn validate(&self, _conn: &mut usize) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    fn config(max_size: usize, min_idle: usize) -> PoolConfig {
        PoolConfig {
            max_size,
            min_idle,
            acquire_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn prewarms_min_idle_connections() {
        let (factory, created, _, _) = TestFactory::new();
        let pool = ConnectionPool::new(factory, config(4, 2)).await.unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(pool.outstanding(), 0);
    }

    #[tokio::test]
    async fn lease_returns_on_drop() {
        let (factory, _, _, _) = TestFactory::new();
        let pool = ConnectionPool::new(factory, config(2, 0)).await.unwrap();

        let lease = pool.acquire().await.unwrap();
        assert_eq!(pool.outstanding(), 1);
        drop(lease);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn no_leak_when_operation_fails() {
        let (factory, _, _, _) = TestFactory::new();
        let pool = ConnectionPool::new(factory, config(2, 0)).await.unwrap();

        let result: Result<(), StoreError> = pool
            .with_connection(async |_conn| {
                Err(StoreError::ConnectionUnavailable("boom".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(pool.outstanding(), 0, "failed operation leaked a lease");
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_pool_fails_after_acquire_timeout() {
        let (factory, _, _, _) = TestFactory::new();
        let pool = ConnectionPool::new(factory, config(1, 0)).await.unwrap();

        let _held = pool.acquire().await.unwrap();
        let result = pool.acquire().await;

        assert!(matches!(result, Err(StoreError::PoolExhausted { .. })));
        assert_eq!(pool.outstanding(), 1);
    }

    #[tokio::test]
    async fn dead_idle_connections_are_discarded_on_borrow() {
        let (factory, created, healthy, _) = TestFactory::new();
        let pool = ConnectionPool::new(factory, config(2, 1)).await.unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 1);

        healthy.store(false, Ordering::SeqCst);
        let lease = pool.acquire().await.unwrap();

        // The prewarmed connection failed validation and was replaced.
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.idle_count(), 0);
        drop(lease);
    }

    #[tokio::test]
    async fn connect_failure_frees_the_slot() {
        let (factory, _, healthy, connectable) = TestFactory::new();
        let pool = ConnectionPool::new(factory, config(1, 1)).await.unwrap();

        // Kill the idle connection and the factory together.
        healthy.store(false, Ordering::SeqCst);
        connectable.store(false, Ordering::SeqCst);
        assert!(pool.acquire().await.is_err());
        assert_eq!(pool.outstanding(), 0);

        // The slot is reusable once the store recovers.
        connectable.store(true, Ordering::SeqCst);
        let lease = pool.acquire().await.unwrap();
        assert_eq!(pool.outstanding(), 1);
        drop(lease);
    }
}
