//! Poll Cache
//!
//! Time-to-live cache with lazy reconnect for pull modules that front an
//! unreliable resource (a mail server, a web API, a sysfs file that comes and
//! goes with hotplug).
//!
//! # Refresh policy
//!
//! - Fresh (`now - last_checked < ttl`): return the cached value, no I/O.
//! - Stale: make one refresh attempt. Connect if there is no live
//!   connection, then fetch through it.
//! - Connect failure: connection stays empty.
//! - Fetch failure: the connection is dropped so the next attempt starts
//!   from scratch.
//! - Any failure leaves the cached value *and* `last_checked` untouched, so
//!   the very next call retries instead of waiting out a full TTL.
//! - Success replaces the value and stamps `last_checked`.
//!
//! [`PollCache::get_value`] never fails; it degrades to the last good value
//! (or `Default` if there never was one). [`PollCache::try_get_value`] has the
//! same state transitions but reports the refresh error.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A resource a [`PollCache`] refreshes from
#[async_trait]
pub trait PollSource: Send {
    /// Live handle (socket, session, open file)
    type Connection: Send;
    /// Cached value
    type Value: Clone + Default + Send;

    /// Name used in logs
    fn name(&self) -> &str;

    /// Open a new connection (connect, authenticate, open)
    async fn connect(&mut self) -> anyhow::Result<Self::Connection>;

    /// Read the current value through a live connection
    async fn fetch(&mut self, connection: &mut Self::Connection) -> anyhow::Result<Self::Value>;
}

/// A refresh attempt failed
#[derive(Debug, Error)]
pub enum CacheError {
    /// Could not establish a connection
    #[error("connect failed: {0:#}")]
    Connect(#[source] anyhow::Error),
    /// The connection was live but reading through it failed
    #[error("fetch failed: {0:#}")]
    Fetch(#[source] anyhow::Error),
}

/// Counters describing cache behaviour
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Calls answered from the cache without I/O
    pub hits: u64,
    /// Refresh attempts
    pub refreshes: u64,
    /// Connection attempts
    pub connects: u64,
    /// Failed refresh attempts (connect or fetch)
    pub failures: u64,
}

/// TTL cache in front of a [`PollSource`]
pub struct PollCache<S: PollSource> {
    source: S,
    ttl: Duration,
    last_checked: Option<Instant>,
    cached: S::Value,
    connection: Option<S::Connection>,
    stats: CacheStats,
}

impl<S: PollSource> PollCache<S> {
    /// Create a cache that refreshes on first use
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            last_checked: None,
            cached: S::Value::default(),
            connection: None,
            stats: CacheStats::default(),
        }
    }

    /// The cached value, without refreshing
    #[must_use]
    pub fn cached(&self) -> &S::Value {
        &self.cached
    }

    /// Whether a live connection is held
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Whether the cached value is still within its TTL
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.last_checked
            .is_some_and(|checked| checked.elapsed() < self.ttl)
    }

    /// Force the next call to refresh, keeping the cached value and connection
    pub fn invalidate(&mut self) {
        self.last_checked = None;
    }

    /// Current value, refreshing if stale; never fails
    ///
    /// On a failed refresh the previous value is returned.
    pub async fn get_value(&mut self) -> S::Value {
        match self.try_get_value().await {
            Ok(value) => value,
            Err(e) => {
                warn!(source = %self.source.name(), error = %e, "Refresh failed, serving cached value");
                self.cached.clone()
            }
        }
    }

    /// Current value, refreshing if stale
    ///
    /// # Errors
    ///
    /// Returns the refresh error. Cache state is updated exactly as for
    /// [`Self::get_value`].
    pub async fn try_get_value(&mut self) -> Result<S::Value, CacheError> {
        if self.is_fresh() {
            self.stats.hits += 1;
            return Ok(self.cached.clone());
        }

        self.refresh().await?;
        Ok(self.cached.clone())
    }

    async fn refresh(&mut self) -> Result<(), CacheError> {
        self.stats.refreshes += 1;

        let mut connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                self.stats.connects += 1;
                debug!(source = %self.source.name(), "Connecting");
                self.source.connect().await.map_err(|e| {
                    self.stats.failures += 1;
                    CacheError::Connect(e)
                })?
            }
        };

        match self.source.fetch(&mut connection).await {
            Ok(value) => {
                self.cached = value;
                self.last_checked = Some(Instant::now());
                self.connection = Some(connection);
                Ok(())
            }
            Err(e) => {
                // connection is dropped here; next refresh reconnects
                self.stats.failures += 1;
                Err(CacheError::Fetch(e))
            }
        }
    }
}

impl<S: PollSource> std::fmt::Debug for PollCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollCache")
            .field("source", &self.source.name())
            .field("ttl", &self.ttl)
            .field("last_checked", &self.last_checked)
            .field("connected", &self.connection.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    /// Scriptable source; connections are numbered from 1
    #[derive(Clone, Default)]
    struct Script {
        value: Arc<AtomicU32>,
        fail_connect: Arc<AtomicBool>,
        fail_fetch: Arc<AtomicBool>,
        next_connection: Arc<AtomicU32>,
        last_used_connection: Arc<AtomicU32>,
    }

    #[async_trait]
    impl PollSource for Script {
        type Connection = u32;
        type Value = u32;

        fn name(&self) -> &str {
            "script"
        }

        async fn connect(&mut self) -> anyhow::Result<u32> {
            if self.fail_connect.load(Ordering::SeqCst) {
                anyhow::bail!("connection refused");
            }
            Ok(self.next_connection.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn fetch(&mut self, connection: &mut u32) -> anyhow::Result<u32> {
            self.last_used_connection.store(*connection, Ordering::SeqCst);
            if self.fail_fetch.load(Ordering::SeqCst) {
                anyhow::bail!("broken pipe");
            }
            Ok(self.value.load(Ordering::SeqCst))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_calls_do_not_refresh() {
        let script = Script::default();
        script.value.store(7, Ordering::SeqCst);
        let mut cache = PollCache::new(script.clone(), TTL);

        assert_eq!(cache.get_value().await, 7);
        assert_eq!(cache.stats().refreshes, 1);

        // Underlying value changes, but the cache is still fresh
        script.value.store(8, Ordering::SeqCst);
        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(10)).await;
            assert_eq!(cache.get_value().await, 7);
        }
        assert_eq!(cache.stats().refreshes, 1);
        assert_eq!(cache.stats().hits, 5);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(cache.get_value().await, 8);
        assert_eq!(cache.stats().refreshes, 2);
        assert_eq!(cache.stats().connects, 1, "connection is reused");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_prior_value_returns_default() {
        let script = Script::default();
        script.fail_connect.store(true, Ordering::SeqCst);
        script.value.store(5, Ordering::SeqCst);
        let mut cache = PollCache::new(script.clone(), TTL);

        assert_eq!(cache.get_value().await, 0);
        assert!(!cache.is_connected());
        assert!(!cache.is_fresh());

        // last_checked was not stamped, so the next call retries immediately
        assert_eq!(cache.get_value().await, 0);
        assert_eq!(cache.stats().refreshes, 2);
        assert_eq!(cache.stats().failures, 2);

        script.fail_connect.store(false, Ordering::SeqCst);
        assert_eq!(cache.get_value().await, 5);
        assert!(cache.is_fresh());
        assert_eq!(cache.get_value().await, 5);
        assert_eq!(cache.stats().refreshes, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_failure_keeps_value_and_forces_reconnect() {
        let script = Script::default();
        script.value.store(1, Ordering::SeqCst);
        let mut cache = PollCache::new(script.clone(), TTL);

        assert_eq!(cache.get_value().await, 1);
        assert_eq!(script.last_used_connection.load(Ordering::SeqCst), 1);

        tokio::time::advance(TTL).await;
        script.fail_fetch.store(true, Ordering::SeqCst);
        script.value.store(2, Ordering::SeqCst);
        assert_eq!(cache.get_value().await, 1, "stale but valid value served");
        assert!(!cache.is_connected(), "failed handle is invalidated");

        tokio::time::advance(TTL).await;
        script.fail_fetch.store(false, Ordering::SeqCst);
        assert_eq!(cache.get_value().await, 2);
        assert_eq!(cache.stats().connects, 2);
        assert_eq!(
            script.last_used_connection.load(Ordering::SeqCst),
            2,
            "fetch went through a fresh connection"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_get_value_reports_errors() {
        let script = Script::default();
        script.fail_connect.store(true, Ordering::SeqCst);
        let mut cache = PollCache::new(script.clone(), TTL);

        let err = cache.try_get_value().await.unwrap_err();
        assert!(matches!(err, CacheError::Connect(_)));
        assert_eq!(err.to_string(), "connect failed: connection refused");

        script.fail_connect.store(false, Ordering::SeqCst);
        script.fail_fetch.store(true, Ordering::SeqCst);
        let err = cache.try_get_value().await.unwrap_err();
        assert!(matches!(err, CacheError::Fetch(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refresh_on_same_connection() {
        let script = Script::default();
        script.value.store(3, Ordering::SeqCst);
        let mut cache = PollCache::new(script.clone(), TTL);

        assert_eq!(cache.get_value().await, 3);
        script.value.store(4, Ordering::SeqCst);
        cache.invalidate();
        assert_eq!(*cache.cached(), 3);
        assert_eq!(cache.get_value().await, 4);
        assert_eq!(cache.stats().connects, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_refreshes_every_call() {
        let script = Script::default();
        let mut cache = PollCache::new(script, Duration::ZERO);
        cache.get_value().await;
        cache.get_value().await;
        assert_eq!(cache.stats().refreshes, 2);
        assert_eq!(cache.stats().hits, 0);
    }
}
