//! Global tax rate store.
//!
//! Holds one tax rate fetched from a [`TaxRateSource`] and cached for a
//! fixed time-to-live:
//!
//! ```text
//! UNINITIALIZED --fetch ok--> VALID (until now + TTL)
//! VALID --TTL elapsed--> EXPIRED (rate reads as 0)
//! EXPIRED --fetch ok--> VALID
//! ```
//!
//! Reads never fail silently: [`TaxStore::status`] says whether the rate is
//! valid or unavailable, and a failed refresh surfaces a [`TaxError`].

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use lattice_core::{Clock, TaxPolicy, TaxRate};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::services::{RetryPolicy, TaxRateSource, TaxSourceError, retry_with_backoff};
use crate::storage::{ExpiringCache, KeyValueStorage, MemoryStorage, StorageError, keys};

/// Default tax time-to-live in seconds (1 hour).
pub const DEFAULT_TAX_TTL_SECS: i64 = 60 * 60;

/// Errors from the tax store.
#[derive(Debug, Error)]
pub enum TaxError {
    /// Every fetch attempt failed.
    #[error("tax source unavailable after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: TaxSourceError },

    /// Reading or writing the cached rate failed.
    #[error("tax storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Whether a usable rate is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaxRateStatus {
    Valid {
        rate: TaxRate,
        expires_at: DateTime<Utc>,
    },
    Unavailable,
}

impl TaxRateStatus {
    /// The cached rate, or zero when unavailable.
    #[must_use]
    pub const fn rate_or_zero(&self) -> TaxRate {
        match self {
            Self::Valid { rate, .. } => *rate,
            Self::Unavailable => TaxRate::ZERO,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// The tax rate cache plus the means to refill it.
pub struct TaxStore<S = MemoryStorage> {
    storage: S,
    cache: ExpiringCache<TaxPolicy>,
    clock: Arc<dyn Clock>,
    source: TaxRateSource,
    retry: RetryPolicy,
    /// Serialises refreshes so concurrent expiry detections fetch once.
    refresh_lock: Mutex<()>,
}

impl<S: KeyValueStorage> TaxStore<S> {
    pub fn new(
        storage: S,
        source: TaxRateSource,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            storage,
            cache: ExpiringCache::new(keys::TAX, keys::TAX_EXPIRY, ttl),
            clock,
            source,
            retry,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Store `rate` and restart the time-to-live.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    #[instrument(skip(self))]
    pub async fn set_tax_rate(&self, rate: TaxRate) -> Result<DateTime<Utc>, StorageError> {
        let now = self.clock.now();
        let expires_at = self
            .cache
            .set(&self.storage, &TaxPolicy::new(rate), now)
            .await?;
        tracing::info!(%expires_at, "tax rate cached");
        Ok(expires_at)
    }

    /// Drop the cached rate. Reads return zero until the next fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    #[instrument(skip(self))]
    pub async fn clear_tax(&self) -> Result<(), StorageError> {
        self.cache.invalidate(&self.storage).await
    }

    /// Current state of the cache. Expired entries are removed on read.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn status(&self) -> Result<TaxRateStatus, StorageError> {
        let now = self.clock.now();
        match self.cache.load(&self.storage, now).await {
            Ok(Some(entry)) => Ok(TaxRateStatus::Valid {
                rate: entry.value.tax_rate,
                expires_at: entry.expires_at,
            }),
            Ok(None) => Ok(TaxRateStatus::Unavailable),
            Err(StorageError::Serialization(err)) => {
                tracing::warn!(error = %err, "discarding unreadable cached tax rate");
                self.cache.invalidate(&self.storage).await?;
                Ok(TaxRateStatus::Unavailable)
            }
            Err(err) => Err(err),
        }
    }

    /// The cached rate, or zero when none is valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn rate(&self) -> Result<TaxRate, StorageError> {
        Ok(self.status().await?.rate_or_zero())
    }

    /// Fetch the rate from the source (with retries) and cache it.
    ///
    /// # Errors
    ///
    /// Returns `TaxError::Exhausted` when every attempt failed; the cache is
    /// left as it was.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<TaxRate, TaxError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store().await
    }

    /// Refresh only if no valid rate is cached.
    ///
    /// Callers racing on an expired cache wait for the first refresh and
    /// then see its result instead of fetching again.
    ///
    /// # Errors
    ///
    /// Returns `TaxError::Exhausted` when a needed refresh failed.
    pub async fn ensure_fresh(&self) -> Result<TaxRateStatus, TaxError> {
        let status = self.status().await?;
        if status.is_valid() {
            return Ok(status);
        }

        let _guard = self.refresh_lock.lock().await;
        let status = self.status().await?;
        if status.is_valid() {
            return Ok(status);
        }

        self.fetch_and_store().await?;
        Ok(self.status().await?)
    }

    async fn fetch_and_store(&self) -> Result<TaxRate, TaxError> {
        let rate = retry_with_backoff(&self.retry, "fetch_tax_rate", || self.source.fetch())
            .await
            .map_err(|e| TaxError::Exhausted {
                attempts: e.attempts,
                last: e.last,
            })?;
        self.set_tax_rate(rate).await?;
        Ok(rate)
    }
}

impl<S: KeyValueStorage + 'static> TaxStore<S> {
    /// Keep the rate fresh in the background.
    ///
    /// Fetches immediately, then checks every `interval` and re-fetches once
    /// the cached rate has expired. Failures are logged and retried on the
    /// next tick.
    pub fn spawn_refresher(self: Arc<Self>, interval: StdDuration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.ensure_fresh().await {
                    Ok(TaxRateStatus::Valid { rate, expires_at }) => {
                        tracing::debug!(%rate, %expires_at, "tax rate fresh");
                    }
                    Ok(TaxRateStatus::Unavailable) => {
                        tracing::warn!("tax rate unavailable after refresh");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "tax refresh failed");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use lattice_core::ManualClock;
    use rust_decimal::Decimal;

    use super::*;

    fn rate(fraction: &str) -> TaxRate {
        TaxRate::new(fraction.parse::<Decimal>().unwrap()).unwrap()
    }

    fn fixed_store(clock: &ManualClock, ttl_ms: i64) -> TaxStore {
        TaxStore::new(
            MemoryStorage::new(),
            TaxRateSource::Fixed(rate("0.1")),
            Arc::new(clock.clone()),
            Duration::milliseconds(ttl_ms),
            RetryPolicy::no_retry(),
        )
    }

    /// Serve `{ "taxRate": 0.08 }` after `failures` 503 responses.
    async fn config_server(failures: u32) -> (SocketAddr, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new().route(
            "/tax",
            get(move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        Err(StatusCode::SERVICE_UNAVAILABLE)
                    } else {
                        Ok(axum::Json(serde_json::json!({ "taxRate": 0.08 })))
                    }
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (addr, hits)
    }

    fn remote_store(addr: SocketAddr, clock: &ManualClock, attempts: u32) -> TaxStore {
        TaxStore::new(
            MemoryStorage::new(),
            TaxRateSource::remote(format!("http://{addr}/tax")).unwrap(),
            Arc::new(clock.clone()),
            Duration::seconds(DEFAULT_TAX_TTL_SECS),
            RetryPolicy::new(attempts, StdDuration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_uninitialized_store_is_unavailable() {
        let clock = ManualClock::at_epoch();
        let store = fixed_store(&clock, 1000);
        assert_eq!(store.status().await.unwrap(), TaxRateStatus::Unavailable);
        assert_eq!(store.rate().await.unwrap(), TaxRate::ZERO);
    }

    #[tokio::test]
    async fn test_rate_expires_after_ttl() {
        let clock = ManualClock::at_epoch();
        let store = fixed_store(&clock, 1000);

        store.set_tax_rate(rate("0.2")).await.unwrap();

        clock.advance(Duration::milliseconds(500));
        assert_eq!(store.rate().await.unwrap(), rate("0.2"));

        clock.advance(Duration::milliseconds(1000));
        assert_eq!(store.status().await.unwrap(), TaxRateStatus::Unavailable);
        assert_eq!(store.rate().await.unwrap(), TaxRate::ZERO);
        assert!(!store.storage.contains(keys::TAX_EXPIRY).unwrap());
    }

    #[tokio::test]
    async fn test_clear_tax_resets_to_zero() {
        let clock = ManualClock::at_epoch();
        let store = fixed_store(&clock, 1000);
        store.set_tax_rate(rate("0.3")).await.unwrap();

        store.clear_tax().await.unwrap();
        assert_eq!(store.rate().await.unwrap(), TaxRate::ZERO);
        assert!(!store.storage.contains(keys::TAX).unwrap());
        assert!(!store.storage.contains(keys::TAX_EXPIRY).unwrap());
    }

    #[tokio::test]
    async fn test_persisted_layout() {
        let clock = ManualClock::at_epoch();
        let store = fixed_store(&clock, 1000);
        store.set_tax_rate(rate("0.2")).await.unwrap();

        assert_eq!(
            store.storage.read(keys::TAX).await.unwrap(),
            Some(serde_json::json!({ "taxRate": 0.2 }))
        );
        assert_eq!(
            store.storage.read(keys::TAX_EXPIRY).await.unwrap(),
            Some(serde_json::Value::from(1000))
        );
    }

    #[tokio::test]
    async fn test_ensure_fresh_refetches_after_expiry() {
        let clock = ManualClock::at_epoch();
        let store = fixed_store(&clock, 1000);

        let status = store.ensure_fresh().await.unwrap();
        assert_eq!(status.rate_or_zero(), rate("0.1"));

        clock.advance(Duration::milliseconds(1500));
        let status = store.ensure_fresh().await.unwrap();
        assert!(status.is_valid());
        assert_eq!(
            status,
            TaxRateStatus::Valid {
                rate: rate("0.1"),
                expires_at: DateTime::UNIX_EPOCH + Duration::milliseconds(2500),
            }
        );
    }

    #[tokio::test]
    async fn test_corrupt_cache_reads_unavailable() {
        let clock = ManualClock::at_epoch();
        let store = fixed_store(&clock, 1000);
        store
            .storage
            .write(keys::TAX, serde_json::json!({ "taxRate": "lots" }))
            .await
            .unwrap();
        store
            .storage
            .write(keys::TAX_EXPIRY, serde_json::Value::from(5000))
            .await
            .unwrap();

        assert_eq!(store.status().await.unwrap(), TaxRateStatus::Unavailable);
        assert!(!store.storage.contains(keys::TAX).unwrap());
    }

    #[tokio::test]
    async fn test_refresh_retries_remote_source() {
        let (addr, hits) = config_server(2).await;
        let clock = ManualClock::at_epoch();
        let store = remote_store(addr, &clock, 3);

        assert_eq!(store.refresh().await.unwrap(), rate("0.08"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(store.rate().await.unwrap(), rate("0.08"));
    }

    #[tokio::test]
    async fn test_refresh_exhausted_leaves_store_unavailable() {
        let (addr, hits) = config_server(10).await;
        let clock = ManualClock::at_epoch();
        let store = remote_store(addr, &clock, 2);

        let err = store.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            TaxError::Exhausted {
                attempts: 2,
                last: TaxSourceError::Status { status: 503, .. }
            }
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(store.status().await.unwrap(), TaxRateStatus::Unavailable);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_fresh_fetches_once() {
        let (addr, hits) = config_server(0).await;
        let clock = ManualClock::at_epoch();
        let store = Arc::new(remote_store(addr, &clock, 1));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.ensure_fresh().await.map(|s| s.is_valid()) })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap());
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
