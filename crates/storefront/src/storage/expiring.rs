//! Storage-backed cache with a time-to-live.
//!
//! A cached value lives under `value_key`; the instant it expires lives
//! under `expiry_key` as integer epoch milliseconds. Reading an entry whose
//! marker is missing or in the past removes both keys.

use std::marker::PhantomData;

use chrono::{DateTime, Duration, Utc};
use lattice_core::{Expiring, Freshness};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{KeyValueStorage, StorageError};

/// Expiring cache for one value type under one pair of keys.
#[derive(Debug, Clone, Copy)]
pub struct ExpiringCache<T> {
    value_key: &'static str,
    expiry_key: &'static str,
    ttl: Duration,
    _value: PhantomData<fn() -> T>,
}

impl<T> ExpiringCache<T>
where
    T: Serialize + DeserializeOwned,
{
    #[must_use]
    pub const fn new(value_key: &'static str, expiry_key: &'static str, ttl: Duration) -> Self {
        Self {
            value_key,
            expiry_key,
            ttl,
            _value: PhantomData,
        }
    }

    /// Read the stored expiry instant, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn expires_at<S: KeyValueStorage>(
        &self,
        storage: &S,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let marker = storage.read(self.expiry_key).await?;
        Ok(marker
            .as_ref()
            .and_then(Value::as_i64)
            .and_then(DateTime::from_timestamp_millis))
    }

    /// Load the entry if it is still valid at `now`.
    ///
    /// Expired entries, and values without an expiry marker, are invalidated
    /// and read as `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the stored value does not
    /// deserialize, or a backend error.
    pub async fn load<S: KeyValueStorage>(
        &self,
        storage: &S,
        now: DateTime<Utc>,
    ) -> Result<Option<Expiring<T>>, StorageError> {
        let Some(expires_at) = self.expires_at(storage).await? else {
            if storage.read(self.value_key).await?.is_some() {
                tracing::debug!(key = self.value_key, "dropping value without expiry marker");
                self.invalidate(storage).await?;
            }
            return Ok(None);
        };

        let Some(raw) = storage.read(self.value_key).await? else {
            // Orphaned marker
            storage.remove(self.expiry_key).await?;
            return Ok(None);
        };

        let entry = Expiring::until(raw, expires_at);
        if entry.freshness(now) == Freshness::Stale {
            tracing::debug!(key = self.value_key, %expires_at, "cached value expired");
            self.invalidate(storage).await?;
            return Ok(None);
        }

        let value = serde_json::from_value(entry.value)?;
        Ok(Some(Expiring::until(value, expires_at)))
    }

    /// Get the value if it is still valid at `now`.
    ///
    /// # Errors
    ///
    /// See [`ExpiringCache::load`].
    pub async fn get<S: KeyValueStorage>(
        &self,
        storage: &S,
        now: DateTime<Utc>,
    ) -> Result<Option<T>, StorageError> {
        Ok(self.load(storage, now).await?.map(|entry| entry.value))
    }

    /// Store `value` and restart its time-to-live from `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the storage backend fails.
    pub async fn set<S: KeyValueStorage>(
        &self,
        storage: &S,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StorageError> {
        let entry = Expiring::new(value, now, self.ttl);
        storage
            .write(self.value_key, serde_json::to_value(entry.value)?)
            .await?;
        storage
            .write(self.expiry_key, Value::from(entry.expires_at.timestamp_millis()))
            .await?;
        Ok(entry.expires_at)
    }

    /// Store `value`, keeping the current expiry instant.
    ///
    /// Starts a new window only when no marker exists, so the entry expires a
    /// fixed time after it was first written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the storage backend fails.
    pub async fn update<S: KeyValueStorage>(
        &self,
        storage: &S,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StorageError> {
        match self.expires_at(storage).await? {
            Some(expires_at) => {
                storage
                    .write(self.value_key, serde_json::to_value(value)?)
                    .await?;
                Ok(expires_at)
            }
            None => self.set(storage, value, now).await,
        }
    }

    /// Remove the value and its expiry marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend fails.
    pub async fn invalidate<S: KeyValueStorage>(&self, storage: &S) -> Result<(), StorageError> {
        storage.remove(self.value_key).await?;
        storage.remove(self.expiry_key).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    fn cache() -> ExpiringCache<String> {
        ExpiringCache::new("v", "v_expiry", Duration::milliseconds(1000))
    }

    #[tokio::test]
    async fn test_set_then_get_within_ttl() {
        let storage = MemoryStorage::new();
        let cache = cache();

        let expires_at = cache.set(&storage, &"hello".to_owned(), at(0)).await.unwrap();
        assert_eq!(expires_at, at(1000));
        assert_eq!(
            storage.read("v_expiry").await.unwrap(),
            Some(Value::from(1000))
        );
        assert_eq!(
            cache.get(&storage, at(500)).await.unwrap().as_deref(),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn test_expired_entry_is_invalidated() {
        let storage = MemoryStorage::new();
        let cache = cache();
        cache.set(&storage, &"hello".to_owned(), at(0)).await.unwrap();

        assert_eq!(cache.get(&storage, at(1500)).await.unwrap(), None);
        assert!(!storage.contains("v").unwrap());
        assert!(!storage.contains("v_expiry").unwrap());
    }

    #[tokio::test]
    async fn test_update_keeps_window() {
        let storage = MemoryStorage::new();
        let cache = cache();
        cache.update(&storage, &"one".to_owned(), at(0)).await.unwrap();
        let expires_at = cache.update(&storage, &"two".to_owned(), at(900)).await.unwrap();

        assert_eq!(expires_at, at(1000));
        assert_eq!(cache.get(&storage, at(950)).await.unwrap().as_deref(), Some("two"));
        assert_eq!(cache.get(&storage, at(1001)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_restarts_window() {
        let storage = MemoryStorage::new();
        let cache = cache();
        cache.set(&storage, &"one".to_owned(), at(0)).await.unwrap();
        cache.set(&storage, &"two".to_owned(), at(900)).await.unwrap();

        assert_eq!(cache.expires_at(&storage).await.unwrap(), Some(at(1900)));
    }

    #[tokio::test]
    async fn test_value_without_marker_is_dropped() {
        let storage = MemoryStorage::new();
        storage.write("v", Value::from("orphan")).await.unwrap();

        assert_eq!(cache().get(&storage, at(0)).await.unwrap(), None);
        assert!(!storage.contains("v").unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_removes_both_keys() {
        let storage = MemoryStorage::new();
        let cache = cache();
        cache.set(&storage, &"x".to_owned(), at(0)).await.unwrap();
        cache.invalidate(&storage).await.unwrap();

        assert_eq!(cache.expires_at(&storage).await.unwrap(), None);
        assert!(!storage.contains("v").unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_value_is_an_error() {
        let storage = MemoryStorage::new();
        let cache: ExpiringCache<u32> = ExpiringCache::new("v", "v_expiry", Duration::seconds(1));
        storage.write("v", Value::from("not a number")).await.unwrap();
        storage.write("v_expiry", Value::from(1000)).await.unwrap();

        assert!(matches!(
            cache.get(&storage, at(0)).await,
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_expiry_is_checked_before_decoding() {
        let storage = MemoryStorage::new();
        let cache: ExpiringCache<u32> = ExpiringCache::new("v", "v_expiry", Duration::seconds(1));
        storage.write("v", Value::from(7)).await.unwrap();
        storage.write("v_expiry", Value::from(1000)).await.unwrap();
        assert_eq!(cache.get(&storage, at(1000)).await.unwrap(), Some(7));

        storage.write("v", Value::from("not a number")).await.unwrap();
        assert_eq!(cache.get(&storage, at(1001)).await.unwrap(), None);
        assert!(!storage.contains("v").unwrap());
        assert!(!storage.contains("v_expiry").unwrap());
    }
}
