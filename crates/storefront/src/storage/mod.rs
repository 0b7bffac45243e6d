//! Session-scoped key-value storage.
//!
//! The cart and tax stores persist JSON values under fixed keys. In request
//! handlers the backing storage is the visitor's `tower_sessions::Session`;
//! process-wide state (the global tax rate) uses [`MemoryStorage`].
//!
//! Each store owns its keys exclusively (see [`keys`]); no two stores read
//! or write the same key.

mod expiring;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use thiserror::Error;
use tower_sessions::Session;

pub use expiring::ExpiringCache;

/// Storage keys, one pair per store.
pub mod keys {
    /// Cart contents: `{ "items": [...] }`.
    pub const CART: &str = "cart";

    /// Cart expiry marker (epoch milliseconds).
    pub const CART_EXPIRY: &str = "cart_expiry";

    /// Tax policy: `{ "taxRate": n }`.
    pub const TAX: &str = "tax";

    /// Tax expiry marker (epoch milliseconds).
    pub const TAX_EXPIRY: &str = "tax_expiry";
}

/// Errors reading or writing stored values.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The session backend failed.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// A stored value could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An in-memory lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Async key-value storage holding JSON values.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`.
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<Value>, StorageError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: Value)
    -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl KeyValueStorage for Session {
    async fn read(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(Self::get_value(self, key).await?)
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StorageError> {
        Self::insert_value(self, key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        Self::remove_value(self, key).await?;
        Ok(())
    }
}

/// In-process storage, cheaply cloneable via `Arc`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key is present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Poisoned` if the lock is poisoned.
    pub fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .inner
            .read()
            .map_err(|_| StorageError::Poisoned)?
            .contains_key(key))
    }
}

impl KeyValueStorage for MemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let map = self.inner.read().map_err(|_| StorageError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.inner
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.read("k").await.unwrap(), None);

        storage.write("k", serde_json::json!({"a": 1})).await.unwrap();
        assert!(storage.contains("k").unwrap());
        assert_eq!(
            storage.read("k").await.unwrap(),
            Some(serde_json::json!({"a": 1}))
        );

        storage.remove("k").await.unwrap();
        storage.remove("k").await.unwrap();
        assert!(!storage.contains("k").unwrap());
    }

    #[tokio::test]
    async fn test_memory_storage_clones_share_state() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.write("k", Value::from(5)).await.unwrap();
        assert_eq!(other.read("k").await.unwrap(), Some(Value::from(5)));
    }
}
