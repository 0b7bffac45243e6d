//! Application state shared across handlers.

use std::sync::Arc;

use lattice_core::{Clock, SystemClock};
use sqlx::PgPool;

use crate::catalog::{CatalogClient, CatalogError};
use crate::config::StorefrontConfig;
use crate::services::{TaxRateSource, TaxSourceError};
use crate::storage::{KeyValueStorage, MemoryStorage};
use crate::stores::{CartStore, TaxStore};

/// Error building application state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("tax source: {0}")]
    TaxSource(#[from] TaxSourceError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the catalog, the process-wide tax store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: Option<PgPool>,
    catalog: CatalogClient,
    tax: Arc<TaxStore>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create application state from its parts.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        pool: Option<PgPool>,
        catalog: CatalogClient,
        tax: Arc<TaxStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                catalog,
                tax,
                clock,
            }),
        }
    }

    /// Build state from configuration using the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog or the tax source cannot be set up.
    pub fn from_config(config: StorefrontConfig, pool: Option<PgPool>) -> Result<Self, StateError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let catalog = CatalogClient::from_config(&config.catalog)?;
        let tax = Arc::new(tax_store_from_config(&config, Arc::clone(&clock))?);
        Ok(Self::new(config, pool, catalog, tax, clock))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the session database pool, if sessions are stored in `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    /// Get the process-wide tax store.
    #[must_use]
    pub fn tax(&self) -> &Arc<TaxStore> {
        &self.inner.tax
    }

    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        &*self.inner.clock
    }

    /// Cart store over one visitor's storage (normally their session).
    #[must_use]
    pub fn cart_store<'a, S: KeyValueStorage>(&'a self, storage: &'a S) -> CartStore<'a, S> {
        CartStore::new(storage, self.clock(), self.inner.config.cart.ttl)
    }
}

/// Build the tax store described by the configuration.
///
/// Without a remote source the fallback rate is served as a fixed rate.
///
/// # Errors
///
/// Returns an error if the HTTP client for the remote source fails to build.
pub fn tax_store_from_config(
    config: &StorefrontConfig,
    clock: Arc<dyn Clock>,
) -> Result<TaxStore, TaxSourceError> {
    let source = match &config.tax.source_url {
        Some(url) => TaxRateSource::remote(url.clone())?,
        None => TaxRateSource::Fixed(config.tax.fallback_rate),
    };
    Ok(TaxStore::new(
        MemoryStorage::new(),
        source,
        clock,
        config.tax.ttl,
        config.tax.retry,
    ))
}
