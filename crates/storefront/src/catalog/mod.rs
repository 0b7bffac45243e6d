//! Product catalog client.
//!
//! # Architecture
//!
//! - Products are owned by a remote document store; the storefront only reads
//! - Remote responses are cached in memory via `moka` (5 minute TTL)
//! - Local development and tests can serve a fixed product list from a JSON file
//!
//! # Remote API
//!
//! - `GET {base}/products` - all products (JSON array)
//! - `GET {base}/products/{id}` - one product, 404 when absent
//!
//! Remote responses pass the same [`validate_products`] checks as catalog
//! files before they are cached.

mod cache;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lattice_core::{CategoryHandle, Product, ProductId};
use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogConfig;

use cache::{CacheKey, CacheValue};

/// Timeout for a single catalog request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when reading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Catalog returned a non-success status.
    #[error("catalog returned {status}: {message}")]
    Status { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Reading a local catalog file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog URL is unusable.
    #[error("invalid catalog URL: {0}")]
    InvalidUrl(String),

    /// Catalog data violates an invariant.
    #[error("invalid catalog data: {0}")]
    Invalid(String),

    /// Product not found.
    #[error("Not found: {0}")]
    NotFound(ProductId),
}

enum CatalogSource {
    Remote {
        client: reqwest::Client,
        base_url: Url,
        api_token: Option<SecretString>,
    },
    Static(Arc<[Product]>),
}

/// Read-only client for the product catalog.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    source: CatalogSource,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogClient {
    /// Create a client for the configured source.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid, the HTTP client fails to build,
    /// or the catalog file cannot be read or fails validation.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        match config {
            CatalogConfig::Remote { url, api_token } => Self::remote(url, api_token.clone()),
            CatalogConfig::File { path } => Self::from_file(path),
        }
    }

    /// Create a client for a remote document store.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client fails to build.
    pub fn remote(url: &str, api_token: Option<SecretString>) -> Result<Self, CatalogError> {
        let base_url = Url::parse(url).map_err(|e| CatalogError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(CatalogError::InvalidUrl(url.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self::with_source(CatalogSource::Remote {
            client,
            base_url,
            api_token,
        }))
    }

    /// Create a client serving a fixed product list.
    #[must_use]
    pub fn from_products(products: Vec<Product>) -> Self {
        Self::with_source(CatalogSource::Static(products.into()))
    }

    /// Create a client serving the products in a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let products = load_products_file(path)?;
        tracing::info!(path = %path.display(), count = products.len(), "catalog loaded");
        Ok(Self::from_products(products))
    }

    fn with_source(source: CatalogSource) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(CatalogClientInner { source, cache }),
        }
    }

    /// All products in catalog order.
    ///
    /// # Errors
    ///
    /// Returns error if the remote catalog cannot be read.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Arc<[Product]>, CatalogError> {
        let (client, base_url, api_token) = match &self.inner.source {
            CatalogSource::Static(products) => return Ok(Arc::clone(products)),
            CatalogSource::Remote {
                client,
                base_url,
                api_token,
            } => (client, base_url, api_token),
        };

        if let Some(CacheValue::Products(products)) =
            self.inner.cache.get(&CacheKey::AllProducts).await
        {
            debug!("catalog cache hit");
            return Ok(products);
        }

        let url = endpoint(base_url, &["products"])?;
        let response = authorized(client.get(url), api_token.as_ref()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }

        let products: Vec<Product> = serde_json::from_str(&response.text().await?)?;
        validate_products(&products)?;
        let products: Arc<[Product]> = products.into();
        self.inner
            .cache
            .insert(CacheKey::AllProducts, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// One product by ID.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if no product has this ID, or an
    /// error if the remote catalog cannot be read.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        let (client, base_url, api_token) = match &self.inner.source {
            CatalogSource::Static(products) => {
                return products
                    .iter()
                    .find(|p| &p.id == id)
                    .cloned()
                    .ok_or_else(|| CatalogError::NotFound(id.clone()));
            }
            CatalogSource::Remote {
                client,
                base_url,
                api_token,
            } => (client, base_url, api_token),
        };

        let key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("product cache hit");
            return Ok(*product);
        }

        let url = endpoint(base_url, &["products", id.as_str()])?;
        let response = authorized(client.get(url), api_token.as_ref()).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(id.clone()));
        }
        if !status.is_success() {
            return Err(status_error(status, response).await);
        }

        let product: Product = serde_json::from_str(&response.text().await?)?;
        validate_products(std::slice::from_ref(&product))?;
        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Products belonging to a category, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns error if the remote catalog cannot be read.
    pub async fn products_in_category(
        &self,
        handle: &CategoryHandle,
    ) -> Result<Vec<Product>, CatalogError> {
        Ok(self
            .list_products()
            .await?
            .iter()
            .filter(|p| &p.category == handle)
            .cloned()
            .collect())
    }
}

/// Read and validate a JSON array of products.
///
/// # Errors
///
/// Returns error if the file cannot be read, parsed, or fails validation.
pub fn load_products_file(path: &Path) -> Result<Vec<Product>, CatalogError> {
    let raw = std::fs::read_to_string(path)?;
    let products: Vec<Product> = serde_json::from_str(&raw)?;
    validate_products(&products)?;
    Ok(products)
}

/// Check catalog invariants: unique IDs, non-negative prices, discounts
/// within 0..=100.
///
/// # Errors
///
/// Returns `CatalogError::Invalid` naming the first offending product.
pub fn validate_products(products: &[Product]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for product in products {
        if !seen.insert(&product.id) {
            return Err(CatalogError::Invalid(format!(
                "duplicate product id {}",
                product.id
            )));
        }
        if product.price.is_sign_negative() && !product.price.is_zero() {
            return Err(CatalogError::Invalid(format!(
                "product {} has a negative price",
                product.id
            )));
        }
        if product.discount < rust_decimal::Decimal::ZERO
            || product.discount > rust_decimal::Decimal::ONE_HUNDRED
        {
            return Err(CatalogError::Invalid(format!(
                "product {} has discount {} outside 0..=100",
                product.id, product.discount
            )));
        }
    }
    Ok(())
}

fn endpoint(base_url: &Url, segments: &[&str]) -> Result<Url, CatalogError> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| CatalogError::InvalidUrl(base_url.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn authorized(
    request: reqwest::RequestBuilder,
    api_token: Option<&SecretString>,
) -> reqwest::RequestBuilder {
    match api_token {
        Some(token) => request.bearer_auth(token.expose_secret()),
        None => request,
    }
}

async fn status_error(status: reqwest::StatusCode, response: reqwest::Response) -> CatalogError {
    let message = response.text().await.unwrap_or_default();
    tracing::error!(
        status = %status,
        body = %message.chars().take(500).collect::<String>(),
        "catalog returned non-success status"
    );
    CatalogError::Status {
        status: status.as_u16(),
        message: message.chars().take(200).collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::Router;
    use axum::extract::Path as AxumPath;
    use axum::http::StatusCode;
    use axum::routing::get;
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: &str, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            category: CategoryHandle::new(category),
            brand: None,
            material: None,
            price: Decimal::new(25, 0),
            discount: Decimal::ZERO,
            sizes: vec!["M".into()],
            colors: Vec::new(),
            image: String::new(),
        }
    }

    #[tokio::test]
    async fn test_static_catalog_lookup() {
        let catalog = CatalogClient::from_products(vec![product("a", "tops"), product("b", "pants")]);

        assert_eq!(catalog.list_products().await.unwrap().len(), 2);
        assert_eq!(
            catalog.get_product(&ProductId::new("b")).await.unwrap().name,
            "Product b"
        );
        assert!(matches!(
            catalog.get_product(&ProductId::new("zzz")).await,
            Err(CatalogError::NotFound(_))
        ));

        let tops = catalog
            .products_in_category(&CategoryHandle::new("tops"))
            .await
            .unwrap();
        assert_eq!(tops.len(), 1);
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_discounts() {
        let dup = vec![product("a", "tops"), product("a", "tops")];
        assert!(matches!(validate_products(&dup), Err(CatalogError::Invalid(_))));

        let mut bad = product("b", "tops");
        bad.discount = Decimal::new(150, 0);
        assert!(validate_products(&[bad]).is_err());

        let mut negative = product("c", "tops");
        negative.price = Decimal::new(-1, 0);
        assert!(validate_products(&[negative]).is_err());

        assert!(validate_products(&[product("d", "tops")]).is_ok());
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let base = Url::parse("https://docs.example.com/v1/").unwrap();
        assert_eq!(
            endpoint(&base, &["products", "a b"]).unwrap().as_str(),
            "https://docs.example.com/v1/products/a%20b"
        );
    }

    #[tokio::test]
    async fn test_remote_catalog_is_cached() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let app = Router::new()
            .route(
                "/products",
                get(move || {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        axum::Json(vec![product("a", "tops")])
                    }
                }),
            )
            .route(
                "/products/{id}",
                get(|AxumPath(id): AxumPath<String>| async move {
                    if id == "a" {
                        Ok(axum::Json(product("a", "tops")))
                    } else {
                        Err(StatusCode::NOT_FOUND)
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let catalog = CatalogClient::remote(&format!("http://{addr}"), None).unwrap();
        assert_eq!(catalog.list_products().await.unwrap().len(), 1);
        assert_eq!(catalog.list_products().await.unwrap().len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(
            catalog.get_product(&ProductId::new("a")).await.unwrap().id,
            ProductId::new("a")
        );
        assert!(matches!(
            catalog.get_product(&ProductId::new("missing")).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_catalog_rejects_negative_prices() {
        let mut negative = product("neg", "tops");
        negative.price = Decimal::new(-5, 0);
        let listed = negative.clone();
        let app = Router::new()
            .route(
                "/products",
                get(move || {
                    let listed = listed.clone();
                    async move { axum::Json(vec![listed]) }
                }),
            )
            .route(
                "/products/{id}",
                get(move || {
                    let negative = negative.clone();
                    async move { axum::Json(negative) }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let catalog = CatalogClient::remote(&format!("http://{addr}"), None).unwrap();
        assert!(matches!(
            catalog.list_products().await,
            Err(CatalogError::Invalid(_))
        ));
        assert!(matches!(
            catalog.get_product(&ProductId::new("neg")).await,
            Err(CatalogError::Invalid(_))
        ));
    }
}
