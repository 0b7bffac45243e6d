//! Integration tests for the Lattice storefront.
//!
//! Each test starts the full router on `127.0.0.1:0` with in-memory sessions,
//! a fixed product catalog and a [`ManualClock`], then drives it over HTTP
//! with a cookie-keeping `reqwest` client.
//!
//! ```bash
//! cargo test -p lattice-integration-tests
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Duration;
use lattice_core::{CategoryHandle, Clock, ManualClock, Product, ProductId, TaxRate};
use lattice_storefront::config::StorefrontConfig;
use lattice_storefront::routes::RateLimits;
use lattice_storefront::services::{RetryPolicy, TaxRateSource};
use lattice_storefront::state::AppState;
use lattice_storefront::storage::MemoryStorage;
use lattice_storefront::stores::TaxStore;
use lattice_storefront::{app, catalog::CatalogClient};
use rust_decimal::Decimal;
use tower_sessions::MemoryStore;

/// Tax rate served by the test tax source.
pub const SOURCE_TAX_RATE: f64 = 0.08;

/// A running storefront plus handles to steer it.
pub struct TestContext {
    pub base_url: String,
    /// Visitor with its own cookie jar.
    pub client: reqwest::Client,
    pub clock: ManualClock,
    pub tax: Arc<TaxStore>,
}

impl TestContext {
    /// Start a storefront serving [`fixture_products`].
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be started.
    pub async fn start() -> Self {
        Self::with_products(fixture_products()).await
    }

    /// Start a storefront serving `products`.
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be started.
    pub async fn with_products(products: Vec<Product>) -> Self {
        let rate = TaxRate::try_from(SOURCE_TAX_RATE).expect("test tax rate is valid");
        Self::with_tax_source(products, TaxRateSource::Fixed(rate)).await
    }

    /// Start a storefront whose tax source always answers 503.
    ///
    /// # Panics
    ///
    /// Panics if the servers cannot be started.
    pub async fn with_failing_tax_source() -> Self {
        let source = spawn_failing_tax_source().await;
        Self::with_tax_source(fixture_products(), source).await
    }

    /// Start a storefront serving `products` with rates from `source`.
    ///
    /// # Panics
    ///
    /// Panics if the server cannot be started.
    pub async fn with_tax_source(products: Vec<Product>, source: TaxRateSource) -> Self {
        let env = |key: &str| match key {
            "STOREFRONT_BASE_URL" => Some("http://127.0.0.1".to_string()),
            "CATALOG_PATH" => Some("unused.json".to_string()),
            _ => None,
        };
        let config = StorefrontConfig::from_lookup(&env).expect("test configuration is valid");

        let clock = ManualClock::new(chrono::Utc::now());
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let tax = Arc::new(TaxStore::new(
            MemoryStorage::new(),
            source,
            Arc::clone(&shared_clock),
            config.tax.ttl,
            RetryPolicy::no_retry(),
        ));

        let state = AppState::new(
            config,
            None,
            CatalogClient::from_products(products),
            Arc::clone(&tax),
            shared_clock,
        );
        let router = app(state, MemoryStore::default(), RateLimits::default());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr: SocketAddr = listener.local_addr().expect("listener address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            client: new_client(),
            clock,
            tax,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Move the storefront's clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

/// Serve `GET /tax` with 503 and return a source pointing at it.
async fn spawn_failing_tax_source() -> TaxRateSource {
    let router = axum::Router::new().route(
        "/tax",
        axum::routing::get(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind tax source listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    TaxRateSource::remote(format!("http://{addr}/tax")).expect("tax source client")
}

/// A client with its own cookie jar, i.e. a separate visitor.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn new_client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

fn product(
    id: &str,
    category: &str,
    brand: &str,
    material: &str,
    price: i64,
    discount: i64,
    sizes: &[&str],
) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        category: CategoryHandle::new(category),
        brand: Some(brand.to_string()),
        material: Some(material.to_string()),
        price: Decimal::new(price, 0),
        discount: Decimal::new(discount, 0),
        sizes: sizes.iter().map(|s| (*s).to_string()).collect(),
        colors: vec!["Black".to_string(), "White".to_string()],
        image: format!("/images/{id}.jpg"),
    }
}

/// Catalog used by the integration tests.
///
/// | id        | category | brand  | material | price | discount | sizes   |
/// |-----------|----------|--------|----------|-------|----------|---------|
/// | tee       | tops     | Acme   | Cotton   | 20    | 0        | S, M, L |
/// | hoodie    | tops     | Zenith | Fleece   | 60    | 50       | M, L    |
/// | tank      | tops     | Acme   | Linen    | 25    | 0        | S       |
/// | jeans     | bottoms  | Zenith | Denim    | 80    | 10       | 30, 32  |
#[must_use]
pub fn fixture_products() -> Vec<Product> {
    vec![
        product("tee", "tops", "Acme", "Cotton", 20, 0, &["S", "M", "L"]),
        product("hoodie", "tops", "Zenith", "Fleece", 60, 50, &["M", "L"]),
        product("tank", "tops", "Acme", "Linen", 25, 0, &["S"]),
        product("jeans", "bottoms", "Zenith", "Denim", 80, 10, &["30", "32"]),
    ]
}
