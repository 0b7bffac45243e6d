//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (session database)
//!
//! # Catalog
//! GET  /products               - Product listing (?sort=&sizes=&brands=&materials=)
//! GET  /products/{id}          - Product detail
//! GET  /categories/{handle}    - Category listing with filters and facets
//!
//! # Cart
//! GET  /cart                   - Cart contents
//! POST /cart/add               - Add item (form: product_id, quantity?, color?, size?)
//! POST /cart/update            - Set quantity (form: product_id, color?, size?, quantity)
//! POST /cart/remove            - Remove line (form: product_id, color?, size?, all_variants?)
//! POST /cart/clear             - Empty cart
//! GET  /cart/count             - Cart count badge
//!
//! # Tax and checkout
//! GET  /tax                    - Cached tax rate
//! POST /checkout               - Checkout summary; empties the cart
//! ```

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod tax;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    routing::{get, post},
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::middleware::rate_limit::RateLimiterLayer;
use crate::state::AppState;

/// Optional rate limiters for mutating routes.
#[derive(Clone, Default)]
pub struct RateLimits {
    pub cart: Option<RateLimiterLayer>,
    pub checkout: Option<RateLimiterLayer>,
}

/// Per-visitor responses must not be cached by intermediaries.
fn no_store() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::index))
        .route("/products/{id}", get(catalog::show))
        .route("/categories/{handle}", get(catalog::category))
}

/// Create the cart routes router.
pub fn cart_routes(limiter: Option<RateLimiterLayer>) -> Router<AppState> {
    let mut mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear));
    if let Some(limiter) = limiter {
        mutations = mutations.layer(limiter);
    }

    Router::new()
        .route("/", get(cart::show))
        .route("/count", get(cart::count))
        .merge(mutations)
        .layer(no_store())
}

/// Create all routes for the storefront.
pub fn routes(limits: RateLimits) -> Router<AppState> {
    let mut checkout = Router::new().route("/checkout", post(checkout::checkout));
    if let Some(limiter) = limits.checkout {
        checkout = checkout.layer(limiter);
    }
    let checkout = checkout.layer(no_store());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(catalog_routes())
        .nest("/cart", cart_routes(limits.cart))
        .route("/tax", get(tax::show))
        .merge(checkout)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies session database connectivity when sessions are stored in
/// `PostgreSQL`. Returns 503 Service Unavailable if it is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = state.pool() else {
        return StatusCode::OK;
    };
    match sqlx::query("SELECT 1").fetch_one(pool).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
