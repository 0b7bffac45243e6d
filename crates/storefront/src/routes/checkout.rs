//! Checkout summary.
//!
//! Totals the cart with the cached tax rate, refreshing it first when it has
//! expired. The configured fallback rate applies only when the tax source
//! cannot be reached. The cart is emptied afterwards. Payment happens
//! elsewhere; the order reference ties the two together.

use axum::{Json, extract::State};
use lattice_core::{Cart, CartLineItem, CurrencyCode, Price, TaxRate};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;
use crate::stores::{TaxError, TaxRateStatus};

/// Where the applied tax rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxBasis {
    /// The tax store held a valid rate.
    Store,
    /// No rate was cached; the configured fallback applied.
    Fallback,
}

/// Checkout totals.
#[derive(Debug, Serialize)]
pub struct CheckoutSummary {
    pub order_reference: Uuid,
    pub items: Vec<CartLineItem>,
    pub count: u64,
    pub subtotal: Price,
    pub tax_rate: TaxRate,
    pub tax_basis: TaxBasis,
    pub tax: Price,
    pub total: Price,
}

impl CheckoutSummary {
    /// Total `cart` with the store's rate, or `fallback` when the store has none.
    #[must_use]
    pub fn new(cart: Cart, status: TaxRateStatus, fallback: TaxRate) -> Self {
        let (tax_rate, tax_basis) = match status {
            TaxRateStatus::Valid { rate, .. } => (rate, TaxBasis::Store),
            TaxRateStatus::Unavailable => (fallback, TaxBasis::Fallback),
        };
        let subtotal = cart.subtotal();
        let tax = tax_rate.apply(subtotal);
        let currency = CurrencyCode::default();

        Self {
            order_reference: Uuid::new_v4(),
            count: cart.count(),
            items: cart.items,
            subtotal: Price::new(subtotal, currency),
            tax_rate,
            tax_basis,
            tax: Price::new(tax, currency),
            total: Price::new(subtotal + tax, currency),
        }
    }
}

/// Summarize and close the cart.
#[instrument(skip(state, session))]
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CheckoutSummary>> {
    let store = state.cart_store(&session);
    let cart = store.load().await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("cart is empty".to_string()));
    }

    let status = match state.tax().ensure_fresh().await {
        Ok(status) => status,
        Err(TaxError::Exhausted { attempts, last }) => {
            tracing::warn!(attempts, error = %last, "tax source unreachable at checkout");
            TaxRateStatus::Unavailable
        }
        Err(err) => return Err(err.into()),
    };
    let summary = CheckoutSummary::new(cart, status, state.config().tax.fallback_rate);
    if summary.tax_basis == TaxBasis::Fallback {
        tracing::warn!(rate = %summary.tax_rate, "no cached tax rate, using fallback");
    }

    store.clear_cart().await?;

    let reference = summary.order_reference.to_string();
    add_breadcrumb(
        "checkout",
        "Checkout summarized",
        Some(&[("order_reference", reference.as_str())]),
    );
    tracing::info!(
        order_reference = %summary.order_reference,
        total = %summary.total.display(),
        "checkout complete"
    );

    Ok(Json(summary))
}
