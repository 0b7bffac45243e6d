//! Cart route handlers.
//!
//! The cart lives in the visitor's session. Every mutation answers with the
//! full cart so clients can re-render without a second request.

use axum::{Form, Json, extract::State};
use chrono::{DateTime, Utc};
use lattice_core::{Cart, CartLineItem, LineKey, ProductId, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::state::AppState;
use crate::stores::line_item_for;

/// Cart as returned to clients.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineView>,
    pub count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One cart line with its total.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub item: CartLineItem,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

impl CartResponse {
    fn new(cart: Cart, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            count: cart.count(),
            subtotal: cart.subtotal(),
            items: cart
                .items
                .into_iter()
                .map(|item| CartLineView {
                    line_total: item.line_total(),
                    item,
                })
                .collect(),
            expires_at,
        }
    }
}

/// Cart count badge.
#[derive(Debug, Serialize)]
pub struct CartCountResponse {
    pub count: u64,
}

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: String,
    pub quantity: Option<i64>,
    pub color: Option<String>,
    pub size: Option<String>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: i64,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: String,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Remove every line for the product regardless of color and size.
    #[serde(default)]
    pub all_variants: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn line_key(product_id: String, color: Option<String>, size: Option<String>) -> LineKey {
    LineKey::new(ProductId::new(product_id), non_blank(color), non_blank(size))
}

/// Display the cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartResponse>> {
    let store = state.cart_store(&session);
    let cart = store.load().await?;
    let expires_at = store.expires_at().await?;
    Ok(Json(CartResponse::new(cart, expires_at)))
}

/// Add a product to the cart at its current price.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddToCartForm>,
) -> Result<Json<CartResponse>> {
    let quantity = form.quantity.map_or(Ok(Quantity::ONE), Quantity::new)?;
    let product = state
        .catalog()
        .get_product(&ProductId::new(form.product_id))
        .await?;
    let item = line_item_for(&product, quantity, form.color, form.size)?;

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[
            ("product_id", product.id.as_str()),
            ("quantity", &quantity.to_string()),
        ]),
    );

    let store = state.cart_store(&session);
    let cart = store.add_to_cart(item).await?;
    let expires_at = store.expires_at().await?;
    Ok(Json(CartResponse::new(cart, expires_at)))
}

/// Set the quantity of a cart line.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateCartForm>,
) -> Result<Json<CartResponse>> {
    let quantity = Quantity::new(form.quantity)?;
    let key = line_key(form.product_id, form.color, form.size);

    let store = state.cart_store(&session);
    let cart = store.update_quantity(&key, quantity).await?;
    let expires_at = store.expires_at().await?;
    Ok(Json(CartResponse::new(cart, expires_at)))
}

/// Remove a cart line, or every line for a product.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Json<CartResponse>> {
    let store = state.cart_store(&session);
    let cart = if form.all_variants {
        store
            .remove_all_variants(&ProductId::new(form.product_id))
            .await?
    } else {
        let key = line_key(form.product_id, form.color, form.size);
        store.remove_from_cart(&key).await?
    };
    let expires_at = store.expires_at().await?;
    Ok(Json(CartResponse::new(cart, expires_at)))
}

/// Empty the cart.
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Json<CartResponse>> {
    state.cart_store(&session).clear_cart().await?;
    Ok(Json(CartResponse::new(Cart::new(), None)))
}

/// Cart count badge.
#[instrument(skip(state, session))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CartCountResponse>> {
    let count = state.cart_store(&session).get_cart_count().await?;
    Ok(Json(CartCountResponse { count }))
}
