//! Shopping cart state.
//!
//! A cart is an ordered list of line items. Lines are identified by the
//! `(id, color, size)` tuple: adding an item whose key already exists bumps
//! that line's quantity instead of appending a new line.
//!
//! This module is pure state; persistence and expiry live in the
//! storefront's cart store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::round_money;
use super::quantity::Quantity;

/// A single row in the cart: one product variant and its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: ProductId,
    pub name: String,
    /// Unit price at the time the item was added.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub image: String,
    pub quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

impl CartLineItem {
    /// The merge identity of this line.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey {
            id: self.id.clone(),
            color: self.color.clone(),
            size: self.size.clone(),
        }
    }

    fn matches(&self, key: &LineKey) -> bool {
        self.id == key.id && self.color == key.color && self.size == key.size
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        round_money(self.price * Decimal::from(self.quantity.get()))
    }
}

/// Identity of a cart line: product id plus the chosen variant options.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub id: ProductId,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

impl LineKey {
    #[must_use]
    pub const fn new(id: ProductId, color: Option<String>, size: Option<String>) -> Self {
        Self { id, color, size }
    }
}

/// The cart contents. Insertion order is display order.
///
/// Persisted as `{ "items": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartLineItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add an item. Merges into an existing line with the same key by adding
    /// the quantities; otherwise appends a new line.
    pub fn add(&mut self, item: CartLineItem) {
        let key = item.key();
        match self.items.iter_mut().find(|line| line.matches(&key)) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }
    }

    /// Remove the line with exactly this key. Returns whether a line was removed.
    pub fn remove(&mut self, key: &LineKey) -> bool {
        let before = self.items.len();
        self.items.retain(|line| !line.matches(key));
        self.items.len() != before
    }

    /// Remove every line for a product, whatever its color or size.
    /// Returns the number of lines removed.
    pub fn remove_all_variants(&mut self, id: &ProductId) -> usize {
        let before = self.items.len();
        self.items.retain(|line| &line.id != id);
        before - self.items.len()
    }

    /// Set the quantity of the line with this key. Returns whether a line matched.
    pub fn update_quantity(&mut self, key: &LineKey, quantity: Quantity) -> bool {
        self.items
            .iter_mut()
            .find(|line| line.matches(key))
            .map(|line| line.quantity = quantity)
            .is_some()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.items
            .iter()
            .map(|line| u64::from(line.quantity.get()))
            .sum()
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove all lines.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
