//! Catalog product records.
//!
//! Products are owned by the remote document store; the storefront only
//! reads them, filters them and prices cart lines from them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CategoryHandle, ProductId};
use super::price::round_money;

/// A product as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: CategoryHandle,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    /// List price before any discount.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Discount in percent; 0 means the product is not on sale.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub image: String,
}

impl Product {
    /// Price after discount, rounded to cents.
    #[must_use]
    pub fn current_price(&self) -> Decimal {
        if self.discount <= Decimal::ZERO {
            return self.price;
        }
        let hundred = Decimal::ONE_HUNDRED;
        let discount = self.discount.min(hundred);
        round_money(self.price * (hundred - discount) / hundred)
    }

    /// Whether the product carries a positive discount.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.discount > Decimal::ZERO
    }

    /// Whether `size` is one of the sizes this product is offered in.
    ///
    /// Products without any listed sizes accept no size.
    #[must_use]
    pub fn offers_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|s| s == size)
    }

    /// Whether `color` is one of the colors this product is offered in.
    #[must_use]
    pub fn offers_color(&self, color: &str) -> bool {
        self.colors.iter().any(|c| c == color)
    }
}
