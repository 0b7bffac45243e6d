//! Category listing filter selections.
//!
//! A `CategoryFilterSelection` is transient UI state: one price sort plus
//! three multi-select sets. [`CategoryFilterSelection::apply`] is the
//! consumer routine that narrows and orders a product list with it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::product::Product;

/// Single-select price option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceSort {
    #[serde(rename = "Low to High")]
    LowToHigh,
    #[serde(rename = "High to Low")]
    HighToLow,
    #[serde(rename = "On Sale")]
    OnSale,
}

impl PriceSort {
    /// All options in display order.
    pub const ALL: [Self; 3] = [Self::LowToHigh, Self::HighToLow, Self::OnSale];

    /// Parse from a URL parameter or display label.
    ///
    /// Unknown values yield `None`, which imposes no constraint.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "low-to-high" | "Low to High" | "price-ascending" => Some(Self::LowToHigh),
            "high-to-low" | "High to Low" | "price-descending" => Some(Self::HighToLow),
            "on-sale" | "On Sale" => Some(Self::OnSale),
            _ => None,
        }
    }

    /// Convert to URL parameter value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LowToHigh => "low-to-high",
            Self::HighToLow => "high-to-low",
            Self::OnSale => "on-sale",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::LowToHigh => "Low to High",
            Self::HighToLow => "High to Low",
            Self::OnSale => "On Sale",
        }
    }
}

/// Filter selections for a category listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFilterSelection {
    pub price_sort: Option<PriceSort>,
    pub sizes: BTreeSet<String>,
    pub brands: BTreeSet<String>,
    pub materials: BTreeSet<String>,
}

/// Add `value` if absent, remove it if present.
fn toggle(set: &mut BTreeSet<String>, value: &str) {
    if !set.remove(value) {
        set.insert(value.to_owned());
    }
}

impl CategoryFilterSelection {
    /// Replace the price sort.
    pub const fn set_price_filter(&mut self, value: Option<PriceSort>) {
        self.price_sort = value;
    }

    pub fn toggle_size_filter(&mut self, size: &str) {
        toggle(&mut self.sizes, size);
    }

    pub fn toggle_brand_filter(&mut self, brand: &str) {
        toggle(&mut self.brands, brand);
    }

    pub fn toggle_material_filter(&mut self, material: &str) {
        toggle(&mut self.materials, material);
    }

    /// Reset every selection.
    pub fn clear_filters(&mut self) {
        *self = Self::default();
    }

    /// Whether no selection is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.price_sort.is_none()
            && self.sizes.is_empty()
            && self.brands.is_empty()
            && self.materials.is_empty()
    }

    /// Whether a product passes the "On Sale" and multi-select constraints.
    ///
    /// Within a dimension any selected value matches; across dimensions all
    /// non-empty selections must match.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if self.price_sort == Some(PriceSort::OnSale) && !product.is_on_sale() {
            return false;
        }
        if !self.sizes.is_empty() && !product.sizes.iter().any(|s| self.sizes.contains(s)) {
            return false;
        }
        if !self.brands.is_empty()
            && !product
                .brand
                .as_ref()
                .is_some_and(|b| self.brands.contains(b))
        {
            return false;
        }
        if !self.materials.is_empty()
            && !product
                .material
                .as_ref()
                .is_some_and(|m| self.materials.contains(m))
        {
            return false;
        }
        true
    }

    /// Filter and order `products`.
    ///
    /// Price sorts are stable, so products with equal current prices keep
    /// their catalog order.
    #[must_use]
    pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        let mut selected: Vec<&Product> = products.iter().filter(|p| self.matches(p)).collect();

        match self.price_sort {
            Some(PriceSort::LowToHigh) => {
                selected.sort_by_key(|p| p.current_price());
            }
            Some(PriceSort::HighToLow) => {
                selected.sort_by(|a, b| b.current_price().cmp(&a.current_price()));
            }
            Some(PriceSort::OnSale) | None => {}
        }

        selected
    }
}
