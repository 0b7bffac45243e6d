//! Product and category route handlers.
//!
//! Category filters are not stored anywhere: the selection travels in the
//! query string (`?sort=low-to-high&sizes=L&sizes=M&brands=Acme`), one key
//! per selected value, and every facet option carries the link that toggles
//! it.

use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, RawQuery, State},
};
use lattice_core::{CategoryFilterSelection, CategoryHandle, PriceSort, Product, ProductId};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

// =============================================================================
// Query-string codec
// =============================================================================

/// Filter query parameters.
///
/// Multi-select dimensions repeat their key once per value, so values may
/// contain any character, commas included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterQuery {
    pub sort: Option<String>,
    pub sizes: Vec<String>,
    pub brands: Vec<String>,
    pub materials: Vec<String>,
}

impl FilterQuery {
    /// Parse a raw query string (without the leading `?`).
    ///
    /// Blank values and unknown keys are skipped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let value = value.to_string();
            match key.as_ref() {
                "sort" => query.sort = Some(value),
                "sizes" => query.sizes.push(value),
                "brands" => query.brands.push(value),
                "materials" => query.materials.push(value),
                _ => {}
            }
        }
        query
    }

    /// Decode into a selection. Unknown sort values are ignored.
    #[must_use]
    pub fn selection(&self) -> CategoryFilterSelection {
        CategoryFilterSelection {
            price_sort: self.sort.as_deref().and_then(PriceSort::parse),
            sizes: self.sizes.iter().cloned().collect(),
            brands: self.brands.iter().cloned().collect(),
            materials: self.materials.iter().cloned().collect(),
        }
    }
}

/// Encode a selection as a query string, without the leading `?`.
///
/// Empty selections encode as an empty string.
#[must_use]
pub fn to_query_string(selection: &CategoryFilterSelection) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    if let Some(sort) = selection.price_sort {
        serializer.append_pair("sort", sort.as_str());
    }
    for (name, values) in [
        ("sizes", &selection.sizes),
        ("brands", &selection.brands),
        ("materials", &selection.materials),
    ] {
        for value in values {
            serializer.append_pair(name, value);
        }
    }
    serializer.finish()
}

fn href(path: &str, selection: &CategoryFilterSelection) -> String {
    let query = to_query_string(selection);
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

// =============================================================================
// Views
// =============================================================================

/// Product as returned to clients, with derived pricing.
#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_price: Decimal,
    pub on_sale: bool,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        Self {
            product: product.clone(),
            current_price: product.current_price(),
            on_sale: product.is_on_sale(),
        }
    }
}

/// One selectable facet value.
#[derive(Debug, Serialize)]
pub struct FacetOption {
    pub value: String,
    pub selected: bool,
    /// Link that toggles this value.
    pub href: String,
}

/// Every filter option available for a listing.
#[derive(Debug, Serialize)]
pub struct Facets {
    pub price: Vec<FacetOption>,
    pub sizes: Vec<FacetOption>,
    pub brands: Vec<FacetOption>,
    pub materials: Vec<FacetOption>,
    /// Link with every filter cleared.
    pub clear_href: String,
}

impl Facets {
    /// Build facets for `products` (the unfiltered listing) under `path`.
    #[must_use]
    pub fn build(path: &str, products: &[Product], selection: &CategoryFilterSelection) -> Self {
        let price = PriceSort::ALL
            .iter()
            .map(|&sort| {
                let selected = selection.price_sort == Some(sort);
                let mut next = selection.clone();
                next.set_price_filter(if selected { None } else { Some(sort) });
                FacetOption {
                    value: sort.label().to_string(),
                    selected,
                    href: href(path, &next),
                }
            })
            .collect();

        let sizes: BTreeSet<&str> = products
            .iter()
            .flat_map(|p| p.sizes.iter().map(String::as_str))
            .collect();
        let brands: BTreeSet<&str> = products.iter().filter_map(|p| p.brand.as_deref()).collect();
        let materials: BTreeSet<&str> = products
            .iter()
            .filter_map(|p| p.material.as_deref())
            .collect();

        let options = |values: BTreeSet<&str>,
                       current: &BTreeSet<String>,
                       toggle: fn(&mut CategoryFilterSelection, &str)| {
            values
                .into_iter()
                .map(|value| {
                    let mut next = selection.clone();
                    toggle(&mut next, value);
                    FacetOption {
                        value: value.to_string(),
                        selected: current.contains(value),
                        href: href(path, &next),
                    }
                })
                .collect::<Vec<_>>()
        };

        let mut cleared = selection.clone();
        cleared.clear_filters();

        Self {
            price,
            sizes: options(
                sizes,
                &selection.sizes,
                CategoryFilterSelection::toggle_size_filter,
            ),
            brands: options(
                brands,
                &selection.brands,
                CategoryFilterSelection::toggle_brand_filter,
            ),
            materials: options(
                materials,
                &selection.materials,
                CategoryFilterSelection::toggle_material_filter,
            ),
            clear_href: href(path, &cleared),
        }
    }
}

/// Product listing response.
#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductView>,
    pub count: usize,
    pub filters: CategoryFilterSelection,
}

/// Category listing response.
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub category: CategoryHandle,
    pub products: Vec<ProductView>,
    pub count: usize,
    pub filters: CategoryFilterSelection,
    pub facets: Facets,
}

// =============================================================================
// Handlers
// =============================================================================

/// List all products, filtered and sorted by the query.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<ProductListResponse>> {
    let products = state.catalog().list_products().await?;
    let selection = FilterQuery::parse(query.as_deref().unwrap_or_default()).selection();
    let selected: Vec<ProductView> = selection
        .apply(&products)
        .into_iter()
        .map(ProductView::from)
        .collect();

    Ok(Json(ProductListResponse {
        count: selected.len(),
        products: selected,
        filters: selection,
    }))
}

/// Show one product.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductView>> {
    let product = state.catalog().get_product(&ProductId::new(id)).await?;
    Ok(Json(ProductView::from(&product)))
}

/// Show a category listing with filters and facets.
#[instrument(skip(state))]
pub async fn category(
    State(state): State<AppState>,
    Path(handle): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<CategoryResponse>> {
    let handle = CategoryHandle::new(handle);
    let products = state.catalog().products_in_category(&handle).await?;
    if products.is_empty() {
        return Err(AppError::NotFound(format!("category {handle}")));
    }

    let selection = FilterQuery::parse(query.as_deref().unwrap_or_default()).selection();
    let path = format!("/categories/{handle}");
    let facets = Facets::build(&path, &products, &selection);
    let selected: Vec<ProductView> = selection
        .apply(&products)
        .into_iter()
        .map(ProductView::from)
        .collect();

    Ok(Json(CategoryResponse {
        category: handle,
        count: selected.len(),
        products: selected,
        filters: selection,
        facets,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, sizes: &[&str], brand: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: id.to_string(),
            category: CategoryHandle::new("tops"),
            brand: Some(brand.to_string()),
            material: None,
            price: Decimal::new(20, 0),
            discount: Decimal::ZERO,
            sizes: sizes.iter().map(|s| (*s).to_string()).collect(),
            colors: Vec::new(),
            image: String::new(),
        }
    }

    #[test]
    fn test_query_decodes_repeated_keys() {
        let query =
            FilterQuery::parse("sort=high-to-low&sizes=M&sizes=+L+&sizes=&materials=Cotton&page=2");
        let selection = query.selection();

        assert_eq!(selection.price_sort, Some(PriceSort::HighToLow));
        assert_eq!(selection.sizes.len(), 2);
        assert!(selection.sizes.contains("L"));
        assert!(selection.brands.is_empty());
        assert!(selection.materials.contains("Cotton"));
    }

    #[test]
    fn test_unknown_sort_is_ignored() {
        assert!(FilterQuery::parse("sort=random").selection().is_empty());
        assert!(FilterQuery::parse("").selection().is_empty());
    }

    #[test]
    fn test_values_with_commas_survive_round_trip() {
        let mut selection = CategoryFilterSelection::default();
        selection.toggle_brand_filter("Smith, Wesson");
        selection.toggle_brand_filter("Acme");
        selection.toggle_material_filter("Cotton/Linen, 60/40");

        let encoded = to_query_string(&selection);
        assert_eq!(FilterQuery::parse(&encoded).selection(), selection);
    }

    #[test]
    fn test_to_query_string() {
        let mut selection = CategoryFilterSelection::default();
        assert_eq!(to_query_string(&selection), "");

        selection.set_price_filter(Some(PriceSort::LowToHigh));
        selection.toggle_size_filter("M");
        selection.toggle_size_filter("L");
        selection.toggle_brand_filter("Acme & Co");

        assert_eq!(
            to_query_string(&selection),
            "sort=low-to-high&sizes=L&sizes=M&brands=Acme+%26+Co"
        );
    }

    #[test]
    fn test_facets_toggle_links() {
        let products = vec![
            product("a", &["S", "M"], "Acme"),
            product("b", &["M", "L"], "Zenith"),
        ];
        let mut selection = CategoryFilterSelection::default();
        selection.toggle_size_filter("M");

        let facets = Facets::build("/categories/tops", &products, &selection);

        let sizes: Vec<&str> = facets.sizes.iter().map(|o| o.value.as_str()).collect();
        assert_eq!(sizes, ["L", "M", "S"]);

        let medium = facets.sizes.iter().find(|o| o.value == "M");
        assert!(medium.is_some_and(|o| o.selected && o.href == "/categories/tops"));

        let large = facets.sizes.iter().find(|o| o.value == "L");
        assert!(large.is_some_and(|o| !o.selected && o.href == "/categories/tops?sizes=L&sizes=M"));

        assert_eq!(facets.brands.len(), 2);
        assert_eq!(facets.price.len(), 3);
        assert_eq!(facets.clear_href, "/categories/tops");
    }
}
