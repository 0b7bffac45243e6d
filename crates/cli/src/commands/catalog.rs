//! Catalog file validation.
//!
//! ```bash
//! lattice-cli catalog check products.json
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use lattice_storefront::catalog::load_products_file;

use super::CommandError;

/// Parse and validate a local catalog file, then log a per-category summary.
///
/// # Errors
///
/// Returns error if the file cannot be read, parsed, or fails validation.
pub fn check(path: &Path) -> Result<(), CommandError> {
    let products = load_products_file(path)?;

    let mut per_category: BTreeMap<&str, usize> = BTreeMap::new();
    for product in &products {
        *per_category.entry(product.category.as_str()).or_default() += 1;
    }
    let on_sale = products.iter().filter(|p| p.is_on_sale()).count();

    tracing::info!(
        path = %path.display(),
        products = products.len(),
        on_sale,
        "catalog is valid"
    );
    for (category, count) in per_category {
        tracing::info!(category, count, "category");
    }
    Ok(())
}
