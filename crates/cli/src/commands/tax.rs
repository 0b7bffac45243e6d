//! Tax source check.
//!
//! ```bash
//! lattice-cli tax fetch --url https://config.example.com/tax.json
//! ```

use lattice_storefront::services::{RetryPolicy, TaxRateSource, retry_with_backoff};

use super::CommandError;

/// Fetch the tax rate once (with the default retry policy) and log it.
///
/// Uses `url` if given, otherwise `TAX_SOURCE_URL`.
///
/// # Errors
///
/// Returns error if no URL is configured or every attempt fails.
pub async fn fetch(url: Option<String>) -> Result<(), CommandError> {
    dotenvy::dotenv().ok();

    let url = url
        .or_else(|| std::env::var("TAX_SOURCE_URL").ok())
        .ok_or(CommandError::MissingEnvVar("TAX_SOURCE_URL"))?;
    let source = TaxRateSource::remote(url.clone())?;

    let rate = retry_with_backoff(&RetryPolicy::default(), "fetch_tax_rate", || source.fetch())
        .await
        .map_err(|e| e.last)?;

    tracing::info!(%url, %rate, "tax rate fetched");
    Ok(())
}
