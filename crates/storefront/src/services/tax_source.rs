//! Remote source of the global tax rate.
//!
//! The rate lives in a remote configuration document shaped like
//! `{ "taxRate": 0.1 }`. Deployments without a remote source use a fixed
//! rate from configuration.

use std::time::Duration;

use lattice_core::{TaxPolicy, TaxRate};
use thiserror::Error;
use tracing::instrument;

/// Timeout for a single fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors fetching the tax rate.
#[derive(Debug, Error)]
pub enum TaxSourceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Config source returned a non-success status.
    #[error("config source returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Body was not a valid tax policy document.
    #[error("invalid tax document: {0}")]
    Parse(String),
}

/// Where the tax rate comes from.
#[derive(Debug, Clone)]
pub enum TaxRateSource {
    /// Remote config document fetched over HTTP.
    Remote { client: reqwest::Client, url: String },
    /// A rate fixed at startup.
    Fixed(TaxRate),
}

impl TaxRateSource {
    /// Remote source with a client carrying the fetch timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn remote(url: impl Into<String>) -> Result<Self, TaxSourceError> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self::Remote {
            client,
            url: url.into(),
        })
    }

    /// Fetch the current rate.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the source answers with a
    /// non-success status, or the document is malformed or out of range.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<TaxRate, TaxSourceError> {
        match self {
            Self::Fixed(rate) => Ok(*rate),
            Self::Remote { client, url } => {
                let response = client.get(url).send().await?;
                let status = response.status();

                if !status.is_success() {
                    let message = response.text().await.unwrap_or_default();
                    return Err(TaxSourceError::Status {
                        status: status.as_u16(),
                        message: message.chars().take(200).collect(),
                    });
                }

                let body = response.text().await?;
                let policy: TaxPolicy = serde_json::from_str(&body)
                    .map_err(|e| TaxSourceError::Parse(e.to_string()))?;
                tracing::debug!(rate = %policy.tax_rate, "fetched tax rate");
                Ok(policy.tax_rate)
            }
        }
    }
}
