//! Tax rate route handler.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use lattice_core::TaxRate;
use serde::Serialize;
use tracing::instrument;

use crate::error::Result;
use crate::state::AppState;
use crate::stores::TaxRateStatus;

/// Current tax rate as seen by clients.
#[derive(Debug, Serialize)]
pub struct TaxResponse {
    /// The cached rate, 0 when unavailable.
    pub rate: TaxRate,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<TaxRateStatus> for TaxResponse {
    fn from(status: TaxRateStatus) -> Self {
        match status {
            TaxRateStatus::Valid { rate, expires_at } => Self {
                rate,
                status: "valid",
                expires_at: Some(expires_at),
            },
            TaxRateStatus::Unavailable => Self {
                rate: TaxRate::ZERO,
                status: "unavailable",
                expires_at: None,
            },
        }
    }
}

/// Show the cached tax rate.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>) -> Result<Json<TaxResponse>> {
    let status = state.tax().status().await?;
    Ok(Json(status.into()))
}
