//! Tax rate and policy types.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::price::round_money;

/// Error constructing a tax rate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaxRateError {
    #[error("tax rate must be between 0 and 1 (got {0})")]
    OutOfRange(Decimal),
    #[error("tax rate is not a finite number: {0}")]
    NotFinite(f64),
}

/// A tax rate expressed as a fraction (0.1 = 10%).
///
/// Always within `0..=1`. Serialized as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct TaxRate(Decimal);

impl TaxRate {
    /// No tax.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a tax rate from a decimal fraction.
    ///
    /// # Errors
    ///
    /// Returns `TaxRateError::OutOfRange` if the rate is negative or above 1.
    pub fn new(rate: Decimal) -> Result<Self, TaxRateError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(TaxRateError::OutOfRange(rate));
        }
        Ok(Self(rate.normalize()))
    }

    /// The rate as a decimal fraction.
    #[must_use]
    pub const fn as_decimal(self) -> Decimal {
        self.0
    }

    /// Tax owed on `amount`, rounded to cents.
    #[must_use]
    pub fn apply(self, amount: Decimal) -> Decimal {
        round_money(amount * self.0)
    }
}

impl TryFrom<f64> for TaxRate {
    type Error = TaxRateError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let rate = Decimal::try_from(value).map_err(|_| TaxRateError::NotFinite(value))?;
        Self::new(rate)
    }
}

impl From<TaxRate> for f64 {
    fn from(rate: TaxRate) -> Self {
        rate.0.to_f64().unwrap_or_default()
    }
}

impl std::fmt::Display for TaxRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The cached tax configuration.
///
/// Persisted as `{ "taxRate": 0.1 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxPolicy {
    pub tax_rate: TaxRate,
}

impl TaxPolicy {
    #[must_use]
    pub const fn new(tax_rate: TaxRate) -> Self {
        Self { tax_rate }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range() {
        assert!(TaxRate::new(Decimal::new(-1, 2)).is_err());
        assert!(TaxRate::new(Decimal::new(101, 2)).is_err());
        assert!(TaxRate::new(Decimal::ONE).is_ok());
        assert!(TaxRate::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(matches!(
            TaxRate::try_from(f64::NAN),
            Err(TaxRateError::NotFinite(_))
        ));
    }

    #[test]
    fn test_apply_rounds_to_cents() {
        let rate = TaxRate::new(Decimal::new(825, 4)).unwrap_or_default();
        // 19.99 * 0.0825 = 1.649175
        assert_eq!(rate.apply(Decimal::new(1999, 2)), Decimal::new(165, 2));
    }

    #[test]
    fn test_policy_wire_format() {
        let policy = TaxPolicy::new(TaxRate::new(Decimal::new(1, 1)).unwrap_or_default());
        let json = serde_json::to_value(policy).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "taxRate": 0.1 }));

        let parsed: TaxPolicy = serde_json::from_str(r#"{"taxRate":0.2}"#)
            .unwrap_or(TaxPolicy::new(TaxRate::ZERO));
        assert_eq!(parsed.tax_rate.as_decimal(), Decimal::new(2, 1));
    }

    #[test]
    fn test_policy_rejects_negative_rate() {
        assert!(serde_json::from_str::<TaxPolicy>(r#"{"taxRate":-0.5}"#).is_err());
    }
}
