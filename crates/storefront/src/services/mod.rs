//! Clients and helpers for remote collaborators.
//!
//! - [`tax_source`] - Remote tax configuration document
//! - [`retry`] - Exponential backoff used around remote calls

pub mod retry;
pub mod tax_source;

pub use retry::{RetryExhausted, RetryPolicy, retry_with_backoff};
pub use tax_source::{TaxRateSource, TaxSourceError};
