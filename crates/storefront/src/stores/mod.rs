//! Storefront state stores.
//!
//! - [`cart`] - Per-visitor cart persisted in the session
//! - [`tax`] - Process-wide tax rate with a time-to-live
//!
//! Filter selections are not persisted; they travel in the query string
//! (see `routes::catalog`).

pub mod cart;
pub mod tax;

pub use cart::{CartError, CartStore, DEFAULT_CART_TTL_SECS, line_item_for};
pub use tax::{DEFAULT_TAX_TTL_SECS, TaxError, TaxRateStatus, TaxStore};
