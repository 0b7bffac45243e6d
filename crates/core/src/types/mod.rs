//! Core types for the Lattice storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod expiring;
pub mod filter;
pub mod id;
pub mod price;
pub mod product;
pub mod quantity;
pub mod tax;

pub use cart::{Cart, CartLineItem, LineKey};
pub use expiring::{Expiring, Freshness};
pub use filter::{CategoryFilterSelection, PriceSort};
pub use id::*;
pub use price::{CurrencyCode, Price, PriceError, round_money};
pub use product::Product;
pub use quantity::{Quantity, QuantityError};
pub use tax::{TaxPolicy, TaxRate, TaxRateError};
