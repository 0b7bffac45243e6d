//! Lattice Core - Shared types library.
//!
//! This crate provides the types used across the Lattice storefront:
//! - `storefront` - Public-facing HTTP service and session-backed stores
//! - `cli` - Command-line tools for migrations and diagnostics
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no session
//! access, no HTTP clients. Cart merging, filter application and expiry
//! checks all live here so they can be tested without a runtime.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices, quantities, tax rates, carts, products, filters
//! - [`time`] - Clock abstraction for expiry checks

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod time;
pub mod types;

pub use time::{Clock, ManualClock, SystemClock};
pub use types::*;
