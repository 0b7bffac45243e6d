//! Lattice storefront library.
//!
//! The storefront state layer behind an HTTP API:
//!
//! - [`stores::CartStore`] - per-visitor cart in the session, expiring one
//!   hour after the first item was added
//! - [`stores::TaxStore`] - process-wide tax rate with a time-to-live and a
//!   background refresher
//! - [`routes::catalog`] - category listings filtered by a selection carried
//!   in the query string
//!
//! The binary wires these up; this crate exposes them so they can be tested
//! and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;
pub mod stores;

use axum::{Router, body::Body, http::Request};
use tower_http::trace::TraceLayer;
use tower_sessions::SessionStore;

use routes::RateLimits;
use state::AppState;

/// Build the full application router.
///
/// Layers, outermost first: Sentry, request tracing, request ID, sessions.
pub fn app<S>(state: AppState, session_store: S, limits: RateLimits) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = middleware::create_session_layer(session_store, state.config());

    routes::routes(limits)
        .layer(session_layer)
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
