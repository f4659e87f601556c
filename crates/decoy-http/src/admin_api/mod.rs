//! Control-plane REST API served under `/mockserver/`.
//!
//! This module provides a MockServer-style API for:
//! - Registering expectations (`PUT /mockserver/expectation`)
//! - Clearing expectations and recorded requests (`PUT /mockserver/clear`, `PUT /mockserver/reset`)
//! - Retrieving active expectations and recorded requests (`PUT /mockserver/retrieve`)
//! - Reporting bound ports (`PUT /mockserver/status`)
//! - Verifying received requests (`PUT /mockserver/verify`, `PUT /mockserver/verifySequence`)
//!
//! The API shares the listener with mocked traffic.

mod handlers;
mod router;
mod types;

pub use router::route_request;
pub use types::parse_expectations;

/// Paths under this prefix never reach the expectation store.
pub const PATH_PREFIX: &str = "/mockserver/";
