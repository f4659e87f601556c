//! Header names and helpers shared by the listener and the outbound client.

use hyper::header::{HeaderName, HeaderValue};
use hyper::http::response::Builder;

/// Set on 404 responses produced when a forward fails.
pub static X_FORWARD_ERROR: HeaderName = HeaderName::from_static("x-decoy-forward-error");
/// Set on 500 responses produced when an action cannot be executed.
pub static X_ACTION_ERROR: HeaderName = HeaderName::from_static("x-decoy-action-error");

pub static VALUE_KEEP_ALIVE: HeaderValue = HeaderValue::from_static("keep-alive");
pub static VALUE_CLOSE: HeaderValue = HeaderValue::from_static("close");

/// Connection-scoped headers that are never copied between hops.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Extension trait for adding headers from model strings without panicking.
pub trait HeaderBuilderExt: Sized {
    /// Append `name: value`, skipping pairs that are not valid header text.
    fn try_header(self, name: &str, value: &str) -> Self;
}

impl HeaderBuilderExt for Builder {
    fn try_header(self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => self.header(name, value),
            _ => {
                tracing::warn!("Skipping invalid header {}: {}", name, value);
                self
            }
        }
    }
}

impl HeaderBuilderExt for hyper::http::request::Builder {
    fn try_header(self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => self.header(name, value),
            _ => {
                tracing::warn!("Skipping invalid header {}: {}", name, value);
                self
            }
        }
    }
}
