//! Request and body matching.
//!
//! Matching never fails: evaluation errors resolve to a non-match and their
//! reasons are collected in a [`MatchDifference`] that callers log at debug level.
//!
//! # Module Structure
//!
//! - `request` - matching an [`HttpRequest`](crate::model::HttpRequest) pattern field by field
//! - `body` - the per-variant body matching contract
//! - `json` - subset and strict JSON comparison
//! - `json_schema` - compiled JSON schema validation
//! - `xml` - structural XML comparison and XPath evaluation
//! - `xml_schema` - a validating subset of XML Schema
//! - `difference` - field-to-reasons report of a failed match

mod body;
mod difference;
mod json;
pub mod json_schema;
mod request;
pub mod xml;
pub mod xml_schema;

pub use difference::{MatchDifference, MatchField};
pub use json::json_matches;
pub use json_schema::{JsonSchemaValidator, SchemaError, SchemaViolation};
pub use xml_schema::XmlSchemaValidator;
