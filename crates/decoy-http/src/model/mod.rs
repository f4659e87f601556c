//! Domain model for expectations, requests, responses and actions.
//!
//! # Module Structure
//!
//! - `nottable` - negatable, pattern-capable string values
//! - `multimap` - case-insensitive ordered maps for headers, cookies and parameters
//! - `media_type` - content types and charsets
//! - `body` - the closed set of body variants and their wire form
//! - `request` / `response` - HTTP request patterns and responses
//! - `modifier` - declarative add / replace / remove modifications
//! - `action` - what to do when an expectation matches
//! - `expectation` - request pattern + action + lifecycle (times, time-to-live)
//! - `verification` - assertions about received requests

mod action;
mod body;
mod expectation;
mod media_type;
mod modifier;
mod multimap;
mod nottable;
mod request;
mod response;
mod verification;

pub use action::{
    Action, ActionType, ConnectionOptions, Delay, HttpClassCallback, HttpError, HttpForward,
    HttpObjectCallback, HttpOverrideForwardedRequest, HttpTemplate, HttpWebhook, Scheme,
    TemplateType, TimeUnit,
};
pub use body::{
    parse_form_parameters, BinaryBody, Body, BodyType, JsonBody, JsonPathBody, JsonSchemaBody,
    LogEventBody, ParameterBody, RegexBody, StringBody, XPathBody, XmlBody, XmlSchemaBody,
};
pub use expectation::{
    ConfigError, Expectation, ExpectationDto, ExpectationState, TimeToLive, Times,
};
pub use media_type::{Charset, MediaType, DEFAULT_HTTP_CHARSET};
pub use modifier::{
    HttpRequestModifier, HttpResponseModifier, MapModifications, Modifier, PathModifier,
};
pub use multimap::{
    KeyAndValue, KeyMatchStyle, KeyToMultiValue, KeysAndValues, KeysToMultiValues,
    MatchableMultiMap,
};
pub use nottable::{NottableKind, NottableString};
pub use request::{HttpRequest, SocketAddress};
pub use response::HttpResponse;
pub use verification::{Verification, VerificationSequence, VerificationTimes};

use serde::{Deserialize, Serialize};

/// How a `JSON` body pattern is compared with a candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Strict,
    #[default]
    OnlyMatchingFields,
}

/// Errors building model values from their wire form.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
    #[error("invalid JSON schema: {0}")]
    InvalidJsonSchema(String),
    #[error("invalid XML schema: {0}")]
    InvalidXmlSchema(String),
    #[error("invalid JSON path '{0}': {1}")]
    InvalidJsonPath(String, String),
    #[error("invalid XPath '{0}': {1}")]
    InvalidXPath(String, String),
    #[error("invalid base64 body: {0}")]
    InvalidBase64(String),
    #[error("unknown body type '{0}'")]
    UnknownBodyType(String),
    #[error("invalid body: {0}")]
    InvalidBody(String),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}
