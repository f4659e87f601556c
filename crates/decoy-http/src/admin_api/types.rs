//! Request and response types for the control plane.

use crate::model::ExpectationDto;
use crate::server::response::{full, ResponseBody};
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorDetail>,
}

/// Individual error detail
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// `PUT /mockserver/status` body
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ports: Vec<u16>,
}

/// Body of `PUT /mockserver/clear` selecting a single expectation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectationId {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

/// Parse one expectation or an array of them.
pub fn parse_expectations(body: &[u8]) -> Result<Vec<ExpectationDto>, serde_json::Error> {
    let parsed: OneOrMany<ExpectationDto> = serde_json::from_slice(body)?;
    Ok(match parsed {
        OneOrMany::Many(dtos) => dtos,
        OneOrMany::One(dto) => vec![dto],
    })
}

/// What `PUT /mockserver/retrieve` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveType {
    ActiveExpectations,
    Requests,
    RequestLog,
}

/// What `PUT /mockserver/clear` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearType {
    All,
    Expectations,
    Log,
}

/// Value of `name` in a query string.
pub fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

impl RetrieveType {
    pub fn parse(query: Option<&str>) -> Result<Self, String> {
        match query_param(query, "type").map(str::to_ascii_lowercase).as_deref() {
            None | Some("requests") => Ok(RetrieveType::Requests),
            Some("active_expectations") => Ok(RetrieveType::ActiveExpectations),
            Some("request_log") | Some("logs") => Ok(RetrieveType::RequestLog),
            Some(other) => Err(format!("unsupported retrieve type '{}'", other)),
        }
    }
}

impl ClearType {
    pub fn parse(query: Option<&str>) -> Result<Self, String> {
        match query_param(query, "type").map(str::to_ascii_lowercase).as_deref() {
            None | Some("all") => Ok(ClearType::All),
            Some("expectations") => Ok(ClearType::Expectations),
            Some("log") => Ok(ClearType::Log),
            Some(other) => Err(format!("unsupported clear type '{}'", other)),
        }
    }
}

// =============================================================================
// Response helper functions
// =============================================================================

/// Create a JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<ResponseBody> {
    let json = serde_json::to_string_pretty(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(full(json))
        .unwrap_or_else(|_| Response::new(full("Internal Server Error")))
}

/// Build an empty response with the given status.
pub fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(full(""));
    *response.status_mut() = status;
    response
}

/// Plain-text response, used for verification failures.
pub fn text_response(status: StatusCode, body: String) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(full(body))
        .unwrap_or_else(|_| Response::new(full("Internal Server Error")))
}

/// Create an error response listing every message
pub fn errors_response(status: StatusCode, messages: Vec<String>) -> Response<ResponseBody> {
    let error = ErrorResponse {
        errors: messages
            .into_iter()
            .map(|message| ErrorDetail {
                code: status.as_str().to_string(),
                message,
            })
            .collect(),
    };
    json_response(status, &error)
}

pub fn error_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    errors_response(status, vec![message.to_string()])
}

/// Create a not found response
pub fn not_found() -> Response<ResponseBody> {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}
