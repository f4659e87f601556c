//! Expectation and request log handlers.

use crate::admin_api::types::{
    empty_response, error_response, errors_response, json_response, parse_expectations,
    ClearType, ExpectationId, RetrieveType,
};
use crate::model::{ExpectationDto, HttpRequest};
use crate::server::response::ResponseBody;
use crate::server::ServerState;
use hyper::{Response, StatusCode};
use tracing::info;

/// PUT /mockserver/expectation - Register one or more expectations
pub fn handle_add(body: &[u8], state: &ServerState) -> Response<ResponseBody> {
    let dtos = match parse_expectations(body) {
        Ok(dtos) => dtos,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid expectation JSON: {e}"),
            )
        }
    };
    match state.register(dtos) {
        Ok(stored) => {
            let body: Vec<ExpectationDto> = stored.iter().map(|e| e.to_dto()).collect();
            json_response(StatusCode::CREATED, &body)
        }
        Err(errors) => errors_response(StatusCode::BAD_REQUEST, errors),
    }
}

enum ClearTarget {
    Everything,
    Id(String),
    Pattern(HttpRequest),
}

fn parse_clear_target(body: &[u8]) -> Result<ClearTarget, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ClearTarget::Everything);
    }
    if let Ok(ExpectationId { id }) = serde_json::from_slice(body) {
        return Ok(ClearTarget::Id(id));
    }
    serde_json::from_slice(body)
        .map(ClearTarget::Pattern)
        .map_err(|e| format!("Invalid request matcher JSON: {e}"))
}

fn parse_pattern(body: &[u8]) -> Result<Option<HttpRequest>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| format!("Invalid request matcher JSON: {e}"))
}

/// PUT /mockserver/clear - Remove expectations and/or logged requests
pub fn handle_clear(query: Option<&str>, body: &[u8], state: &ServerState) -> Response<ResponseBody> {
    let clear_type = match ClearType::parse(query) {
        Ok(t) => t,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let target = match parse_clear_target(body) {
        Ok(t) => t,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    let pattern = match target {
        ClearTarget::Id(id) => {
            if clear_type != ClearType::Log {
                let removed = state.store.remove(&id);
                info!("Cleared expectation {} (found={})", id, removed);
            }
            return empty_response(StatusCode::OK);
        }
        ClearTarget::Everything => None,
        ClearTarget::Pattern(pattern) => Some(pattern),
    };
    match clear_type {
        ClearType::All => state.store.clear(pattern.as_ref()),
        ClearType::Expectations => state.store.clear_expectations(pattern.as_ref()),
        ClearType::Log => state.store.clear_log(pattern.as_ref()),
    }
    empty_response(StatusCode::OK)
}

/// PUT /mockserver/reset - Remove everything
pub fn handle_reset(state: &ServerState) -> Response<ResponseBody> {
    state.store.reset();
    empty_response(StatusCode::OK)
}

/// PUT /mockserver/retrieve - Active expectations or recorded requests
pub fn handle_retrieve(
    query: Option<&str>,
    body: &[u8],
    state: &ServerState,
) -> Response<ResponseBody> {
    let retrieve_type = match RetrieveType::parse(query) {
        Ok(t) => t,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };
    let pattern = match parse_pattern(body) {
        Ok(p) => p,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
    };

    match retrieve_type {
        RetrieveType::ActiveExpectations => {
            let active: Vec<ExpectationDto> = state
                .store
                .retrieve_active(pattern.as_ref())
                .iter()
                .map(|e| e.to_dto())
                .collect();
            json_response(StatusCode::OK, &active)
        }
        RetrieveType::Requests => {
            let requests: Vec<HttpRequest> = state
                .store
                .retrieve_recorded(pattern.as_ref())
                .into_iter()
                .map(|r| r.http_request)
                .collect();
            json_response(StatusCode::OK, &requests)
        }
        RetrieveType::RequestLog => {
            json_response(StatusCode::OK, &state.store.retrieve_recorded(pattern.as_ref()))
        }
    }
}
