//! Request verification handlers.

use crate::admin_api::types::{empty_response, error_response, text_response};
use crate::model::{Verification, VerificationSequence};
use crate::server::response::ResponseBody;
use crate::server::ServerState;
use hyper::{Response, StatusCode};
use tracing::info;

/// PUT /mockserver/verify - 202 when the count is in range, 406 with the reason otherwise
pub fn handle_verify(body: &[u8], state: &ServerState) -> Response<ResponseBody> {
    let verification: Verification = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid verification JSON: {e}"),
            )
        }
    };
    info!(
        "Verifying requests matching {} {}",
        verification.http_request, verification.times
    );
    match state.store.verify(&verification) {
        Ok(()) => empty_response(StatusCode::ACCEPTED),
        Err(e) => text_response(StatusCode::NOT_ACCEPTABLE, e.to_string()),
    }
}

/// PUT /mockserver/verifySequence
pub fn handle_verify_sequence(body: &[u8], state: &ServerState) -> Response<ResponseBody> {
    let sequence: VerificationSequence = match serde_json::from_slice(body) {
        Ok(s) => s,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid verification sequence JSON: {e}"),
            )
        }
    };
    info!("Verifying sequence of {} request(s)", sequence.http_requests.len());
    match state.store.verify_sequence(&sequence) {
        Ok(()) => empty_response(StatusCode::ACCEPTED),
        Err(e) => text_response(StatusCode::NOT_ACCEPTABLE, e.to_string()),
    }
}
