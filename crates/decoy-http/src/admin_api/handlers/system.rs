//! System handlers.

use crate::admin_api::types::{json_response, StatusResponse};
use crate::server::response::ResponseBody;
use crate::server::ServerState;
use hyper::{Response, StatusCode};

/// PUT /mockserver/status - Bound ports
pub fn handle_status(state: &ServerState) -> Response<ResponseBody> {
    json_response(
        StatusCode::OK,
        &StatusResponse {
            ports: state.ports(),
        },
    )
}
