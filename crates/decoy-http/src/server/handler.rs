//! Per-request handling: control plane, matching and dispatch.

use super::convert::request_from_hyper;
use super::response::{full, shape, ResponseBody};
use super::state::ServerState;
use super::stream::ConnectionControl;
use crate::action::Outcome;
use crate::admin_api;
use crate::model::HttpResponse;
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a request handler knows about the connection it arrived on.
pub(crate) struct ConnectionContext {
    pub local_addr: SocketAddr,
    pub remote_addr: SocketAddr,
    pub control: Arc<ConnectionControl>,
    /// Notified when the connection should be closed after the current response
    pub close: Arc<Notify>,
    /// Cancelled when the connection or the server goes away
    pub cancel: CancellationToken,
}

impl ConnectionContext {
    fn close_after(&self, delay: Duration) {
        let close = Arc::clone(&self.close);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => close.notify_one(),
            }
        });
    }
}

fn empty_response() -> Response<ResponseBody> {
    Response::new(full(Bytes::new()))
}

pub(crate) async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
    conn: Arc<ConnectionContext>,
) -> Result<Response<ResponseBody>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body from {}: {}", conn.remote_addr, e);
            let mut response = Response::new(full(format!("Failed to read request body: {e}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    if let Some(route) = parts.uri.path().strip_prefix(admin_api::PATH_PREFIX) {
        debug!("Control plane: {} {}", parts.method, parts.uri);
        return Ok(admin_api::route_request(&parts.method, route, parts.uri.query(), &body, &state));
    }

    let mut request = request_from_hyper(&parts, &body, false, conn.local_addr);
    let keep_alive = request.keep_alive.unwrap_or(true);
    info!("Received {} from {}", request, conn.remote_addr);

    let Some(expectation) = state.store.claim(&request) else {
        state.store.record(&request, None);
        info!("No expectation matched {}, returning 404", request);
        return Ok(shape(&HttpResponse::not_found(), keep_alive).response);
    };
    state.store.record(&request, Some(&expectation.id));
    if let Some(parameters) = expectation.http_request.capture_path_parameters(&request) {
        request.path_parameters = parameters;
    }

    let outcome = state.actions.handle(&expectation, &request, &conn.cancel).await;
    let response = match outcome {
        Outcome::Respond(response) => {
            info!(
                "Returning {} for {} (expectation {})",
                response.status(),
                request,
                expectation.id
            );
            let shaped = shape(&response, keep_alive);
            if let Some(delay) = shaped.close_after {
                conn.close_after(delay);
            }
            shaped.response
        }
        Outcome::DropConnection => {
            info!("Dropping connection for {} (expectation {})", request, expectation.id);
            conn.control.drop_connection();
            empty_response()
        }
        Outcome::RawBytes(bytes) => {
            info!(
                "Writing {} raw bytes for {} (expectation {})",
                bytes.len(),
                request,
                expectation.id
            );
            conn.control.write_raw(bytes);
            empty_response()
        }
        Outcome::Cancelled => {
            conn.control.drop_connection();
            empty_response()
        }
    };
    Ok(response)
}
