//! Route dispatch logic for the control plane.

use crate::admin_api::handlers::{expectations, system, verification};
use crate::admin_api::types::not_found;
use crate::server::response::ResponseBody;
use crate::server::ServerState;
use hyper::{Method, Response};
use tracing::debug;

/// Parsed route below `/mockserver/`
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Expectation,
    Clear,
    Reset,
    Retrieve,
    Status,
    Verify,
    VerifySequence,
}

impl Route {
    fn parse(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "expectation" => Some(Route::Expectation),
            "clear" => Some(Route::Clear),
            "reset" => Some(Route::Reset),
            "retrieve" => Some(Route::Retrieve),
            "status" => Some(Route::Status),
            "verify" => Some(Route::Verify),
            "verifySequence" => Some(Route::VerifySequence),
            _ => None,
        }
    }
}

/// Handle a control-plane request; `path` is relative to `/mockserver/`.
pub fn route_request(
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: &[u8],
    state: &ServerState,
) -> Response<ResponseBody> {
    let Some(route) = Route::parse(path) else {
        return not_found();
    };
    debug!("Control plane route {:?}", route);

    match (method, route) {
        (&Method::PUT, Route::Expectation) => expectations::handle_add(body, state),
        (&Method::PUT, Route::Clear) => expectations::handle_clear(query, body, state),
        (&Method::PUT, Route::Reset) => expectations::handle_reset(state),
        (&Method::PUT, Route::Retrieve) => expectations::handle_retrieve(query, body, state),
        (&Method::PUT, Route::Status) => system::handle_status(state),
        (&Method::PUT, Route::Verify) => verification::handle_verify(body, state),
        (&Method::PUT, Route::VerifySequence) => {
            verification::handle_verify_sequence(body, state)
        }
        _ => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::client::{ClientError, HttpClient};
    use crate::action::webhook::WebhookQueue;
    use crate::action::ActionHandler;
    use crate::model::{HttpRequest, HttpResponse, SocketAddress};
    use crate::store::ExpectationStore;
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl HttpClient for Unreachable {
        async fn send(
            &self,
            _request: HttpRequest,
            _target: Option<SocketAddress>,
        ) -> Result<HttpResponse, ClientError> {
            Err(ClientError::NoTarget)
        }
    }

    fn state() -> ServerState {
        ServerState::new(
            ExpectationStore::default(),
            ActionHandler::new(Arc::new(Unreachable), Arc::new(WebhookQueue::new(1))),
        )
    }

    async fn body_json(response: Response<ResponseBody>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("expectation"), Some(Route::Expectation));
        assert_eq!(Route::parse("retrieve/"), Some(Route::Retrieve));
        assert_eq!(Route::parse("verifySequence"), Some(Route::VerifySequence));
        assert_eq!(Route::parse("mappings"), None);
    }

    #[tokio::test]
    async fn test_add_then_retrieve_active() {
        let state = state();
        let response = route_request(
            &Method::PUT,
            "expectation",
            None,
            br#"{"id": "one", "httpRequest": {"path": "/a"}, "httpResponse": {"statusCode": 204}}"#,
            &state,
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created[0]["id"], "one");

        let response = route_request(
            &Method::PUT,
            "retrieve",
            Some("type=active_expectations"),
            b"",
            &state,
        );
        let active = body_json(response).await;
        assert_eq!(active.as_array().map(Vec::len), Some(1));
        assert_eq!(active[0]["httpResponse"]["statusCode"], 204);
    }

    #[tokio::test]
    async fn test_invalid_expectation_is_400_with_errors() {
        let state = state();
        let response = route_request(
            &Method::PUT,
            "expectation",
            None,
            br#"{"httpResponse": {}, "httpForward": {"host": "x"}}"#,
            &state,
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["errors"][0]["message"]
            .as_str()
            .unwrap()
            .contains("more than one action"));
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_clear_by_id_and_reset() {
        let state = state();
        route_request(
            &Method::PUT,
            "expectation",
            None,
            br#"[{"id": "a", "httpResponse": {}}, {"id": "b", "httpResponse": {}}]"#,
            &state,
        );
        let response = route_request(&Method::PUT, "clear", None, br#"{"id": "a"}"#, &state);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.store.len(), 1);

        route_request(&Method::PUT, "reset", None, b"", &state);
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_verify_routes() {
        let state = state();
        state
            .store
            .record(&HttpRequest::new().with_method("GET").with_path("/seen"), None);

        let response = route_request(
            &Method::PUT,
            "verify",
            None,
            br#"{"httpRequest": {"path": "/seen"}, "times": {"atLeast": 1, "atMost": 1}}"#,
            &state,
        );
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = route_request(
            &Method::PUT,
            "verify",
            None,
            br#"{"httpRequest": {"path": "/unseen"}}"#,
            &state,
        );
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        let text = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&text).starts_with("Request not found at least once"));

        let response = route_request(
            &Method::PUT,
            "verifySequence",
            None,
            br#"{"httpRequests": [{"path": "/seen"}, {"path": "/seen"}]}"#,
            &state,
        );
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);

        let response = route_request(&Method::PUT, "verify", None, b"[1]", &state);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_status_and_unknown_routes() {
        let state = state();
        state.add_port(1080);
        let body = body_json(route_request(&Method::PUT, "status", None, b"", &state)).await;
        assert_eq!(body, serde_json::json!({"ports": [1080]}));

        let response = route_request(&Method::GET, "status", None, b"", &state);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
