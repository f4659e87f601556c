//! Action execution for matched expectations.
//!
//! [`ActionHandler`] turns a matched expectation and the received request into
//! an [`Outcome`] for the listener to write.
//!
//! # Module Structure
//!
//! - `mod.rs` - [`ActionHandler`], [`DispatchError`], [`Outcome`]
//! - `client` - outbound HTTP client used by forwards and webhooks
//! - `template` - template engines for response and forward templates
//! - `callback` - registry of in-process class and object callbacks
//! - `webhook` - background webhook delivery queue

pub mod callback;
pub mod client;
pub mod template;
pub mod webhook;

use crate::model::{
    Action, ConfigError, Delay, Expectation, HttpOverrideForwardedRequest, HttpRequest,
    HttpResponse, SocketAddress, TemplateType,
};
use crate::server::headers::{X_ACTION_ERROR, X_FORWARD_ERROR};
use callback::{CallbackError, CallbackRegistry, ForwardCallback};
use client::{ClientError, HttpClient};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use template::{SimpleTemplateEngine, TemplateEngine, TemplateError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webhook::WebhookQueue;

/// Failures executing an action for a matched request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("forward failed: {0}")]
    Forward(#[from] ClientError),
    #[error("no {kind} callback registered for '{name}'")]
    MissingCallback { kind: &'static str, name: String },
    #[error("callback failed: {0}")]
    Callback(#[from] CallbackError),
    #[error("no template engine registered for {0:?} templates")]
    MissingTemplateEngine(TemplateType),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl DispatchError {
    /// Response written in place of the action's result.
    pub fn to_response(&self) -> HttpResponse {
        let message = self.to_string();
        match self {
            DispatchError::Forward(_) => HttpResponse::not_found()
                .with_header(X_FORWARD_ERROR.as_str(), [message]),
            _ => HttpResponse::new()
                .with_status_code(500)
                .with_header(X_ACTION_ERROR.as_str(), [message]),
        }
    }
}

/// What the listener should do with the connection.
#[derive(Debug, Clone)]
pub enum Outcome {
    Respond(HttpResponse),
    /// Close without writing a response.
    DropConnection,
    /// Write exactly these bytes, then close.
    RawBytes(Vec<u8>),
    /// The connection went away while the action was delayed.
    Cancelled,
}

/// Wait for `delay`, returning false if `cancel` fires first.
pub async fn wait(delay: &Delay, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay.as_duration()) => true,
    }
}

pub struct ActionHandler {
    client: Arc<dyn HttpClient>,
    callbacks: Arc<CallbackRegistry>,
    engines: RwLock<HashMap<TemplateType, Arc<dyn TemplateEngine>>>,
    webhooks: Arc<WebhookQueue>,
}

impl ActionHandler {
    pub fn new(client: Arc<dyn HttpClient>, webhooks: Arc<WebhookQueue>) -> Self {
        let mut engines: HashMap<TemplateType, Arc<dyn TemplateEngine>> = HashMap::new();
        engines.insert(TemplateType::Mustache, Arc::new(SimpleTemplateEngine));
        Self {
            client,
            callbacks: Arc::new(CallbackRegistry::new()),
            engines: RwLock::new(engines),
            webhooks,
        }
    }

    pub fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }

    pub fn client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    pub fn webhooks(&self) -> &Arc<WebhookQueue> {
        &self.webhooks
    }

    pub fn register_template_engine(
        &self,
        template_type: TemplateType,
        engine: Arc<dyn TemplateEngine>,
    ) {
        info!("Registered {:?} template engine", template_type);
        self.engines.write().insert(template_type, engine);
    }

    /// Reject actions that could never be executed.
    pub fn validate(&self, action: &Action) -> Result<(), ConfigError> {
        match action {
            Action::ResponseTemplate(t) | Action::ForwardTemplate(t) => {
                if self.engines.read().contains_key(&t.template_type) {
                    Ok(())
                } else {
                    Err(ConfigError::UnsupportedTemplateType(t.template_type))
                }
            }
            _ => Ok(()),
        }
    }

    /// Execute the expectation's action for `request`.
    ///
    /// The action's delay is raced against `cancel`; dispatch errors become
    /// error responses rather than failures of the connection.
    pub async fn handle(
        &self,
        expectation: &Expectation,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Outcome {
        if let Some(delay) = expectation.action.delay() {
            debug!("Delaying {:?} for expectation {}", delay, expectation.id);
            if !wait(delay, cancel).await {
                debug!("Request {} cancelled during delay", request);
                return Outcome::Cancelled;
            }
        }
        match self.resolve(&expectation.action, request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "{:?} action for expectation {} failed: {}",
                    expectation.action.action_type(),
                    expectation.id,
                    e
                );
                Outcome::Respond(e.to_response())
            }
        }
    }

    async fn resolve(&self, action: &Action, request: &HttpRequest) -> Result<Outcome, DispatchError> {
        let response = match action {
            Action::Response(response) => response.clone(),
            Action::ResponseAndWebhooks { response, webhooks } => {
                for webhook in webhooks {
                    self.webhooks.enqueue(webhook.clone());
                }
                response.clone()
            }
            Action::ResponseTemplate(t) => {
                self.engine(t.template_type)?
                    .render_response(&t.template, request)?
            }
            Action::ResponseClassCallback(c) => {
                let callback = self.callbacks.response_class(&c.callback_class).ok_or_else(|| {
                    DispatchError::MissingCallback {
                        kind: "response class",
                        name: c.callback_class.clone(),
                    }
                })?;
                callback.handle(request).await?
            }
            Action::ResponseObjectCallback(c) => {
                let callback = self.callbacks.response_object(&c.client_id).ok_or_else(|| {
                    DispatchError::MissingCallback {
                        kind: "response object",
                        name: c.client_id.clone(),
                    }
                })?;
                callback.handle(request).await?
            }
            Action::Forward(f) => {
                let target = SocketAddress::new(f.host.clone(), f.port, f.scheme);
                self.forward(request.clone(), Some(target)).await?
            }
            Action::ForwardTemplate(t) => {
                let forwarded = self
                    .engine(t.template_type)?
                    .render_request(&t.template, request)?;
                self.forward(forwarded, None).await?
            }
            Action::ForwardClassCallback(c) => {
                let callback = self.callbacks.forward_class(&c.callback_class).ok_or_else(|| {
                    DispatchError::MissingCallback {
                        kind: "forward class",
                        name: c.callback_class.clone(),
                    }
                })?;
                self.forward_with_callback(callback.as_ref(), request, true).await?
            }
            Action::ForwardObjectCallback(c) => {
                let callback = self.callbacks.forward_object(&c.client_id).ok_or_else(|| {
                    DispatchError::MissingCallback {
                        kind: "forward object",
                        name: c.client_id.clone(),
                    }
                })?;
                let with_response = c.response_callback.unwrap_or(false);
                self.forward_with_callback(callback.as_ref(), request, with_response)
                    .await?
            }
            Action::ForwardReplace(o) => self.forward_replace(o, request).await?,
            Action::Error(e) => {
                return Ok(match &e.response_bytes {
                    Some(bytes) if !e.drop_connection.unwrap_or(false) => {
                        Outcome::RawBytes(bytes.clone())
                    }
                    _ => Outcome::DropConnection,
                });
            }
        };
        Ok(Outcome::Respond(response))
    }

    fn engine(&self, template_type: TemplateType) -> Result<Arc<dyn TemplateEngine>, DispatchError> {
        self.engines
            .read()
            .get(&template_type)
            .cloned()
            .ok_or(DispatchError::MissingTemplateEngine(template_type))
    }

    async fn forward(
        &self,
        request: HttpRequest,
        target: Option<SocketAddress>,
    ) -> Result<HttpResponse, DispatchError> {
        info!("Forwarding {}", request);
        let response = self.client.send(request, target).await?;
        debug!("Forward returned {}", response.status());
        Ok(response)
    }

    async fn forward_with_callback(
        &self,
        callback: &dyn ForwardCallback,
        request: &HttpRequest,
        with_response: bool,
    ) -> Result<HttpResponse, DispatchError> {
        let forwarded = callback.handle(request).await?;
        let response = self.forward(forwarded.clone(), None).await?;
        if with_response {
            Ok(callback.handle_response(&forwarded, response).await?)
        } else {
            Ok(response)
        }
    }

    async fn forward_replace(
        &self,
        o: &HttpOverrideForwardedRequest,
        request: &HttpRequest,
    ) -> Result<HttpResponse, DispatchError> {
        // the target comes from the override, or the Host header it leaves in place
        let mut base = request.clone();
        base.socket_address = None;
        let mut forwarded = match &o.request_override {
            Some(overrides) => base.update(overrides),
            None => base,
        };
        if let Some(modifier) = &o.request_modifier {
            forwarded = modifier.apply(&forwarded);
        }
        let mut response = self.forward(forwarded, None).await?;
        if let Some(overrides) = &o.response_override {
            response = response.update(overrides);
        }
        if let Some(modifier) = &o.response_modifier {
            response = modifier.apply(&response);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Body, HttpClassCallback, HttpError, HttpForward, HttpObjectCallback, HttpRequestModifier,
        HttpResponseModifier, HttpTemplate, HttpWebhook, Modifier, Scheme,
        TimeUnit,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records forwarded requests and echoes the target and path back.
    #[derive(Default)]
    struct EchoClient {
        sent: Mutex<Vec<(HttpRequest, Option<SocketAddress>)>>,
        fail: bool,
    }

    #[async_trait]
    impl HttpClient for EchoClient {
        async fn send(
            &self,
            request: HttpRequest,
            target: Option<SocketAddress>,
        ) -> Result<HttpResponse, ClientError> {
            self.sent.lock().push((request.clone(), target.clone()));
            if self.fail {
                return Err(ClientError::Connect {
                    target: "upstream".to_string(),
                    message: "connection refused".to_string(),
                });
            }
            let target = client::resolve_target(&request, target)?;
            Ok(HttpResponse::new()
                .with_status_code(200)
                .with_header("X-Target", [target.to_string()])
                .with_header("X-Upstream", ["yes"])
                .with_body(Body::string(request.path_and_query())))
        }
    }

    fn handler(client: Arc<EchoClient>) -> ActionHandler {
        ActionHandler::new(client, Arc::new(WebhookQueue::new(8)))
    }

    fn request() -> HttpRequest {
        HttpRequest::new()
            .with_method("GET")
            .with_path("/orders/7")
            .with_header("Host", ["mock.local:1080"])
            .with_socket_address(SocketAddress::new("mock.local", 1080, Scheme::Http))
    }

    async fn respond(handler: &ActionHandler, action: Action) -> HttpResponse {
        let expectation = Expectation::new(HttpRequest::new(), action);
        match handler
            .handle(&expectation, &request(), &CancellationToken::new())
            .await
        {
            Outcome::Respond(response) => response,
            other => panic!("expected a response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_static_response() {
        let handler = handler(Arc::new(EchoClient::default()));
        let response = respond(
            &handler,
            Action::Response(HttpResponse::new().with_status_code(202)),
        )
        .await;
        assert_eq!(response.status(), 202);
    }

    #[tokio::test]
    async fn test_forward_uses_explicit_target() {
        let client = Arc::new(EchoClient::default());
        let handler = handler(client.clone());
        let response = respond(
            &handler,
            Action::Forward(HttpForward {
                host: "upstream".to_string(),
                port: 8080,
                scheme: Scheme::Http,
                delay: None,
            }),
        )
        .await;
        assert_eq!(response.get_first_header("x-target"), Some("http://upstream:8080"));
        assert_eq!(client.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_forward_failure_is_404_with_reason() {
        let client = Arc::new(EchoClient {
            fail: true,
            ..Default::default()
        });
        let handler = handler(client);
        let response = respond(
            &handler,
            Action::Forward(HttpForward {
                host: "down".to_string(),
                port: 1,
                scheme: Scheme::Http,
                delay: None,
            }),
        )
        .await;
        assert_eq!(response.status(), 404);
        assert!(response
            .get_first_header(X_FORWARD_ERROR.as_str())
            .is_some_and(|r| r.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_forward_replace_applies_overrides_and_modifiers() {
        let client = Arc::new(EchoClient::default());
        let handler = handler(client.clone());
        let action = Action::ForwardReplace(HttpOverrideForwardedRequest {
            request_override: Some(
                HttpRequest::new()
                    .with_header("Host", ["backend:9000"])
                    .with_header("X-Added", ["1"]),
            ),
            request_modifier: Some(HttpRequestModifier {
                path: Some(crate::model::PathModifier {
                    regex: "^/orders".to_string(),
                    substitution: "/api/orders".to_string(),
                }),
                ..Default::default()
            }),
            response_override: Some(HttpResponse::new().with_status_code(203)),
            response_modifier: Some(HttpResponseModifier {
                headers: Some(Modifier {
                    remove: vec!["X-Upstream".to_string()],
                    ..Default::default()
                }),
                ..Default::default()
            }),
            delay: None,
        });
        let response = respond(&handler, action).await;

        let sent = client.sent.lock();
        let (forwarded, target) = &sent[0];
        assert!(target.is_none());
        assert_eq!(forwarded.path_str(), "/api/orders/7");
        assert_eq!(forwarded.get_first_header("x-added"), Some("1"));
        assert_eq!(response.get_first_header("x-target"), Some("http://backend:9000"));
        assert_eq!(response.status(), 203);
        assert!(response.get_first_header("x-upstream").is_none());
        assert_eq!(response.body.unwrap().to_text(), "/api/orders/7");
    }

    #[tokio::test]
    async fn test_response_template() {
        let handler = handler(Arc::new(EchoClient::default()));
        let response = respond(
            &handler,
            Action::ResponseTemplate(HttpTemplate {
                template_type: TemplateType::Mustache,
                template: r#"{"statusCode": 200, "body": "path=${request.path}"}"#.to_string(),
                delay: None,
            }),
        )
        .await;
        assert_eq!(response.body.unwrap().to_text(), "path=/orders/7");
    }

    #[tokio::test]
    async fn test_validate_rejects_unregistered_template_type() {
        let handler = handler(Arc::new(EchoClient::default()));
        let action = Action::ResponseTemplate(HttpTemplate {
            template_type: TemplateType::Velocity,
            template: "{}".to_string(),
            delay: None,
        });
        assert_eq!(
            handler.validate(&action),
            Err(ConfigError::UnsupportedTemplateType(TemplateType::Velocity))
        );
        handler.register_template_engine(TemplateType::Velocity, Arc::new(SimpleTemplateEngine));
        assert!(handler.validate(&action).is_ok());
    }

    #[tokio::test]
    async fn test_missing_callback_is_500() {
        let handler = handler(Arc::new(EchoClient::default()));
        let response = respond(
            &handler,
            Action::ResponseClassCallback(HttpClassCallback {
                callback_class: "com.example.Missing".to_string(),
                delay: None,
            }),
        )
        .await;
        assert_eq!(response.status(), 500);
        assert!(response.get_first_header(X_ACTION_ERROR.as_str()).is_some());
    }

    struct Rewrite;

    #[async_trait]
    impl ForwardCallback for Rewrite {
        async fn handle(&self, request: &HttpRequest) -> Result<HttpRequest, CallbackError> {
            Ok(request
                .clone()
                .with_path("/rewritten")
                .with_socket_address(SocketAddress::new("backend", 9000, Scheme::Http)))
        }

        async fn handle_response(
            &self,
            _request: &HttpRequest,
            response: HttpResponse,
        ) -> Result<HttpResponse, CallbackError> {
            Ok(response.with_header("X-Callback", ["seen"]))
        }
    }

    #[tokio::test]
    async fn test_forward_object_callback_response_flag() {
        let handler = handler(Arc::new(EchoClient::default()));
        handler.callbacks().register_forward_object("client-1", Arc::new(Rewrite));

        let action = |response_callback| {
            Action::ForwardObjectCallback(HttpObjectCallback {
                client_id: "client-1".to_string(),
                response_callback,
                delay: None,
            })
        };
        let response = respond(&handler, action(Some(true))).await;
        assert_eq!(response.body.as_ref().unwrap().to_text(), "/rewritten");
        assert_eq!(response.get_first_header("x-callback"), Some("seen"));

        let response = respond(&handler, action(None)).await;
        assert!(response.get_first_header("x-callback").is_none());
    }

    #[tokio::test]
    async fn test_error_action_outcomes() {
        let handler = handler(Arc::new(EchoClient::default()));
        let run = |error: HttpError| {
            let expectation = Expectation::new(HttpRequest::new(), Action::Error(error));
            let handler = &handler;
            async move {
                handler
                    .handle(&expectation, &request(), &CancellationToken::new())
                    .await
            }
        };
        assert!(matches!(
            run(HttpError {
                drop_connection: Some(true),
                ..Default::default()
            })
            .await,
            Outcome::DropConnection
        ));
        match run(HttpError {
            response_bytes: Some(b"garbage".to_vec()),
            ..Default::default()
        })
        .await
        {
            Outcome::RawBytes(bytes) => assert_eq!(bytes, b"garbage"),
            other => panic!("expected raw bytes, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delay_is_cancellable() {
        let handler = handler(Arc::new(EchoClient::default()));
        let expectation = Expectation::new(
            HttpRequest::new(),
            Action::Response(HttpResponse::new().with_delay(Delay::new(TimeUnit::Hours, 1))),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            handler.handle(&expectation, &request(), &cancel).await,
            Outcome::Cancelled
        ));
    }

    #[tokio::test]
    async fn test_webhooks_enqueued_with_response() {
        let client = Arc::new(EchoClient::default());
        let queue = Arc::new(WebhookQueue::new(8));
        queue.start(client.clone());
        let handler = ActionHandler::new(client.clone(), queue.clone());

        let response = respond(
            &handler,
            Action::ResponseAndWebhooks {
                response: HttpResponse::new().with_status_code(200),
                webhooks: vec![HttpWebhook {
                    http_request: HttpRequest::new()
                        .with_path("/hook")
                        .with_header("Host", ["hooks.local"]),
                    delay: None,
                }],
            },
        )
        .await;
        assert_eq!(response.status(), 200);

        for _ in 0..50 {
            if !client.sent.lock().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(client.sent.lock()[0].0.path_str(), "/hook");
        queue.shutdown().await;
    }
}
