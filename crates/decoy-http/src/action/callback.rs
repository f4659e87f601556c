//! Registry of in-process callbacks.
//!
//! Class callbacks are looked up by the `callbackClass` name of an expectation;
//! object callbacks by the `clientId` of the client that registered them.

use crate::model::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CallbackError(pub String);

/// Produces the response for a matched request.
#[async_trait]
pub trait ResponseCallback: Send + Sync {
    async fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, CallbackError>;
}

/// Rewrites a matched request before it is forwarded, and optionally the
/// upstream response afterwards.
#[async_trait]
pub trait ForwardCallback: Send + Sync {
    async fn handle(&self, request: &HttpRequest) -> Result<HttpRequest, CallbackError>;

    async fn handle_response(
        &self,
        _request: &HttpRequest,
        response: HttpResponse,
    ) -> Result<HttpResponse, CallbackError> {
        Ok(response)
    }
}

#[derive(Default)]
pub struct CallbackRegistry {
    response_classes: RwLock<HashMap<String, Arc<dyn ResponseCallback>>>,
    forward_classes: RwLock<HashMap<String, Arc<dyn ForwardCallback>>>,
    response_objects: RwLock<HashMap<String, Arc<dyn ResponseCallback>>>,
    forward_objects: RwLock<HashMap<String, Arc<dyn ForwardCallback>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_response_class(
        &self,
        name: impl Into<String>,
        callback: Arc<dyn ResponseCallback>,
    ) {
        let name = name.into();
        info!("Registered response callback class {}", name);
        self.response_classes.write().insert(name, callback);
    }

    pub fn register_forward_class(&self, name: impl Into<String>, callback: Arc<dyn ForwardCallback>) {
        let name = name.into();
        info!("Registered forward callback class {}", name);
        self.forward_classes.write().insert(name, callback);
    }

    pub fn register_response_object(
        &self,
        client_id: impl Into<String>,
        callback: Arc<dyn ResponseCallback>,
    ) {
        let client_id = client_id.into();
        info!("Registered response callback for client {}", client_id);
        self.response_objects.write().insert(client_id, callback);
    }

    pub fn register_forward_object(
        &self,
        client_id: impl Into<String>,
        callback: Arc<dyn ForwardCallback>,
    ) {
        let client_id = client_id.into();
        info!("Registered forward callback for client {}", client_id);
        self.forward_objects.write().insert(client_id, callback);
    }

    /// Drop every callback registered by `client_id`.
    pub fn remove_client(&self, client_id: &str) {
        self.response_objects.write().remove(client_id);
        self.forward_objects.write().remove(client_id);
    }

    pub fn response_class(&self, name: &str) -> Option<Arc<dyn ResponseCallback>> {
        self.response_classes.read().get(name).cloned()
    }

    pub fn forward_class(&self, name: &str) -> Option<Arc<dyn ForwardCallback>> {
        self.forward_classes.read().get(name).cloned()
    }

    pub fn response_object(&self, client_id: &str) -> Option<Arc<dyn ResponseCallback>> {
        self.response_objects.read().get(client_id).cloned()
    }

    pub fn forward_object(&self, client_id: &str) -> Option<Arc<dyn ForwardCallback>> {
        self.forward_objects.read().get(client_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ResponseCallback for Echo {
        async fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, CallbackError> {
            Ok(HttpResponse::new().with_header("X-Path", [request.path_str()]))
        }
    }

    #[tokio::test]
    async fn test_class_and_object_lookup() {
        let registry = CallbackRegistry::new();
        registry.register_response_class("com.example.Echo", Arc::new(Echo));
        registry.register_response_object("client-1", Arc::new(Echo));

        let callback = registry.response_class("com.example.Echo").unwrap();
        let response = callback
            .handle(&HttpRequest::new().with_path("/x"))
            .await
            .unwrap();
        assert_eq!(response.get_first_header("x-path"), Some("/x"));

        assert!(registry.response_object("client-1").is_some());
        registry.remove_client("client-1");
        assert!(registry.response_object("client-1").is_none());
        assert!(registry.forward_class("missing").is_none());
    }
}
