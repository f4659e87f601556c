//! State shared by every connection of a running server.

use crate::action::ActionHandler;
use crate::model::{Expectation, ExpectationDto};
use crate::store::ExpectationStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ServerState {
    pub store: ExpectationStore,
    pub actions: ActionHandler,
    ports: RwLock<Vec<u16>>,
}

impl ServerState {
    pub fn new(store: ExpectationStore, actions: ActionHandler) -> Self {
        Self {
            store,
            actions,
            ports: RwLock::new(Vec::new()),
        }
    }

    pub fn ports(&self) -> Vec<u16> {
        self.ports.read().clone()
    }

    pub(crate) fn add_port(&self, port: u16) {
        self.ports.write().push(port);
    }

    /// Validate every expectation, then store them all.
    ///
    /// Nothing is stored when any expectation is invalid; the errors name the
    /// position of each rejected expectation.
    pub fn register(
        &self,
        dtos: Vec<ExpectationDto>,
    ) -> Result<Vec<Arc<Expectation>>, Vec<String>> {
        let mut valid = Vec::with_capacity(dtos.len());
        let mut errors = Vec::new();
        for (index, dto) in dtos.into_iter().enumerate() {
            let checked = Expectation::try_from(dto)
                .and_then(|e| self.actions.validate(&e.action).map(|_| e));
            match checked {
                Ok(expectation) => valid.push(expectation),
                Err(e) => errors.push(format!("expectation {}: {}", index, e)),
            }
        }
        if !errors.is_empty() {
            warn!("Rejected {} invalid expectation(s)", errors.len());
            return Err(errors);
        }
        let stored: Vec<_> = valid.into_iter().map(|e| self.store.add(e)).collect();
        info!("Registered {} expectation(s)", stored.len());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::webhook::WebhookQueue;
    use crate::action::client::{ClientError, HttpClient};
    use crate::model::{HttpRequest, HttpResponse, SocketAddress};
    use async_trait::async_trait;

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

    fn dto(json: serde_json::Value) -> ExpectationDto {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_register_is_all_or_nothing() {
        let state = state();
        let result = state.register(vec![
            dto(serde_json::json!({"httpRequest": {"path": "/a"}, "httpResponse": {}})),
            dto(serde_json::json!({"httpRequest": {"path": "/b"}})),
        ]);
        let errors = result.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("expectation 1:"));
        assert!(state.store.is_empty());

        let stored = state
            .register(vec![dto(
                serde_json::json!({"httpRequest": {"path": "/a"}, "httpResponse": {}}),
            )])
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(state.store.len(), 1);
    }

    #[test]
    fn test_register_rejects_unsupported_template() {
        let state = state();
        let errors = state
            .register(vec![dto(serde_json::json!({
                "httpResponseTemplate": {"templateType": "VELOCITY", "template": "{}"}
            }))])
            .unwrap_err();
        assert!(errors[0].contains("Velocity"));
    }
}
