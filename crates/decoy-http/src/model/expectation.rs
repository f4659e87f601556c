//! Expectations: a request pattern, an action and a lifecycle.
//!
//! An expectation stays [`ExpectationState::Active`] while it has remaining
//! uses and its time-to-live has not elapsed. Uses are consumed with a
//! compare-and-swap loop so concurrent matches never over-count.

use super::action::{
    Action, HttpClassCallback, HttpError, HttpForward, HttpObjectCallback,
    HttpOverrideForwardedRequest, HttpTemplate, HttpWebhook, TemplateType, TimeUnit,
};
use super::request::HttpRequest;
use super::response::HttpResponse;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

// ============================================================================
// Errors
// ============================================================================

/// Reasons an expectation is rejected at registration time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("expectation has no action, expected one of: {}", ACTION_FIELDS.join(", "))]
    MissingAction,
    #[error("expectation has more than one action: {}", .0.join(", "))]
    MultipleActions(Vec<String>),
    #[error("httpWebhooks can only be combined with httpResponse")]
    WebhooksWithoutResponse,
    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
    #[error("no template engine registered for {0:?} templates")]
    UnsupportedTemplateType(TemplateType),
    #[error("invalid expectation: {0}")]
    Invalid(String),
}

const ACTION_FIELDS: [&str; 10] = [
    "httpResponse",
    "httpResponseTemplate",
    "httpResponseClassCallback",
    "httpResponseObjectCallback",
    "httpForward",
    "httpForwardTemplate",
    "httpForwardClassCallback",
    "httpForwardObjectCallback",
    "httpOverrideForwardedRequest",
    "httpError",
];

// ============================================================================
// Lifecycle
// ============================================================================

/// How many times an expectation may be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Times {
    #[serde(default)]
    pub remaining_times: u64,
    #[serde(default)]
    pub unlimited: bool,
}

impl Default for Times {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl Times {
    pub fn unlimited() -> Self {
        Self {
            remaining_times: 0,
            unlimited: true,
        }
    }

    pub fn exactly(remaining_times: u64) -> Self {
        Self {
            remaining_times,
            unlimited: false,
        }
    }

    pub fn once() -> Self {
        Self::exactly(1)
    }
}

/// How long an expectation stays active after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeToLive {
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub time_to_live: u64,
    #[serde(default)]
    pub unlimited: bool,
}

impl Default for TimeToLive {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl TimeToLive {
    pub fn unlimited() -> Self {
        Self {
            time_unit: TimeUnit::Milliseconds,
            time_to_live: 0,
            unlimited: true,
        }
    }

    pub fn exactly(time_unit: TimeUnit, time_to_live: u64) -> Self {
        Self {
            time_unit,
            time_to_live,
            unlimited: false,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        (!self.unlimited).then(|| self.time_unit.to_duration(self.time_to_live))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectationState {
    Active,
    Retired,
}

// ============================================================================
// Expectation
// ============================================================================

#[derive(Debug)]
pub struct Expectation {
    pub id: String,
    pub priority: i32,
    pub http_request: HttpRequest,
    pub action: Action,
    times: Times,
    time_to_live: TimeToLive,
    remaining: AtomicU64,
    expires_at: Option<Instant>,
}

impl Expectation {
    pub fn new(http_request: HttpRequest, action: Action) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            priority: 0,
            http_request,
            action,
            times: Times::unlimited(),
            time_to_live: TimeToLive::unlimited(),
            remaining: AtomicU64::new(0),
            expires_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_times(mut self, times: Times) -> Self {
        self.remaining = AtomicU64::new(times.remaining_times);
        self.times = times;
        self
    }

    /// The time-to-live starts counting from this call. A deadline past the
    /// clock's range never expires.
    pub fn with_time_to_live(mut self, time_to_live: TimeToLive) -> Self {
        self.expires_at = time_to_live
            .as_duration()
            .and_then(|ttl| Instant::now().checked_add(ttl));
        self.time_to_live = time_to_live;
        self
    }

    pub fn times(&self) -> Times {
        if self.times.unlimited {
            self.times
        } else {
            Times::exactly(self.remaining.load(Ordering::SeqCst))
        }
    }

    pub fn time_to_live(&self) -> TimeToLive {
        self.time_to_live
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    pub fn state(&self) -> ExpectationState {
        let exhausted = !self.times.unlimited && self.remaining.load(Ordering::SeqCst) == 0;
        if exhausted || self.is_expired() {
            ExpectationState::Retired
        } else {
            ExpectationState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == ExpectationState::Active
    }

    /// Consume one use. Returns false when the expectation is already retired.
    pub fn try_consume(&self) -> bool {
        if self.is_expired() {
            return false;
        }
        if self.times.unlimited {
            return true;
        }
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub fn to_dto(&self) -> ExpectationDto {
        let mut dto = ExpectationDto {
            id: Some(self.id.clone()),
            priority: Some(self.priority),
            http_request: Some(self.http_request.clone()),
            times: Some(self.times()),
            time_to_live: Some(self.time_to_live),
            ..Default::default()
        };
        match &self.action {
            Action::Response(r) => dto.http_response = Some(r.clone()),
            Action::ResponseTemplate(t) => dto.http_response_template = Some(t.clone()),
            Action::ResponseClassCallback(c) => {
                dto.http_response_class_callback = Some(c.clone())
            }
            Action::ResponseObjectCallback(c) => {
                dto.http_response_object_callback = Some(c.clone())
            }
            Action::Forward(f) => dto.http_forward = Some(f.clone()),
            Action::ForwardTemplate(t) => dto.http_forward_template = Some(t.clone()),
            Action::ForwardClassCallback(c) => dto.http_forward_class_callback = Some(c.clone()),
            Action::ForwardObjectCallback(c) => {
                dto.http_forward_object_callback = Some(c.clone())
            }
            Action::ForwardReplace(o) => dto.http_override_forwarded_request = Some(o.clone()),
            Action::Error(e) => dto.http_error = Some(e.clone()),
            Action::ResponseAndWebhooks { response, webhooks } => {
                dto.http_response = Some(response.clone());
                dto.http_webhooks = webhooks.clone();
            }
        }
        dto
    }
}

// ============================================================================
// Wire form
// ============================================================================

/// JSON form of an expectation as accepted by the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectationDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_request: Option<HttpRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response: Option<HttpResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response_template: Option<HttpTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response_class_callback: Option<HttpClassCallback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response_object_callback: Option<HttpObjectCallback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_forward: Option<HttpForward>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_forward_template: Option<HttpTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_forward_class_callback: Option<HttpClassCallback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_forward_object_callback: Option<HttpObjectCallback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_override_forwarded_request: Option<HttpOverrideForwardedRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error: Option<HttpError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_webhooks: Vec<HttpWebhook>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<Times>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<TimeToLive>,
}

impl ExpectationDto {
    fn take_action(&mut self) -> Result<Action, ConfigError> {
        let mut actions: Vec<(&str, Action)> = Vec::new();
        if let Some(r) = self.http_response.take() {
            actions.push(("httpResponse", Action::Response(r)));
        }
        if let Some(t) = self.http_response_template.take() {
            actions.push(("httpResponseTemplate", Action::ResponseTemplate(t)));
        }
        if let Some(c) = self.http_response_class_callback.take() {
            actions.push(("httpResponseClassCallback", Action::ResponseClassCallback(c)));
        }
        if let Some(c) = self.http_response_object_callback.take() {
            actions.push(("httpResponseObjectCallback", Action::ResponseObjectCallback(c)));
        }
        if let Some(f) = self.http_forward.take() {
            actions.push(("httpForward", Action::Forward(f)));
        }
        if let Some(t) = self.http_forward_template.take() {
            actions.push(("httpForwardTemplate", Action::ForwardTemplate(t)));
        }
        if let Some(c) = self.http_forward_class_callback.take() {
            actions.push(("httpForwardClassCallback", Action::ForwardClassCallback(c)));
        }
        if let Some(c) = self.http_forward_object_callback.take() {
            actions.push(("httpForwardObjectCallback", Action::ForwardObjectCallback(c)));
        }
        if let Some(o) = self.http_override_forwarded_request.take() {
            actions.push(("httpOverrideForwardedRequest", Action::ForwardReplace(o)));
        }
        if let Some(e) = self.http_error.take() {
            actions.push(("httpError", Action::Error(e)));
        }

        if actions.len() > 1 {
            return Err(ConfigError::MultipleActions(
                actions.iter().map(|(name, _)| name.to_string()).collect(),
            ));
        }
        let (_, action) = actions.pop().ok_or(ConfigError::MissingAction)?;

        let webhooks = std::mem::take(&mut self.http_webhooks);
        if webhooks.is_empty() {
            return Ok(action);
        }
        match action {
            Action::Response(response) => Ok(Action::ResponseAndWebhooks { response, webhooks }),
            _ => Err(ConfigError::WebhooksWithoutResponse),
        }
    }
}

impl TryFrom<ExpectationDto> for Expectation {
    type Error = ConfigError;

    fn try_from(mut dto: ExpectationDto) -> Result<Self, Self::Error> {
        let action = dto.take_action()?;
        validate_action(&action)?;

        let mut expectation = Expectation::new(dto.http_request.unwrap_or_default(), action)
            .with_priority(dto.priority.unwrap_or(0))
            .with_times(dto.times.unwrap_or_default())
            .with_time_to_live(dto.time_to_live.unwrap_or_default());
        if let Some(id) = dto.id.filter(|id| !id.is_empty()) {
            expectation = expectation.with_id(id);
        }
        Ok(expectation)
    }
}

fn validate_action(action: &Action) -> Result<(), ConfigError> {
    let Action::ForwardReplace(replace) = action else {
        return Ok(());
    };
    let Some(path) = replace.request_modifier.as_ref().and_then(|m| m.path.as_ref()) else {
        return Ok(());
    };
    path.validate().map_err(|e| ConfigError::InvalidRegex {
        pattern: path.regex.clone(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActionType;
    use serde_json::json;
    use std::sync::Arc;

    fn parse(value: serde_json::Value) -> Result<Expectation, ConfigError> {
        let dto: ExpectationDto = serde_json::from_value(value).unwrap();
        Expectation::try_from(dto)
    }

    #[test]
    fn test_single_action() {
        let expectation = parse(json!({
            "httpRequest": {"path": "/a"},
            "httpResponse": {"statusCode": 200},
            "priority": 5
        }))
        .unwrap();
        assert_eq!(expectation.action.action_type(), ActionType::Response);
        assert_eq!(expectation.priority, 5);
        assert!(!expectation.id.is_empty());
        assert!(expectation.is_active());
    }

    #[test]
    fn test_missing_action() {
        let err = parse(json!({"httpRequest": {"path": "/a"}})).unwrap_err();
        assert_eq!(err, ConfigError::MissingAction);
    }

    #[test]
    fn test_multiple_actions() {
        let err = parse(json!({
            "httpResponse": {},
            "httpForward": {"host": "localhost"}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::MultipleActions(vec![
                "httpResponse".to_string(),
                "httpForward".to_string()
            ])
        );
    }

    #[test]
    fn test_webhooks_need_response() {
        let expectation = parse(json!({
            "httpResponse": {"statusCode": 202},
            "httpWebhooks": [{"httpRequest": {"path": "/hook"}}]
        }))
        .unwrap();
        assert_eq!(
            expectation.action.action_type(),
            ActionType::ResponseAndWebhooks
        );

        let err = parse(json!({
            "httpError": {"dropConnection": true},
            "httpWebhooks": [{"httpRequest": {"path": "/hook"}}]
        }))
        .unwrap_err();
        assert_eq!(err, ConfigError::WebhooksWithoutResponse);
    }

    #[test]
    fn test_invalid_path_modifier_rejected() {
        let err = parse(json!({
            "httpOverrideForwardedRequest": {
                "requestModifier": {"path": {"regex": "(", "substitution": "x"}}
            }
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_remaining_times_consumed_once() {
        let expectation = Expectation::new(
            HttpRequest::new(),
            Action::Response(HttpResponse::new()),
        )
        .with_times(Times::once());
        assert!(expectation.try_consume());
        assert!(!expectation.try_consume());
        assert_eq!(expectation.state(), ExpectationState::Retired);
        assert_eq!(expectation.times(), Times::exactly(0));
    }

    #[test]
    fn test_concurrent_consumption_never_over_counts() {
        let expectation = Arc::new(
            Expectation::new(HttpRequest::new(), Action::Response(HttpResponse::new()))
                .with_times(Times::exactly(50)),
        );
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let expectation = Arc::clone(&expectation);
                std::thread::spawn(move || (0..20).filter(|_| expectation.try_consume()).count())
            })
            .collect();
        let served: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(served, 50);
        assert!(!expectation.is_active());
    }

    #[test]
    fn test_time_to_live_expires() {
        let expectation = Expectation::new(
            HttpRequest::new(),
            Action::Response(HttpResponse::new()),
        )
        .with_time_to_live(TimeToLive::exactly(TimeUnit::Nanoseconds, 1));
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(expectation.state(), ExpectationState::Retired);
        assert!(!expectation.try_consume());
    }

    #[test]
    fn test_out_of_range_time_to_live_never_expires() {
        let expectation = parse(json!({
            "httpResponse": {},
            "timeToLive": {"timeUnit": "DAYS", "timeToLive": u64::MAX, "unlimited": false}
        }))
        .unwrap();
        assert!(expectation.is_active());
        assert!(expectation.try_consume());
    }

    #[test]
    fn test_dto_round_trip_keeps_action_and_times() {
        let expectation = parse(json!({
            "id": "fixed",
            "httpRequest": {"method": "GET"},
            "httpForward": {"host": "upstream", "port": 9000},
            "times": {"remainingTimes": 3}
        }))
        .unwrap();
        let value = serde_json::to_value(expectation.to_dto()).unwrap();
        assert_eq!(value["id"], "fixed");
        assert_eq!(value["httpForward"]["port"], 9000);
        assert_eq!(value["times"], json!({"remainingTimes": 3, "unlimited": false}));
        assert!(value.get("httpResponse").is_none());
    }
}
