//! Actions performed when an expectation matches.

use super::modifier::{HttpRequestModifier, HttpResponseModifier};
use super::request::HttpRequest;
use super::response::HttpResponse;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

// ============================================================================
// Delay and connection shaping
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn to_duration(self, value: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(value),
            TimeUnit::Microseconds => Duration::from_micros(value),
            TimeUnit::Milliseconds => Duration::from_millis(value),
            TimeUnit::Seconds => Duration::from_secs(value),
            TimeUnit::Minutes => Duration::from_secs(value.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(value.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(value.saturating_mul(86_400)),
        }
    }
}

/// A wait applied before an action produces its result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delay {
    #[serde(default)]
    pub time_unit: TimeUnit,
    #[serde(default)]
    pub value: u64,
}

impl Delay {
    pub fn new(time_unit: TimeUnit, value: u64) -> Self {
        Self { time_unit, value }
    }

    pub fn milliseconds(value: u64) -> Self {
        Self::new(TimeUnit::Milliseconds, value)
    }

    pub fn as_duration(&self) -> Duration {
        self.time_unit.to_duration(self.value)
    }
}

/// Low-level control over how a response is written to the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_content_length_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_length_header_override: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suppress_connection_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive_override: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_socket: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_socket_delay: Option<Delay>,
}

// ============================================================================
// Action payloads
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Forward the matched request to another host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpForward {
    pub host: String,
    #[serde(default = "default_forward_port")]
    pub port: u16,
    #[serde(default)]
    pub scheme: Scheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

fn default_forward_port() -> u16 {
    80
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateType {
    Mustache,
    Velocity,
    Javascript,
}

/// Build a response or forwarded request by rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpTemplate {
    pub template_type: TemplateType,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

/// Callback resolved by name from the callback registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClassCallback {
    pub callback_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

/// Callback resolved by the id of the client that registered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpObjectCallback {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_callback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

/// Forward the matched request after overlaying and modifying it, then
/// overlay and modify the upstream response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpOverrideForwardedRequest {
    #[serde(default, alias = "httpRequest", skip_serializing_if = "Option::is_none")]
    pub request_override: Option<HttpRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_modifier: Option<HttpRequestModifier>,
    #[serde(default, alias = "httpResponse", skip_serializing_if = "Option::is_none")]
    pub response_override: Option<HttpResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_modifier: Option<HttpResponseModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

/// Break the connection instead of responding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_connection: Option<bool>,
    /// Raw bytes written to the socket before closing; base64 on the wire
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub response_bytes: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

fn serialize_base64<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(b) => serializer.serialize_str(&BASE64.encode(b)),
        None => serializer.serialize_none(),
    }
}

fn deserialize_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
    let encoded: Option<String> = Option::deserialize(deserializer)?;
    encoded
        .map(|s| BASE64.decode(s.as_bytes()).map_err(serde::de::Error::custom))
        .transpose()
}

/// Request fired asynchronously after a response has been sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpWebhook {
    pub http_request: HttpRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
}

// ============================================================================
// Action
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Forward,
    ForwardTemplate,
    ForwardClassCallback,
    ForwardObjectCallback,
    ForwardReplace,
    Response,
    ResponseTemplate,
    ResponseClassCallback,
    ResponseObjectCallback,
    Error,
    ResponseAndWebhooks,
}

/// Exactly one action per expectation.
#[derive(Debug, Clone)]
pub enum Action {
    Response(HttpResponse),
    ResponseTemplate(HttpTemplate),
    ResponseClassCallback(HttpClassCallback),
    ResponseObjectCallback(HttpObjectCallback),
    Forward(HttpForward),
    ForwardTemplate(HttpTemplate),
    ForwardClassCallback(HttpClassCallback),
    ForwardObjectCallback(HttpObjectCallback),
    ForwardReplace(HttpOverrideForwardedRequest),
    Error(HttpError),
    ResponseAndWebhooks {
        response: HttpResponse,
        webhooks: Vec<HttpWebhook>,
    },
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        match self {
            Action::Response(_) => ActionType::Response,
            Action::ResponseTemplate(_) => ActionType::ResponseTemplate,
            Action::ResponseClassCallback(_) => ActionType::ResponseClassCallback,
            Action::ResponseObjectCallback(_) => ActionType::ResponseObjectCallback,
            Action::Forward(_) => ActionType::Forward,
            Action::ForwardTemplate(_) => ActionType::ForwardTemplate,
            Action::ForwardClassCallback(_) => ActionType::ForwardClassCallback,
            Action::ForwardObjectCallback(_) => ActionType::ForwardObjectCallback,
            Action::ForwardReplace(_) => ActionType::ForwardReplace,
            Action::Error(_) => ActionType::Error,
            Action::ResponseAndWebhooks { .. } => ActionType::ResponseAndWebhooks,
        }
    }

    /// Delay applied before the action runs.
    pub fn delay(&self) -> Option<&Delay> {
        match self {
            Action::Response(r) => r.delay.as_ref(),
            Action::ResponseAndWebhooks { response, .. } => response.delay.as_ref(),
            Action::ResponseTemplate(t) | Action::ForwardTemplate(t) => t.delay.as_ref(),
            Action::ResponseClassCallback(c) | Action::ForwardClassCallback(c) => c.delay.as_ref(),
            Action::ResponseObjectCallback(c) | Action::ForwardObjectCallback(c) => {
                c.delay.as_ref()
            }
            Action::Forward(f) => f.delay.as_ref(),
            Action::ForwardReplace(o) => o.delay.as_ref(),
            Action::Error(e) => e.delay.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_time_unit_durations() {
        assert_eq!(Delay::new(TimeUnit::Seconds, 2).as_duration(), Duration::from_secs(2));
        assert_eq!(Delay::milliseconds(5).as_duration(), Duration::from_millis(5));
        assert_eq!(
            TimeUnit::Hours.to_duration(1),
            Duration::from_secs(3_600)
        );
    }

    #[test]
    fn test_error_bytes_are_base64() {
        let error: HttpError = serde_json::from_value(json!({
            "dropConnection": true,
            "responseBytes": "AAE="
        }))
        .unwrap();
        assert_eq!(error.response_bytes, Some(vec![0, 1]));
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"dropConnection": true, "responseBytes": "AAE="})
        );
    }

    #[test]
    fn test_forward_defaults() {
        let forward: HttpForward = serde_json::from_value(json!({"host": "example.com"})).unwrap();
        assert_eq!(forward.port, 80);
        assert_eq!(forward.scheme, Scheme::Http);
    }

    #[test]
    fn test_action_delay() {
        let action = Action::Forward(HttpForward {
            host: "localhost".to_string(),
            port: 8080,
            scheme: Scheme::Http,
            delay: Some(Delay::milliseconds(10)),
        });
        assert_eq!(action.action_type(), ActionType::Forward);
        assert_eq!(action.delay(), Some(&Delay::milliseconds(10)));
        assert!(Action::Error(HttpError::default()).delay().is_none());
    }
}
