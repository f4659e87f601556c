//! HTTP requests, used both as inbound requests and as request patterns.
//!
//! As a pattern every field is optional: an absent method, path or body matches
//! anything, and empty maps impose no constraint.

use super::body::Body;
use super::multimap::{KeysAndValues, KeysToMultiValues};
use super::nottable::NottableString;
use super::{is_false, Scheme};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Destination of a request, independent of its `Host` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketAddress {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub scheme: Scheme,
}

fn default_port() -> u16 {
    80
}

impl SocketAddress {
    pub fn new(host: impl Into<String>, port: u16, scheme: Scheme) -> Self {
        Self {
            host: host.into(),
            port,
            scheme,
        }
    }
}

impl fmt::Display for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<NottableString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<NottableString>,
    #[serde(default, skip_serializing_if = "KeysToMultiValues::is_empty")]
    pub path_parameters: KeysToMultiValues,
    #[serde(default, skip_serializing_if = "KeysToMultiValues::is_empty")]
    pub query_string_parameters: KeysToMultiValues,
    #[serde(default, skip_serializing_if = "KeysToMultiValues::is_empty")]
    pub headers: KeysToMultiValues,
    #[serde(default, skip_serializing_if = "KeysAndValues::is_empty")]
    pub cookies: KeysAndValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_alive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_address: Option<SocketAddress>,
    /// Negates the whole pattern
    #[serde(default, skip_serializing_if = "is_false")]
    pub not: bool,
}

impl HttpRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl Into<NottableString>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<NottableString>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_header(
        mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = impl Into<NottableString>>,
    ) -> Self {
        self.headers = self.headers.with_entry(name, values);
        self
    }

    pub fn with_query_parameter(
        mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = impl Into<NottableString>>,
    ) -> Self {
        self.query_string_parameters = self.query_string_parameters.with_entry(name, values);
        self
    }

    pub fn with_path_parameter(
        mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = impl Into<NottableString>>,
    ) -> Self {
        self.path_parameters = self.path_parameters.with_entry(name, values);
        self
    }

    pub fn with_cookie(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        self.cookies = self.cookies.with_entry(name, value);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    pub fn with_socket_address(mut self, address: SocketAddress) -> Self {
        self.socket_address = Some(address);
        self
    }

    /// Method as sent, defaulting to `GET`.
    pub fn method_str(&self) -> &str {
        self.method
            .as_ref()
            .and_then(NottableString::value)
            .unwrap_or("GET")
    }

    /// Path as sent, defaulting to `/`.
    pub fn path_str(&self) -> &str {
        self.path
            .as_ref()
            .and_then(NottableString::value)
            .filter(|p| !p.is_empty())
            .unwrap_or("/")
    }

    pub fn get_first_header(&self, name: &str) -> Option<&str> {
        self.headers.get_first_value(name)
    }

    pub fn replace_header(
        &mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = impl Into<NottableString>>,
    ) {
        self.headers.replace_entry(name, values);
    }

    pub fn remove_header(&mut self, name: &str) -> bool {
        self.headers.remove(name)
    }

    /// Encoded query string without the leading `?`.
    pub fn query_string(&self) -> String {
        let mut pairs = Vec::new();
        for entry in self.query_string_parameters.entries() {
            for value in &entry.values {
                pairs.push(format!(
                    "{}={}",
                    urlencoding::encode(entry.name.as_str()),
                    urlencoding::encode(value.as_str())
                ));
            }
        }
        pairs.join("&")
    }

    /// Path followed by the query string, if any.
    pub fn path_and_query(&self) -> String {
        let query = self.query_string();
        if query.is_empty() {
            self.path_str().to_string()
        } else {
            format!("{}?{}", self.path_str(), query)
        }
    }

    /// Overlay every field present on `overrides` onto a copy of this request.
    ///
    /// Scalars and the body are replaced; headers, cookies and parameters are
    /// replaced name by name so untouched names survive.
    pub fn update(&self, overrides: &HttpRequest) -> HttpRequest {
        let mut updated = self.clone();
        if let Some(method) = overrides.method.as_ref().filter(|m| !m.is_blank()) {
            updated.method = Some(method.clone());
        }
        if let Some(path) = overrides.path.as_ref().filter(|p| !p.is_blank()) {
            updated.path = Some(path.clone());
        }
        for entry in overrides.headers.entries() {
            updated
                .headers
                .replace_entry(entry.name.clone(), entry.values.clone());
        }
        for entry in overrides.query_string_parameters.entries() {
            updated
                .query_string_parameters
                .replace_entry(entry.name.clone(), entry.values.clone());
        }
        for entry in overrides.path_parameters.entries() {
            updated
                .path_parameters
                .replace_entry(entry.name.clone(), entry.values.clone());
        }
        for entry in overrides.cookies.entries() {
            updated.cookies.put(entry.name.clone(), entry.value.clone());
        }
        if let Some(body) = &overrides.body {
            updated.body = Some(body.clone());
        }
        if overrides.keep_alive.is_some() {
            updated.keep_alive = overrides.keep_alive;
        }
        if overrides.secure.is_some() {
            updated.secure = overrides.secure;
        }
        if overrides.socket_address.is_some() {
            updated.socket_address = overrides.socket_address.clone();
        }
        updated
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method_str(), self.path_and_query())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_round_trip() {
        let request: HttpRequest = serde_json::from_value(json!({
            "method": "GET",
            "path": "/orders",
            "headers": {"X-Key": ["secret"]},
            "queryStringParameters": [{"name": "page", "values": ["1"]}],
            "cookies": {"session": "abc"}
        }))
        .unwrap();
        assert_eq!(request.method_str(), "GET");
        assert_eq!(request.get_first_header("x-key"), Some("secret"));
        assert_eq!(request.path_and_query(), "/orders?page=1");

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "method": "GET",
                "path": "/orders",
                "headers": {"X-Key": ["secret"]},
                "queryStringParameters": {"page": ["1"]},
                "cookies": {"session": "abc"}
            })
        );
    }

    #[test]
    fn test_defaults() {
        let request = HttpRequest::new();
        assert_eq!(request.method_str(), "GET");
        assert_eq!(request.path_str(), "/");
        assert_eq!(request.to_string(), "GET /");
    }

    #[test]
    fn test_update_overlays_present_fields() {
        let original = HttpRequest::new()
            .with_method("GET")
            .with_path("/a")
            .with_header("Accept", ["text/html"])
            .with_header("X-Keep", ["1"])
            .with_cookie("s", "1");
        let overrides = HttpRequest::new()
            .with_path("/b")
            .with_header("accept", ["application/json"])
            .with_cookie("t", "2")
            .with_body(Body::string("hi"));

        let updated = original.update(&overrides);
        assert_eq!(updated.method_str(), "GET");
        assert_eq!(updated.path_str(), "/b");
        assert_eq!(updated.headers.get_values("Accept"), vec!["application/json"]);
        assert_eq!(updated.headers.get_values("x-keep"), vec!["1"]);
        assert_eq!(updated.cookies.len(), 2);
        assert_eq!(updated.body.unwrap().to_text(), "hi");
    }

    #[test]
    fn test_header_edits() {
        let mut request = HttpRequest::new().with_header("A", ["1", "2"]);
        request.replace_header("a", ["3"]);
        assert_eq!(request.headers.get_values("A"), vec!["3"]);
        assert!(request.remove_header("A"));
        assert!(request.get_first_header("a").is_none());
    }
}
