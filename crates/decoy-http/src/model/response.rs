//! HTTP responses returned by `httpResponse` actions and received from forwards.

use super::action::{ConnectionOptions, Delay};
use super::body::Body;
use super::multimap::{KeysAndValues, KeysToMultiValues};
use super::nottable::NottableString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_phrase: Option<String>,
    #[serde(default, skip_serializing_if = "KeysToMultiValues::is_empty")]
    pub headers: KeysToMultiValues,
    #[serde(default, skip_serializing_if = "KeysAndValues::is_empty")]
    pub cookies: KeysAndValues,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Delay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_options: Option<ConnectionOptions>,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn not_found() -> Self {
        Self::new().with_status_code(404)
    }

    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_reason_phrase(mut self, reason_phrase: impl Into<String>) -> Self {
        self.reason_phrase = Some(reason_phrase.into());
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

    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection_options = Some(options);
        self
    }

    /// Status to send, defaulting to 200.
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(200)
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

    /// Overlay every field present on `overrides` onto a copy of this response.
    pub fn update(&self, overrides: &HttpResponse) -> HttpResponse {
        let mut updated = self.clone();
        if overrides.status_code.is_some() {
            updated.status_code = overrides.status_code;
        }
        if overrides.reason_phrase.is_some() {
            updated.reason_phrase = overrides.reason_phrase.clone();
        }
        for entry in overrides.headers.entries() {
            updated
                .headers
                .replace_entry(entry.name.clone(), entry.values.clone());
        }
        for entry in overrides.cookies.entries() {
            updated.cookies.put(entry.name.clone(), entry.value.clone());
        }
        if overrides.body.is_some() {
            updated.body = overrides.body.clone();
        }
        if overrides.delay.is_some() {
            updated.delay = overrides.delay.clone();
        }
        if overrides.connection_options.is_some() {
            updated.connection_options = overrides.connection_options.clone();
        }
        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeUnit;
    use serde_json::json;

    #[test]
    fn test_wire_form() {
        let response: HttpResponse = serde_json::from_value(json!({
            "statusCode": 201,
            "headers": {"Location": ["/orders/1"]},
            "body": "created",
            "delay": {"timeUnit": "MILLISECONDS", "value": 50},
            "connectionOptions": {"closeSocket": true}
        }))
        .unwrap();
        assert_eq!(response.status(), 201);
        assert_eq!(response.get_first_header("location"), Some("/orders/1"));
        assert_eq!(
            response.delay.as_ref().map(|d| d.time_unit),
            Some(TimeUnit::Milliseconds)
        );
        assert_eq!(
            response.connection_options.and_then(|o| o.close_socket),
            Some(true)
        );
    }

    #[test]
    fn test_default_status() {
        assert_eq!(HttpResponse::new().status(), 200);
        assert_eq!(HttpResponse::not_found().status(), 404);
    }

    #[test]
    fn test_update() {
        let forwarded = HttpResponse::new()
            .with_status_code(200)
            .with_header("Server", ["upstream"])
            .with_body(Body::string("upstream body"));
        let overrides = HttpResponse::new()
            .with_header("server", ["decoy"])
            .with_header("X-Extra", ["1"]);

        let updated = forwarded.update(&overrides);
        assert_eq!(updated.status(), 200);
        assert_eq!(updated.headers.get_values("Server"), vec!["decoy"]);
        assert_eq!(updated.headers.get_values("x-extra"), vec!["1"]);
        assert_eq!(updated.body.unwrap().to_text(), "upstream body");
    }
}
