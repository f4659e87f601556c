//! Request templating for `httpResponseTemplate` and `httpForwardTemplate`.
//!
//! The built-in engine substitutes request values into a JSON template, then
//! parses the result as a response or request.
//!
//! # Supported Template Variables
//!
//! Both `${...}` and `{{ ... }}` delimiters are accepted.
//!
//! - `request.method`, `request.path`, `request.body`
//! - `request.queryStringParameters.<name>` (alias `request.query.<name>`)
//! - `request.headers.<name>` - first value, case-insensitive
//! - `request.cookies.<name>`
//! - `request.pathParameters.<name>` (alias `request.pathParams.<name>`)
//! - `now` (RFC 3339), `now_epoch` (seconds), `uuid`
//!
//! Substituted values are JSON-string escaped, so they can sit inside quoted
//! template strings. Unknown variables render as empty strings.
//!
//! # Example
//!
//! ```text
//! {"statusCode": 200, "body": "{\"echo\": \"${request.query.message}\"}"}
//! ```

use crate::model::{HttpRequest, HttpResponse};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template did not render valid JSON: {0}")]
    InvalidOutput(#[from] serde_json::Error),
    #[error("template rendering failed: {0}")]
    Render(String),
}

/// Renders templates into responses or forwarded requests.
pub trait TemplateEngine: Send + Sync {
    fn render_response(
        &self,
        template: &str,
        request: &HttpRequest,
    ) -> Result<HttpResponse, TemplateError>;

    fn render_request(
        &self,
        template: &str,
        request: &HttpRequest,
    ) -> Result<HttpRequest, TemplateError>;
}

static TEMPLATE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn template_regex() -> Option<&'static Regex> {
    TEMPLATE_REGEX
        .get_or_init(|| {
            Regex::new(
                r"\$\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z0-9_-]+)*)\s*\}|\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z0-9_-]+)*)\s*\}\}",
            )
            .ok()
        })
        .as_ref()
}

/// Request values addressable from a template.
pub struct RequestData<'a> {
    request: &'a HttpRequest,
}

impl<'a> RequestData<'a> {
    pub fn new(request: &'a HttpRequest) -> Self {
        Self { request }
    }

    /// Resolve a dotted variable such as `request.headers.accept`.
    pub fn get(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path.splitn(3, '.').collect();
        let request = self.request;

        match parts.as_slice() {
            ["now"] => Some(chrono::Utc::now().to_rfc3339()),
            ["now_epoch"] => Some(chrono::Utc::now().timestamp().to_string()),
            ["uuid"] => Some(uuid::Uuid::new_v4().to_string()),
            ["request", "method"] => Some(request.method_str().to_string()),
            ["request", "path"] => Some(request.path_str().to_string()),
            ["request", "body"] => Some(request.body.as_ref().map(|b| b.to_text()).unwrap_or_default()),
            ["request", "queryStringParameters" | "query", name] => request
                .query_string_parameters
                .get_first_value(name)
                .map(str::to_string),
            ["request", "headers", name] => request.get_first_header(name).map(str::to_string),
            ["request", "cookies", name] => request.cookies.get_value(name).map(str::to_string),
            ["request", "pathParameters" | "pathParams", name] => request
                .path_parameters
                .get_first_value(name)
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Substitute every variable in `template`, JSON-escaping the values.
pub fn process_template(template: &str, data: &RequestData<'_>) -> String {
    let Some(regex) = template_regex() else {
        return template.to_string();
    };
    regex
        .replace_all(template, |caps: &regex::Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            json_escape(&data.get(name).unwrap_or_default())
        })
        .into_owned()
}

pub fn has_template_variables(s: &str) -> bool {
    template_regex().is_some_and(|re| re.is_match(s))
}

fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// The built-in `MUSTACHE` engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleTemplateEngine;

impl TemplateEngine for SimpleTemplateEngine {
    fn render_response(
        &self,
        template: &str,
        request: &HttpRequest,
    ) -> Result<HttpResponse, TemplateError> {
        let rendered = process_template(template, &RequestData::new(request));
        Ok(serde_json::from_str(&rendered)?)
    }

    fn render_request(
        &self,
        template: &str,
        request: &HttpRequest,
    ) -> Result<HttpRequest, TemplateError> {
        let rendered = process_template(template, &RequestData::new(request));
        Ok(serde_json::from_str(&rendered)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Body;

    fn request() -> HttpRequest {
        HttpRequest::new()
            .with_method("POST")
            .with_path("/users/123")
            .with_query_parameter("name", ["John"])
            .with_header("X-Request-Id", ["req-12345"])
            .with_cookie("session", "abc")
            .with_path_parameter("id", ["123"])
            .with_body(Body::string(r#"{"action": "test"}"#))
    }

    #[test]
    fn test_get_variables() {
        let request = request();
        let data = RequestData::new(&request);
        assert_eq!(data.get("request.method").as_deref(), Some("POST"));
        assert_eq!(data.get("request.path").as_deref(), Some("/users/123"));
        assert_eq!(data.get("request.query.name").as_deref(), Some("John"));
        assert_eq!(
            data.get("request.queryStringParameters.name").as_deref(),
            Some("John")
        );
        assert_eq!(
            data.get("request.headers.x-request-id").as_deref(),
            Some("req-12345")
        );
        assert_eq!(data.get("request.cookies.session").as_deref(), Some("abc"));
        assert_eq!(data.get("request.pathParams.id").as_deref(), Some("123"));
        assert!(data.get("request.unknown").is_none());
        assert_eq!(data.get("uuid").map(|u| u.len()), Some(36));
    }

    #[test]
    fn test_process_template_both_delimiters() {
        let request = request();
        let data = RequestData::new(&request);
        assert_eq!(
            process_template("${request.method} {{ request.path }}", &data),
            "POST /users/123"
        );
        assert_eq!(process_template("[${request.missing}]", &data), "[]");
        assert!(has_template_variables("{{ request.path }}"));
        assert!(!has_template_variables("plain"));
    }

    #[test]
    fn test_values_are_json_escaped() {
        let request = request();
        let data = RequestData::new(&request);
        assert_eq!(
            process_template("${request.body}", &data),
            r#"{\"action\": \"test\"}"#
        );
    }

    #[test]
    fn test_render_response() {
        let template = r#"{
            "statusCode": 201,
            "headers": {"X-Echo": ["${request.headers.x-request-id}"]},
            "body": "created ${request.pathParameters.id} from ${request.body}"
        }"#;
        let response = SimpleTemplateEngine
            .render_response(template, &request())
            .unwrap();
        assert_eq!(response.status(), 201);
        assert_eq!(response.get_first_header("x-echo"), Some("req-12345"));
        assert_eq!(
            response.body.unwrap().to_text(),
            r#"created 123 from {"action": "test"}"#
        );
    }

    #[test]
    fn test_render_request() {
        let template = r#"{"method": "GET", "path": "/mirror${request.path}"}"#;
        let forwarded = SimpleTemplateEngine
            .render_request(template, &request())
            .unwrap();
        assert_eq!(forwarded.path_str(), "/mirror/users/123");
    }

    #[test]
    fn test_invalid_output() {
        assert!(matches!(
            SimpleTemplateEngine.render_response("{not json", &request()),
            Err(TemplateError::InvalidOutput(_))
        ));
    }
}
