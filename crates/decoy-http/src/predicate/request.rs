//! Request pattern matching.
//!
//! A pattern [`HttpRequest`] matches a candidate when every field it sets
//! matches. Unset fields and empty maps impose nothing. The pattern's own
//! `not` flag inverts the overall result.
//!
//! Paths may declare `{name}` placeholders; the matching segments are then
//! captured as path parameters and checked against `pathParameters`.

use super::difference::{MatchDifference, MatchField};
use crate::model::{HttpRequest, KeysToMultiValues, NottableString};
use regex::Regex;

impl HttpRequest {
    /// Whether this request, used as a pattern, matches `candidate`.
    pub fn matches(&self, candidate: &HttpRequest) -> bool {
        self.matches_with_difference(candidate, &mut MatchDifference::new())
    }

    /// Like [`HttpRequest::matches`], recording why each field failed.
    pub fn matches_with_difference(
        &self,
        candidate: &HttpRequest,
        difference: &mut MatchDifference,
    ) -> bool {
        let mut matched = self.method_matches(candidate, difference);
        matched &= self.path_matches(candidate, difference);

        if !self.query_string_parameters.matches(&candidate.query_string_parameters) {
            difference.add(
                MatchField::QueryParameters,
                format!(
                    "expected {} in {}",
                    self.query_string_parameters.to_json_string(),
                    candidate.query_string_parameters.to_json_string()
                ),
            );
            matched = false;
        }
        if !self.headers.matches(&candidate.headers) {
            difference.add(
                MatchField::Headers,
                format!(
                    "expected {} in {}",
                    self.headers.to_json_string(),
                    candidate.headers.to_json_string()
                ),
            );
            matched = false;
        }
        if !self.cookies.matches(&candidate.cookies) {
            difference.add(MatchField::Cookies, "expected cookies not present");
            matched = false;
        }
        if let Some(body) = &self.body {
            matched &= body.matches_body(candidate.body.as_ref(), difference);
        }
        if let Some(keep_alive) = self.keep_alive {
            if candidate.keep_alive != Some(keep_alive) {
                difference.add(
                    MatchField::KeepAlive,
                    format!("expected {} but was {:?}", keep_alive, candidate.keep_alive),
                );
                matched = false;
            }
        }
        if let Some(secure) = self.secure {
            if candidate.secure.unwrap_or(false) != secure {
                difference.add(
                    MatchField::Secure,
                    format!("expected {} but was {:?}", secure, candidate.secure),
                );
                matched = false;
            }
        }

        matched != self.not
    }

    /// Path parameters this pattern's `{name}` placeholders capture from `candidate`.
    pub fn capture_path_parameters(&self, candidate: &HttpRequest) -> Option<KeysToMultiValues> {
        let path = self.path.as_ref().filter(|p| !p.is_blank() && !p.is_not())?;
        PathTemplate::parse(path)?.capture(candidate.path_str())
    }

    fn method_matches(&self, candidate: &HttpRequest, difference: &mut MatchDifference) -> bool {
        let Some(method) = self.method.as_ref().filter(|m| !m.is_blank()) else {
            return true;
        };
        let actual = candidate.method_str();
        if method.matches(actual) {
            return true;
        }
        difference.add(
            MatchField::Method,
            format!("expected {} but was {}", method, actual),
        );
        false
    }

    fn path_matches(&self, candidate: &HttpRequest, difference: &mut MatchDifference) -> bool {
        let actual = candidate.path_str();
        let Some(path) = self.path.as_ref().filter(|p| !p.is_blank()) else {
            return self.path_parameters_match(&candidate.path_parameters, difference);
        };

        match PathTemplate::parse(path) {
            Some(template) => {
                let Some(captured) = template.capture(actual) else {
                    if !path.is_not() {
                        difference.add(
                            MatchField::Path,
                            format!("expected {} but was {}", path, actual),
                        );
                        return false;
                    }
                    return true;
                };
                if path.is_not() {
                    difference.add(MatchField::Path, format!("expected not {}", path.as_str()));
                    return false;
                }
                self.path_parameters_match(&captured, difference)
            }
            None => {
                if !path.matches(actual) {
                    difference.add(
                        MatchField::Path,
                        format!("expected {} but was {}", path, actual),
                    );
                    return false;
                }
                self.path_parameters_match(&candidate.path_parameters, difference)
            }
        }
    }

    fn path_parameters_match(
        &self,
        candidate: &KeysToMultiValues,
        difference: &mut MatchDifference,
    ) -> bool {
        if self.path_parameters.matches(candidate) {
            return true;
        }
        difference.add(
            MatchField::PathParameters,
            format!(
                "expected {} in {}",
                self.path_parameters.to_json_string(),
                candidate.to_json_string()
            ),
        );
        false
    }
}

/// Path with `{name}` placeholders compiled to a regex.
struct PathTemplate {
    regex: Regex,
    names: Vec<String>,
}

impl PathTemplate {
    fn parse(path: &NottableString) -> Option<Self> {
        let raw = path.value()?;
        if !raw.contains('{') {
            return None;
        }
        let mut names = Vec::new();
        let mut pattern = String::from("^");
        let mut rest = raw;
        while let Some(open) = rest.find('{') {
            let close = rest[open..].find('}')? + open;
            let name = &rest[open + 1..close];
            if !is_parameter_name(name) {
                return None;
            }
            pattern.push_str(&regex::escape(&rest[..open]));
            pattern.push_str("([^/]+)");
            names.push(name.to_string());
            rest = &rest[close + 1..];
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');
        Regex::new(&pattern)
            .ok()
            .map(|regex| PathTemplate { regex, names })
    }

    fn capture(&self, path: &str) -> Option<KeysToMultiValues> {
        let captures = self.regex.captures(path)?;
        let mut parameters = KeysToMultiValues::new();
        for (index, name) in self.names.iter().enumerate() {
            if let Some(value) = captures.get(index + 1) {
                let decoded = urlencoding::decode(value.as_str())
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| value.as_str().to_string());
                parameters.add_values(
                    NottableString::string(name.clone()),
                    vec![NottableString::string(decoded)],
                );
            }
        }
        Some(parameters)
    }
}

/// `{2}` and `{1,3}` stay regex quantifiers.
fn is_parameter_name(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Body, KeyMatchStyle};

    fn inbound() -> HttpRequest {
        HttpRequest::new()
            .with_method("GET")
            .with_path("/orders/42")
            .with_header("X-Key", ["secret"])
            .with_header("Accept", ["application/json", "text/plain"])
            .with_query_parameter("page", ["1"])
            .with_cookie("session", "abc")
            .with_keep_alive(true)
            .with_secure(false)
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        assert!(HttpRequest::new().matches(&inbound()));
    }

    #[test]
    fn test_method_and_path() {
        let pattern = HttpRequest::new().with_method("GET").with_path("/orders/\\d+");
        assert!(pattern.matches(&inbound()));

        let pattern = HttpRequest::new().with_method("POST");
        let mut difference = MatchDifference::new();
        assert!(!pattern.matches_with_difference(&inbound(), &mut difference));
        assert_eq!(difference.reasons(MatchField::Method).len(), 1);
    }

    #[test]
    fn test_negated_method() {
        let pattern = HttpRequest::new().with_method(NottableString::not("POST"));
        assert!(pattern.matches(&inbound()));
    }

    #[test]
    fn test_headers_case_insensitive_and_negated() {
        let pattern = HttpRequest::new().with_header("x-key", ["secret"]);
        assert!(pattern.matches(&inbound()));

        let pattern = HttpRequest::new().with_header("X-Key", ["other"]);
        assert!(!pattern.matches(&inbound()));

        let pattern = HttpRequest::new().with_header(NottableString::not("X-Missing"), ["x"]);
        assert!(pattern.matches(&inbound()));
    }

    #[test]
    fn test_matching_key_style() {
        let mut pattern = HttpRequest::new();
        pattern.headers = KeysToMultiValues::new()
            .with_key_match_style(KeyMatchStyle::MatchingKey)
            .with_entry("Accept", ["application/.*"]);
        assert!(!pattern.matches(&inbound()));

        pattern.headers = KeysToMultiValues::new()
            .with_key_match_style(KeyMatchStyle::MatchingKey)
            .with_entry("Accept", ["application/json", "text/.*"]);
        assert!(pattern.matches(&inbound()));
    }

    #[test]
    fn test_path_parameters_from_template() {
        let pattern = HttpRequest::new()
            .with_path("/orders/{orderId}")
            .with_path_parameter("orderId", ["[0-9]+"]);
        assert!(pattern.matches(&inbound()));

        let pattern = HttpRequest::new()
            .with_path("/orders/{orderId}")
            .with_path_parameter("orderId", ["7"]);
        let mut difference = MatchDifference::new();
        assert!(!pattern.matches_with_difference(&inbound(), &mut difference));
        assert!(!difference.reasons(MatchField::PathParameters).is_empty());

        assert!(!HttpRequest::new()
            .with_path("/customers/{id}")
            .matches(&inbound()));
        assert!(HttpRequest::new().with_path("/orders/\\d{2}").matches(&inbound()));
    }

    #[test]
    fn test_capture_path_parameters() {
        let captured = HttpRequest::new()
            .with_path("/orders/{orderId}")
            .capture_path_parameters(&inbound())
            .unwrap();
        assert_eq!(captured.get_first_value("orderId"), Some("42"));
        assert!(HttpRequest::new()
            .with_path("/orders/\\d+")
            .capture_path_parameters(&inbound())
            .is_none());
    }

    #[test]
    fn test_cookies_query_keep_alive_secure() {
        assert!(HttpRequest::new().with_cookie("session", "abc").matches(&inbound()));
        assert!(!HttpRequest::new().with_cookie("session", "xyz").matches(&inbound()));
        assert!(!HttpRequest::new().with_query_parameter("page", ["2"]).matches(&inbound()));
        assert!(!HttpRequest::new().with_keep_alive(false).matches(&inbound()));
        assert!(!HttpRequest::new().with_secure(true).matches(&inbound()));
    }

    #[test]
    fn test_body() {
        let candidate = HttpRequest::new().with_body(Body::json(r#"{"id": 1, "extra": true}"#));
        assert!(HttpRequest::new()
            .with_body(Body::json(r#"{"id": 1}"#))
            .matches(&candidate));
        assert!(!HttpRequest::new()
            .with_body(Body::string("x"))
            .matches(&HttpRequest::new()));
    }

    #[test]
    fn test_not_inverts_whole_pattern() {
        let mut pattern = HttpRequest::new().with_path("/orders/42");
        pattern.not = true;
        assert!(!pattern.matches(&inbound()));
        assert!(pattern.matches(&HttpRequest::new().with_path("/other")));
    }
}
