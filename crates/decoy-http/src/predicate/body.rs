//! Body matching.
//!
//! Every variant shares one contract: decode the candidate, evaluate, then
//! flip the result when the pattern is negated. Evaluation errors are
//! non-matches and end up in the [`MatchDifference`].

use super::difference::{MatchDifference, MatchField};
use super::json::json_matches;
use super::xml::{xml_matches, xpath_matches};
use crate::model::{parse_form_parameters, Body, Charset, MediaType, DEFAULT_HTTP_CHARSET};
use serde_json::Value;

impl Body {
    /// Match raw candidate bytes as received with `candidate_content_type`.
    ///
    /// Text is decoded with this body's own charset, then the candidate's
    /// declared charset, then the variant default (ISO-8859-1 for STRING,
    /// UTF-8 otherwise).
    pub fn matches(
        &self,
        candidate_bytes: &[u8],
        candidate_content_type: Option<&str>,
        difference: &mut MatchDifference,
    ) -> bool {
        let fallback = match self {
            Body::String(_) => DEFAULT_HTTP_CHARSET,
            _ => Charset::Utf8,
        };
        let charset = self
            .content_type()
            .and_then(MediaType::charset)
            .or_else(|| {
                candidate_content_type
                    .and_then(MediaType::parse)
                    .and_then(|m| m.charset())
            })
            .unwrap_or(fallback);
        let text = charset.decode(candidate_bytes);
        self.matches_decoded(&text, candidate_bytes, difference)
    }

    /// Match a body already typed from an inbound request.
    pub fn matches_body(&self, candidate: Option<&Body>, difference: &mut MatchDifference) -> bool {
        match candidate {
            Some(candidate) => {
                let bytes = candidate.raw_bytes();
                self.matches_decoded(&candidate.to_text(), &bytes, difference)
            }
            None => self.matches_decoded("", &[], difference),
        }
    }

    fn matches_decoded(&self, text: &str, bytes: &[u8], difference: &mut MatchDifference) -> bool {
        let mut reasons = Vec::new();
        let matched = match self {
            Body::String(b) => {
                if b.sub_string {
                    text.contains(b.value.as_str())
                } else {
                    text == b.value
                }
            }
            Body::Json(b) => match &b.parsed {
                Some(expected) => match serde_json::from_str::<Value>(text) {
                    Ok(actual) => json_matches(expected, &actual, b.match_type, &mut reasons),
                    Err(e) => {
                        reasons.push(format!("failed to parse JSON body: {}", e));
                        false
                    }
                },
                None => {
                    difference.add(MatchField::Body, "JSON pattern is not valid JSON");
                    return false;
                }
            },
            Body::JsonSchema(b) => match serde_json::from_str::<Value>(text) {
                Ok(actual) => {
                    let violations = b.validator.validate(&actual);
                    reasons.extend(violations.iter().map(|v| format!("{}: {}", v.path, v.message)));
                    violations.is_empty()
                }
                Err(e) => {
                    reasons.push(format!("failed to parse JSON body: {}", e));
                    false
                }
            },
            Body::JsonPath(b) => match serde_json::from_str::<Value>(text) {
                Ok(actual) => !b.compiled.query(&actual).is_empty(),
                Err(e) => {
                    reasons.push(format!("failed to parse JSON body: {}", e));
                    false
                }
            },
            Body::Regex(b) => b.regex.is_match(text),
            Body::Xml(b) => xml_matches(&b.xml, text, &mut reasons),
            Body::XmlSchema(b) => {
                let violations = b.validator.validate(text);
                let valid = violations.is_empty();
                reasons.extend(violations);
                valid
            }
            Body::XPath(b) => xpath_matches(&b.xpath, text, &mut reasons),
            Body::Parameters(b) => b.parameters.matches(&parse_form_parameters(text)),
            Body::Binary(b) => b.bytes.as_slice() == bytes,
            Body::LogEvent(_) => {
                difference.add(MatchField::Body, "log event bodies never match");
                return false;
            }
        };

        let result = matched != self.is_not();
        if !result {
            if reasons.is_empty() {
                let expectation = if self.is_not() { "not to match" } else { "to match" };
                reasons.push(format!(
                    "expected {:?} body {} {}",
                    text,
                    expectation,
                    self.describe()
                ));
            }
            for reason in reasons {
                difference.add(MatchField::Body, reason);
            }
        }
        result
    }

    fn describe(&self) -> String {
        match self {
            Body::String(b) if b.sub_string => format!("substring {:?}", b.value),
            Body::String(b) => format!("string {:?}", b.value),
            Body::Json(b) => format!("json {}", b.json),
            Body::JsonSchema(b) => format!("json schema {}", b.schema),
            Body::JsonPath(b) => format!("json path {}", b.path),
            Body::Regex(b) => format!("regex {}", b.pattern),
            Body::Xml(b) => format!("xml {}", b.xml),
            Body::XmlSchema(_) => "xml schema".to_string(),
            Body::XPath(b) => format!("xpath {}", b.xpath),
            Body::Parameters(b) => format!("parameters {}", b.parameters.len()),
            Body::Binary(b) => format!("{} binary bytes", b.bytes.len()),
            Body::LogEvent(b) => format!("log event {}", b.message),
        }
    }
}
