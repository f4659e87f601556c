//! Request and response bodies.
//!
//! [`Body`] is a closed set of variants. Pattern variants (regex, JSON path, XPath,
//! JSON schema, XML schema) are compiled when constructed, so an invalid pattern is
//! a registration error rather than a silent non-match.
//!
//! Wire forms:
//!
//! ```text
//! "plain text"                                           STRING
//! {"id": 1}                                              JSON (object without "type")
//! {"type": "STRING", "string": "...", "subString": true}
//! {"type": "JSON", "json": {...}, "matchType": "STRICT"}
//! {"type": "JSON_SCHEMA", "jsonSchema": {...}}
//! {"type": "JSON_PATH", "jsonPath": "$.id"}
//! {"type": "REGEX", "regex": "..."}
//! {"type": "XML", "xml": "<a/>"}
//! {"type": "XML_SCHEMA", "xmlSchema": "<xs:schema .../>"}
//! {"type": "XPATH", "xpath": "/a"}
//! {"type": "PARAMETERS", "parameters": {"name": ["value"]}}
//! {"type": "BINARY", "base64Bytes": "..."}
//! ```
//!
//! Every typed form accepts `"not": true` and, where a MIME type applies, `"contentType"`.

use super::media_type::{Charset, MediaType, DEFAULT_HTTP_CHARSET};
use super::multimap::KeysToMultiValues;
use super::{MatchType, ModelError};
use crate::predicate::json_schema::JsonSchemaValidator;
use crate::predicate::xml::validate_xpath;
use crate::predicate::xml_schema::XmlSchemaValidator;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use serde_json_path::JsonPath;
use std::fmt;
use std::sync::Arc;

/// Body variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyType {
    String,
    Json,
    JsonSchema,
    JsonPath,
    Regex,
    Xml,
    XmlSchema,
    Xpath,
    Parameters,
    Binary,
    LogEvent,
}

impl BodyType {
    fn parse(tag: &str) -> Option<Self> {
        serde_json::from_value(Value::String(tag.to_string())).ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringBody {
    pub value: String,
    pub sub_string: bool,
    pub content_type: Option<MediaType>,
    pub not: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody {
    pub json: String,
    /// `None` when `json` is not valid JSON; such a pattern matches nothing
    pub parsed: Option<Value>,
    pub match_type: MatchType,
    pub content_type: Option<MediaType>,
    pub not: bool,
}

#[derive(Debug, Clone)]
pub struct JsonSchemaBody {
    pub schema: String,
    pub validator: Arc<JsonSchemaValidator>,
    pub not: bool,
}

#[derive(Debug, Clone)]
pub struct JsonPathBody {
    pub path: String,
    pub compiled: Arc<JsonPath>,
    pub not: bool,
}

#[derive(Debug, Clone)]
pub struct RegexBody {
    pub pattern: String,
    pub regex: Regex,
    pub not: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlBody {
    pub xml: String,
    pub content_type: Option<MediaType>,
    pub not: bool,
}

#[derive(Debug, Clone)]
pub struct XmlSchemaBody {
    pub schema: String,
    pub validator: Arc<XmlSchemaValidator>,
    pub not: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XPathBody {
    pub xpath: String,
    pub not: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBody {
    pub parameters: KeysToMultiValues,
    pub not: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<MediaType>,
    pub not: bool,
}

/// Rendered log text attached to recorded events. Never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEventBody {
    pub message: String,
}

/// A request or response body.
#[derive(Debug, Clone)]
pub enum Body {
    String(StringBody),
    Json(JsonBody),
    JsonSchema(JsonSchemaBody),
    JsonPath(JsonPathBody),
    Regex(RegexBody),
    Xml(XmlBody),
    XmlSchema(XmlSchemaBody),
    XPath(XPathBody),
    Parameters(ParameterBody),
    Binary(BinaryBody),
    LogEvent(LogEventBody),
}

impl Body {
    // ===== Constructors =====

    pub fn string(value: impl Into<String>) -> Self {
        Body::String(StringBody {
            value: value.into(),
            sub_string: false,
            content_type: None,
            not: false,
        })
    }

    pub fn sub_string(value: impl Into<String>) -> Self {
        Body::String(StringBody {
            value: value.into(),
            sub_string: true,
            content_type: None,
            not: false,
        })
    }

    pub fn string_with_content_type(value: impl Into<String>, content_type: MediaType) -> Self {
        Body::String(StringBody {
            value: value.into(),
            sub_string: false,
            content_type: Some(content_type),
            not: false,
        })
    }

    /// JSON body with the default `ONLY_MATCHING_FIELDS` match type.
    pub fn json(json: impl Into<String>) -> Self {
        Self::json_with_match_type(json, MatchType::OnlyMatchingFields)
    }

    pub fn json_with_match_type(json: impl Into<String>, match_type: MatchType) -> Self {
        let json = json.into();
        let parsed = serde_json::from_str(&json).ok();
        Body::Json(JsonBody {
            json,
            parsed,
            match_type,
            content_type: None,
            not: false,
        })
    }

    pub fn json_value(value: Value) -> Self {
        Body::Json(JsonBody {
            json: value.to_string(),
            parsed: Some(value),
            match_type: MatchType::OnlyMatchingFields,
            content_type: None,
            not: false,
        })
    }

    pub fn json_schema(schema: impl Into<String>) -> Result<Self, ModelError> {
        let schema = schema.into();
        let validator = JsonSchemaValidator::compile(&schema)
            .map_err(|e| ModelError::InvalidJsonSchema(e.to_string()))?;
        Ok(Body::JsonSchema(JsonSchemaBody {
            schema,
            validator: Arc::new(validator),
            not: false,
        }))
    }

    pub fn json_path(path: impl Into<String>) -> Result<Self, ModelError> {
        let path = path.into();
        let compiled = JsonPath::parse(&path)
            .map_err(|e| ModelError::InvalidJsonPath(path.clone(), e.to_string()))?;
        Ok(Body::JsonPath(JsonPathBody {
            path,
            compiled: Arc::new(compiled),
            not: false,
        }))
    }

    pub fn regex(pattern: impl Into<String>) -> Result<Self, ModelError> {
        let pattern = pattern.into();
        let regex = Regex::new(&format!("(?s)^(?:{pattern})$")).map_err(|e| {
            ModelError::InvalidRegex {
                pattern: pattern.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(Body::Regex(RegexBody {
            pattern,
            regex,
            not: false,
        }))
    }

    pub fn xml(xml: impl Into<String>) -> Self {
        Body::Xml(XmlBody {
            xml: xml.into(),
            content_type: None,
            not: false,
        })
    }

    pub fn xml_schema(schema: impl Into<String>) -> Result<Self, ModelError> {
        let schema = schema.into();
        let validator = XmlSchemaValidator::compile(&schema).map_err(ModelError::InvalidXmlSchema)?;
        Ok(Body::XmlSchema(XmlSchemaBody {
            schema,
            validator: Arc::new(validator),
            not: false,
        }))
    }

    pub fn xpath(xpath: impl Into<String>) -> Result<Self, ModelError> {
        let xpath = xpath.into();
        validate_xpath(&xpath).map_err(|e| ModelError::InvalidXPath(xpath.clone(), e))?;
        Ok(Body::XPath(XPathBody { xpath, not: false }))
    }

    pub fn parameters(parameters: KeysToMultiValues) -> Self {
        Body::Parameters(ParameterBody {
            parameters,
            not: false,
        })
    }

    pub fn binary(bytes: impl Into<Vec<u8>>) -> Self {
        Body::Binary(BinaryBody {
            bytes: bytes.into(),
            content_type: None,
            not: false,
        })
    }

    pub fn log_event(message: impl Into<String>) -> Self {
        Body::LogEvent(LogEventBody {
            message: message.into(),
        })
    }

    /// Type an inbound body from its content type. Textual types become STRING,
    /// JSON, XML or PARAMETERS bodies; anything else stays BINARY. Text without
    /// a declared charset is decoded as ISO-8859-1 so `raw_bytes` reproduces the
    /// exact bytes received.
    pub fn from_incoming(bytes: &[u8], content_type: Option<&str>) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }
        let media_type = content_type.and_then(MediaType::parse);
        let declared = media_type.as_ref().and_then(MediaType::charset);
        let charset = declared.unwrap_or(Charset::Utf8);
        let body = match &media_type {
            Some(m) if m.is_json() => {
                let text = charset.decode(bytes);
                let mut body = Body::json(text);
                body.set_content_type(m.clone());
                body
            }
            Some(m) if m.is_xml() => Body::Xml(XmlBody {
                xml: charset.decode(bytes),
                content_type: Some(m.clone()),
                not: false,
            }),
            Some(m) if m.is_form_urlencoded() => {
                Body::parameters(parse_form_parameters(&charset.decode(bytes)))
            }
            Some(m) if m.is_string() => {
                let text = declared.unwrap_or(DEFAULT_HTTP_CHARSET).decode(bytes);
                Body::string_with_content_type(text, m.clone())
            }
            Some(m) => Body::Binary(BinaryBody {
                bytes: bytes.to_vec(),
                content_type: Some(m.clone()),
                not: false,
            }),
            None if bytes.is_ascii() => Body::string(DEFAULT_HTTP_CHARSET.decode(bytes)),
            None => Body::binary(bytes),
        };
        Some(body)
    }

    // ===== Accessors =====

    pub fn body_type(&self) -> BodyType {
        match self {
            Body::String(_) => BodyType::String,
            Body::Json(_) => BodyType::Json,
            Body::JsonSchema(_) => BodyType::JsonSchema,
            Body::JsonPath(_) => BodyType::JsonPath,
            Body::Regex(_) => BodyType::Regex,
            Body::Xml(_) => BodyType::Xml,
            Body::XmlSchema(_) => BodyType::XmlSchema,
            Body::XPath(_) => BodyType::Xpath,
            Body::Parameters(_) => BodyType::Parameters,
            Body::Binary(_) => BodyType::Binary,
            Body::LogEvent(_) => BodyType::LogEvent,
        }
    }

    pub fn is_not(&self) -> bool {
        match self {
            Body::String(b) => b.not,
            Body::Json(b) => b.not,
            Body::JsonSchema(b) => b.not,
            Body::JsonPath(b) => b.not,
            Body::Regex(b) => b.not,
            Body::Xml(b) => b.not,
            Body::XmlSchema(b) => b.not,
            Body::XPath(b) => b.not,
            Body::Parameters(b) => b.not,
            Body::Binary(b) => b.not,
            Body::LogEvent(_) => false,
        }
    }

    /// Copy with the negation flag set to `not`.
    pub fn with_not(mut self, not: bool) -> Self {
        match &mut self {
            Body::String(b) => b.not = not,
            Body::Json(b) => b.not = not,
            Body::JsonSchema(b) => b.not = not,
            Body::JsonPath(b) => b.not = not,
            Body::Regex(b) => b.not = not,
            Body::Xml(b) => b.not = not,
            Body::XmlSchema(b) => b.not = not,
            Body::XPath(b) => b.not = not,
            Body::Parameters(b) => b.not = not,
            Body::Binary(b) => b.not = not,
            Body::LogEvent(_) => {}
        }
        self
    }

    /// Declared MIME type, for the variants that carry one.
    pub fn content_type(&self) -> Option<&MediaType> {
        match self {
            Body::String(b) => b.content_type.as_ref(),
            Body::Json(b) => b.content_type.as_ref(),
            Body::Xml(b) => b.content_type.as_ref(),
            Body::Binary(b) => b.content_type.as_ref(),
            _ => None,
        }
    }

    fn set_content_type(&mut self, media_type: MediaType) {
        match self {
            Body::String(b) => b.content_type = Some(media_type),
            Body::Json(b) => b.content_type = Some(media_type),
            Body::Xml(b) => b.content_type = Some(media_type),
            Body::Binary(b) => b.content_type = Some(media_type),
            _ => {}
        }
    }

    pub fn with_content_type(mut self, media_type: MediaType) -> Self {
        self.set_content_type(media_type);
        self
    }

    /// Content type to send with a response carrying this body.
    pub fn default_content_type(&self) -> Option<MediaType> {
        if let Some(declared) = self.content_type() {
            return Some(declared.clone());
        }
        match self {
            Body::Json(_) => Some(MediaType::application_json()),
            Body::Xml(_) => Some(MediaType::application_xml()),
            Body::Parameters(_) => Some(MediaType::form_urlencoded()),
            _ => None,
        }
    }

    /// Charset from this body's own MIME type, else `default`.
    pub fn charset(&self, default: Charset) -> Charset {
        self.content_type()
            .and_then(MediaType::charset)
            .unwrap_or(default)
    }

    /// Bytes to put on the wire.
    pub fn raw_bytes(&self) -> Vec<u8> {
        match self {
            Body::String(b) => self.charset(DEFAULT_HTTP_CHARSET).encode(&b.value),
            Body::Json(b) => self.charset(Charset::Utf8).encode(&b.json),
            Body::Xml(b) => self.charset(Charset::Utf8).encode(&b.xml),
            Body::Binary(b) => b.bytes.clone(),
            Body::Parameters(b) => encode_form_parameters(&b.parameters).into_bytes(),
            Body::JsonSchema(b) => b.schema.clone().into_bytes(),
            Body::JsonPath(b) => b.path.clone().into_bytes(),
            Body::Regex(b) => b.pattern.clone().into_bytes(),
            Body::XmlSchema(b) => b.schema.clone().into_bytes(),
            Body::XPath(b) => b.xpath.clone().into_bytes(),
            Body::LogEvent(b) => b.message.clone().into_bytes(),
        }
    }

    /// Body decoded as text with its own charset.
    pub fn to_text(&self) -> String {
        match self {
            Body::String(b) => b.value.clone(),
            Body::Json(b) => b.json.clone(),
            Body::Xml(b) => b.xml.clone(),
            Body::Binary(b) => String::from_utf8_lossy(&b.bytes).into_owned(),
            _ => String::from_utf8_lossy(&self.raw_bytes()).into_owned(),
        }
    }

    /// Serialize to wire JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ModelError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse wire JSON bytes produced by [`Body::to_json_bytes`].
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Body::from_json_value(value)
    }

    /// Build a body from its wire JSON value.
    pub fn from_json_value(value: Value) -> Result<Self, ModelError> {
        match value {
            Value::String(s) => Ok(Body::string(s)),
            Value::Object(map) => match map.get("type").and_then(Value::as_str) {
                Some(tag) => {
                    let body_type = BodyType::parse(tag)
                        .ok_or_else(|| ModelError::UnknownBodyType(tag.to_string()))?;
                    Body::from_typed_object(body_type, map)
                }
                None => Ok(Body::json_value(Value::Object(map))),
            },
            Value::Array(_) => Ok(Body::json_value(value)),
            other => Ok(Body::string(other.to_string())),
        }
    }

    fn from_typed_object(body_type: BodyType, map: Map<String, Value>) -> Result<Self, ModelError> {
        let not = map.get("not").and_then(Value::as_bool).unwrap_or(false);
        let content_type = map
            .get("contentType")
            .and_then(Value::as_str)
            .and_then(MediaType::parse);
        let text = |field: &str| -> Result<String, ModelError> {
            match map.get(field) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Ok(other.to_string()),
                None => Err(ModelError::InvalidBody(format!(
                    "{body_type:?} body requires a \"{field}\" field"
                ))),
            }
        };

        let mut body = match body_type {
            BodyType::String => Body::String(StringBody {
                value: text("string")?,
                sub_string: map.get("subString").and_then(Value::as_bool).unwrap_or(false),
                content_type: None,
                not: false,
            }),
            BodyType::Json => {
                let match_type = match map.get("matchType") {
                    Some(v) => serde_json::from_value(v.clone())?,
                    None => MatchType::OnlyMatchingFields,
                };
                match map.get("json") {
                    Some(Value::String(s)) => Body::json_with_match_type(s.clone(), match_type),
                    Some(other) => {
                        let mut body = Body::json_value(other.clone());
                        if let Body::Json(b) = &mut body {
                            b.match_type = match_type;
                        }
                        body
                    }
                    None => {
                        return Err(ModelError::InvalidBody(
                            "JSON body requires a \"json\" field".to_string(),
                        ))
                    }
                }
            }
            BodyType::JsonSchema => Body::json_schema(text("jsonSchema")?)?,
            BodyType::JsonPath => Body::json_path(text("jsonPath")?)?,
            BodyType::Regex => Body::regex(text("regex")?)?,
            BodyType::Xml => Body::xml(text("xml")?),
            BodyType::XmlSchema => Body::xml_schema(text("xmlSchema")?)?,
            BodyType::Xpath => Body::xpath(text("xpath")?)?,
            BodyType::Parameters => {
                let parameters = match map.get("parameters") {
                    Some(v) => serde_json::from_value(v.clone())?,
                    None => KeysToMultiValues::new(),
                };
                Body::parameters(parameters)
            }
            BodyType::Binary => {
                let encoded = text("base64Bytes")?;
                let bytes = BASE64
                    .decode(encoded.as_bytes())
                    .map_err(|e| ModelError::InvalidBase64(e.to_string()))?;
                Body::binary(bytes)
            }
            BodyType::LogEvent => Body::log_event(text("logEvent")?),
        };
        if let Some(media_type) = content_type {
            body.set_content_type(media_type);
        }
        Ok(body.with_not(not))
    }

    fn to_json_value(&self) -> Value {
        let mut map = Map::new();
        let tag = serde_json::to_value(self.body_type()).unwrap_or(Value::Null);
        if self.is_not() {
            map.insert("not".to_string(), Value::Bool(true));
        }
        map.insert("type".to_string(), tag);
        match self {
            Body::String(b) => {
                if !b.not && !b.sub_string && b.content_type.is_none() {
                    return Value::String(b.value.clone());
                }
                map.insert("string".to_string(), Value::String(b.value.clone()));
                if b.sub_string {
                    map.insert("subString".to_string(), Value::Bool(true));
                }
            }
            Body::Json(b) => {
                // a JSON string document is written as its source text, which
                // reads back as the same document
                let json = match &b.parsed {
                    Some(Value::String(_)) | None => Value::String(b.json.clone()),
                    Some(parsed) => parsed.clone(),
                };
                map.insert("json".to_string(), json);
                if b.match_type == MatchType::Strict {
                    map.insert("matchType".to_string(), Value::String("STRICT".to_string()));
                }
            }
            Body::JsonSchema(b) => {
                map.insert("jsonSchema".to_string(), b.validator.schema().clone());
            }
            Body::JsonPath(b) => {
                map.insert("jsonPath".to_string(), Value::String(b.path.clone()));
            }
            Body::Regex(b) => {
                map.insert("regex".to_string(), Value::String(b.pattern.clone()));
            }
            Body::Xml(b) => {
                map.insert("xml".to_string(), Value::String(b.xml.clone()));
            }
            Body::XmlSchema(b) => {
                map.insert("xmlSchema".to_string(), Value::String(b.schema.clone()));
            }
            Body::XPath(b) => {
                map.insert("xpath".to_string(), Value::String(b.xpath.clone()));
            }
            Body::Parameters(b) => {
                map.insert(
                    "parameters".to_string(),
                    serde_json::to_value(&b.parameters).unwrap_or(Value::Null),
                );
            }
            Body::Binary(b) => {
                map.insert(
                    "base64Bytes".to_string(),
                    Value::String(BASE64.encode(&b.bytes)),
                );
            }
            Body::LogEvent(b) => {
                map.insert("logEvent".to_string(), Value::String(b.message.clone()));
            }
        }
        if let Some(content_type) = self.content_type() {
            map.insert(
                "contentType".to_string(),
                Value::String(content_type.to_string()),
            );
        }
        Value::Object(map)
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Body {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Body::from_json_value(value).map_err(de::Error::custom)
    }
}

/// Parse `application/x-www-form-urlencoded` text.
pub fn parse_form_parameters(text: &str) -> KeysToMultiValues {
    let mut parameters = KeysToMultiValues::new();
    for pair in text.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let decode = |s: &str| {
            let spaced = s.replace('+', " ");
            urlencoding::decode(&spaced)
                .map(|d| d.into_owned())
                .unwrap_or(spaced)
        };
        parameters.add_values(
            super::NottableString::string(decode(name)),
            vec![super::NottableString::string(decode(value))],
        );
    }
    parameters
}

fn encode_form_parameters(parameters: &KeysToMultiValues) -> String {
    let mut pairs = Vec::new();
    for entry in parameters.entries() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_string_wire_form() {
        let body: Body = serde_json::from_str(r#""ok""#).unwrap();
        assert_eq!(body.body_type(), BodyType::String);
        assert_eq!(serde_json::to_value(&body).unwrap(), json!("ok"));
    }

    #[test]
    fn test_untyped_object_is_json() {
        let body: Body = serde_json::from_value(json!({"id": 1})).unwrap();
        match &body {
            Body::Json(b) => {
                assert_eq!(b.parsed, Some(json!({"id": 1})));
                assert_eq!(b.match_type, MatchType::OnlyMatchingFields);
            }
            other => panic!("expected JSON body, got {other:?}"),
        }
    }

    #[test]
    fn test_typed_forms() {
        let strict: Body = serde_json::from_value(
            json!({"type": "JSON", "json": "{\"a\": 1}", "matchType": "STRICT", "not": true}),
        )
        .unwrap();
        assert!(strict.is_not());
        assert!(matches!(&strict, Body::Json(b) if b.match_type == MatchType::Strict));

        let binary: Body =
            serde_json::from_value(json!({"type": "BINARY", "base64Bytes": "AAEC"})).unwrap();
        assert_eq!(binary.raw_bytes(), vec![0, 1, 2]);

        let xml: Body = serde_json::from_value(
            json!({"type": "XML", "xml": "<a/>", "contentType": "text/xml; charset=utf-8"}),
        )
        .unwrap();
        assert_eq!(xml.charset(DEFAULT_HTTP_CHARSET), Charset::Utf8);
    }

    #[test]
    fn test_invalid_patterns_are_rejected() {
        assert!(matches!(
            Body::regex("a("),
            Err(ModelError::InvalidRegex { .. })
        ));
        assert!(Body::json_path("$[").is_err());
        assert!(Body::xpath("/a/[").is_err());
        assert!(Body::json_schema("{").is_err());
        assert!(Body::xml_schema("<a/>").is_err());
        assert!(serde_json::from_value::<Body>(json!({"type": "NOPE"})).is_err());
        assert!(serde_json::from_value::<Body>(json!({"type": "REGEX"})).is_err());
    }

    #[test]
    fn test_string_charset_defaults_to_iso_8859_1() {
        assert_eq!(Body::string("caf\u{e9}").raw_bytes(), vec![b'c', b'a', b'f', 0xE9]);
        let utf8 = Body::string_with_content_type(
            "caf\u{e9}",
            MediaType::text_plain().with_charset(Charset::Utf8),
        );
        assert_eq!(utf8.raw_bytes(), "caf\u{e9}".as_bytes());
    }

    #[test]
    fn test_from_incoming() {
        let json = Body::from_incoming(br#"{"a":1}"#, Some("application/json")).unwrap();
        assert_eq!(json.body_type(), BodyType::Json);

        let form = Body::from_incoming(b"a=1&b=two+words", Some("application/x-www-form-urlencoded"))
            .unwrap();
        match form {
            Body::Parameters(p) => assert_eq!(p.parameters.get_values("b"), vec!["two words"]),
            other => panic!("expected parameters, got {other:?}"),
        }

        let binary = Body::from_incoming(&[0xFF, 0xFE], None).unwrap();
        assert_eq!(binary.body_type(), BodyType::Binary);
        assert!(Body::from_incoming(b"", Some("text/plain")).is_none());
    }

    #[test]
    fn test_wire_round_trip_preserves_bodies() {
        let bodies = vec![
            Body::string("plain"),
            Body::sub_string("part").with_not(true),
            Body::json(r#"{"id": 1, "tags": ["a"]}"#),
            Body::json_with_match_type(r#""abc""#, MatchType::Strict),
            Body::json("[1, 2]"),
            Body::xml("<order><id>1</id></order>"),
            Body::binary(vec![0u8, 159, 146, 150]),
        ];
        for body in bodies {
            let bytes = body.to_json_bytes().unwrap();
            let restored = Body::from_json_bytes(&bytes).unwrap();
            assert_eq!(restored.body_type(), body.body_type());
            assert_eq!(restored.is_not(), body.is_not());
            if body.body_type() != BodyType::Json {
                // JSON documents are re-rendered, so only their parsed form is stable
                assert_eq!(restored.raw_bytes(), body.raw_bytes());
            }
            assert_eq!(
                serde_json::to_value(&restored).unwrap(),
                serde_json::to_value(&body).unwrap()
            );
        }
    }

    #[test]
    fn test_json_string_document_round_trip() {
        let body = Body::json(r#""abc""#);
        let restored = Body::from_json_bytes(&body.to_json_bytes().unwrap()).unwrap();
        match restored {
            Body::Json(b) => {
                assert_eq!(b.parsed, Some(json!("abc")));
                assert_eq!(b.json, r#""abc""#);
            }
            other => panic!("expected JSON body, got {other:?}"),
        }
    }

    #[test]
    fn test_parameters_render_as_form() {
        let body = Body::parameters(parse_form_parameters("name=a+b&id=1"));
        assert_eq!(body.raw_bytes(), b"name=a%20b&id=1".to_vec());
    }
}
