//! Negatable, pattern-capable string values.
//!
//! Every matchable field of a request pattern (method, path, header names and values,
//! cookies, query parameters) is a [`NottableString`]. A value carries a `not` flag and
//! one of three kinds:
//!
//! - **Plain** - literal or full-string regex match
//! - **Schema** - the value is a JSON Schema, a candidate matches when it validates
//! - **Optional** - a map key that also matches when absent from the candidate
//!
//! Wire forms accepted on input:
//!
//! ```text
//! "value"                         plain
//! "!value"                        negated plain
//! "?value"                        optional key
//! {"not": true, "value": "x"}     negated plain, object form
//! {"optional": true, "value": "x"} optional key, object form; "not" is kept
//! {"schema": {"type": "number"}}  schema, optional "not"
//! ```

use crate::predicate::json_schema::JsonSchemaValidator;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const NOT_CHAR: char = '!';
const OPTIONAL_CHAR: char = '?';

/// Kind of a [`NottableString`].
#[derive(Debug, Clone)]
pub enum NottableKind {
    Plain,
    Optional,
    /// `None` when the schema text could not be compiled; such a value fails open.
    Schema(Option<Arc<JsonSchemaValidator>>),
}

/// A string-like value with a negation flag.
///
/// Equality between two values is tri-state: `a.not XOR b.not XOR (a.value == b.value)`.
/// Values are immutable; operations that change a value return a new one.
#[derive(Clone)]
pub struct NottableString {
    value: Option<String>,
    not: bool,
    kind: NottableKind,
    regex: OnceCell<Option<Regex>>,
    regex_ignore_case: OnceCell<Option<Regex>>,
}

impl NottableString {
    fn build(value: Option<String>, not: bool, kind: NottableKind) -> Self {
        Self {
            value,
            not,
            kind,
            regex: OnceCell::new(),
            regex_ignore_case: OnceCell::new(),
        }
    }

    /// Plain, non-negated value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::build(Some(value.into()), false, NottableKind::Plain)
    }

    /// Plain, negated value.
    pub fn not(value: impl Into<String>) -> Self {
        Self::build(Some(value.into()), true, NottableKind::Plain)
    }

    /// Plain value with an explicit negation flag.
    pub fn with_not(value: impl Into<String>, not: bool) -> Self {
        Self::build(Some(value.into()), not, NottableKind::Plain)
    }

    /// Optional map key: matches when absent, otherwise as a plain value.
    pub fn optional(value: impl Into<String>) -> Self {
        Self::build(Some(value.into()), false, NottableKind::Optional)
    }

    /// Schema-valued string. An unparsable schema is kept and fails open when matching.
    pub fn schema(schema_text: impl Into<String>) -> Self {
        Self::schema_with_not(schema_text, false)
    }

    pub fn schema_with_not(schema_text: impl Into<String>, not: bool) -> Self {
        let text = schema_text.into();
        let validator = JsonSchemaValidator::compile(&text).ok().map(Arc::new);
        Self::build(Some(text), not, NottableKind::Schema(validator))
    }

    /// Parse the compact string form, honouring the `!` and `?` prefixes.
    pub fn from_wire(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix(NOT_CHAR) {
            if !rest.is_empty() {
                return Self::not(rest);
            }
        }
        if let Some(rest) = raw.strip_prefix(OPTIONAL_CHAR) {
            if !rest.is_empty() {
                return Self::optional(rest);
            }
        }
        Self::string(raw)
    }

    /// Value with no content; equal only to other absent values.
    pub fn absent() -> Self {
        Self::build(None, false, NottableKind::Plain)
    }

    /// Copy with the `not` flag flipped.
    pub fn negate(&self) -> Self {
        Self::build(self.value.clone(), !self.not, self.kind.clone())
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Value or the empty string.
    pub fn as_str(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn is_not(&self) -> bool {
        self.not
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.kind, NottableKind::Optional)
    }

    pub fn is_schema(&self) -> bool {
        matches!(self.kind, NottableKind::Schema(_))
    }

    pub fn kind(&self) -> &NottableKind {
        &self.kind
    }

    pub fn is_blank(&self) -> bool {
        self.value.as_deref().is_none_or(|v| v.trim().is_empty())
    }

    /// Case-insensitive variant of the tri-state equality.
    pub fn eq_ignore_case(&self, other: &NottableString) -> bool {
        let same = match (&self.value, &other.value) {
            (Some(a), Some(b)) => a.to_lowercase() == b.to_lowercase(),
            (None, None) => true,
            _ => false,
        };
        self.not ^ other.not ^ same
    }

    /// Match a raw candidate, case-sensitively.
    pub fn matches(&self, candidate: &str) -> bool {
        self.not ^ self.matches_ignoring_not(candidate, false)
    }

    /// Match a raw candidate, ignoring case for literals and regexes.
    pub fn matches_ignore_case(&self, candidate: &str) -> bool {
        self.not ^ self.matches_ignoring_not(candidate, true)
    }

    /// Match an optional candidate. A missing candidate only matches optional
    /// patterns or negated patterns.
    pub fn matches_option(&self, candidate: Option<&str>, ignore_case: bool) -> bool {
        match candidate {
            Some(c) if ignore_case => self.matches_ignore_case(c),
            Some(c) => self.matches(c),
            None => self.is_optional() || self.not,
        }
    }

    /// Match another nottable value, folding in the candidate's own negation.
    pub fn matches_nottable(&self, candidate: &NottableString, ignore_case: bool) -> bool {
        if self.not && candidate.not {
            // both negated: compare the underlying values positively
            return self.matches_ignoring_not(candidate.as_str(), ignore_case);
        }
        let base = if ignore_case {
            self.matches_ignore_case(candidate.as_str())
        } else {
            self.matches(candidate.as_str())
        };
        base ^ candidate.not
    }

    /// Validate a candidate JSON document against a schema-valued string.
    ///
    /// Unparsable candidates return the `not` flag. A schema that failed to
    /// compile matches everything unless negated.
    pub fn matches_json(&self, candidate_json: &str) -> bool {
        match &self.kind {
            NottableKind::Schema(None) => !self.not,
            NottableKind::Schema(Some(validator)) => {
                match serde_json::from_str::<Value>(candidate_json) {
                    Ok(instance) => self.not ^ validator.is_valid(&instance),
                    Err(_) => self.not,
                }
            }
            _ => self.matches(candidate_json),
        }
    }

    fn matches_ignoring_not(&self, candidate: &str, ignore_case: bool) -> bool {
        match &self.kind {
            NottableKind::Schema(None) => {
                // fail open regardless of the candidate; `matches` re-applies `not`
                true
            }
            NottableKind::Schema(Some(validator)) => {
                validator.is_valid(&validator.coerce_candidate(candidate))
            }
            NottableKind::Plain | NottableKind::Optional => {
                let Some(pattern) = self.value.as_deref() else {
                    return false;
                };
                if ignore_case {
                    pattern.to_lowercase() == candidate.to_lowercase()
                        || self
                            .compiled_regex(true)
                            .is_some_and(|re| re.is_match(candidate))
                } else {
                    pattern == candidate
                        || self
                            .compiled_regex(false)
                            .is_some_and(|re| re.is_match(candidate))
                }
            }
        }
    }

    fn compiled_regex(&self, ignore_case: bool) -> Option<&Regex> {
        let cell = if ignore_case {
            &self.regex_ignore_case
        } else {
            &self.regex
        };
        cell.get_or_init(|| {
            let pattern = self.value.as_deref()?;
            let flags = if ignore_case { "(?i)" } else { "" };
            Regex::new(&format!("{flags}^(?:{pattern})$")).ok()
        })
        .as_ref()
    }
}

impl PartialEq for NottableString {
    fn eq(&self, other: &Self) -> bool {
        self.not ^ other.not ^ (self.value == other.value)
    }
}

impl PartialEq<str> for NottableString {
    fn eq(&self, other: &str) -> bool {
        self.not ^ (self.value.as_deref() == Some(other))
    }
}

impl PartialEq<&str> for NottableString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl fmt::Debug for NottableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NottableString({self})")
    }
}

impl fmt::Display for NottableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.not {
            write!(f, "{NOT_CHAR}")?;
        } else if self.is_optional() {
            write!(f, "{OPTIONAL_CHAR}")?;
        }
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for NottableString {
    fn from(value: &str) -> Self {
        NottableString::from_wire(value)
    }
}

impl From<String> for NottableString {
    fn from(value: String) -> Self {
        NottableString::from_wire(&value)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NottableStringRaw {
    Text(String),
    Object {
        #[serde(default)]
        not: Option<bool>,
        #[serde(default)]
        optional: Option<bool>,
        #[serde(default)]
        value: Option<Value>,
        #[serde(default)]
        schema: Option<Value>,
    },
    Scalar(Value),
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl From<NottableStringRaw> for NottableString {
    fn from(raw: NottableStringRaw) -> Self {
        match raw {
            NottableStringRaw::Text(s) => NottableString::from_wire(&s),
            NottableStringRaw::Object {
                not,
                optional,
                value,
                schema,
            } => {
                let not = not.unwrap_or(false);
                if let Some(schema) = schema {
                    let text = match schema {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    return NottableString::schema_with_not(text, not);
                }
                let value = value.map(scalar_to_string);
                if optional.unwrap_or(false) {
                    return NottableString::build(value, not, NottableKind::Optional);
                }
                NottableString::build(value, not, NottableKind::Plain)
            }
            NottableStringRaw::Scalar(v) => NottableString::string(scalar_to_string(v)),
        }
    }
}

impl<'de> Deserialize<'de> for NottableString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        NottableStringRaw::deserialize(deserializer).map(NottableString::from)
    }
}

impl Serialize for NottableString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        if self.is_schema() {
            let schema: Value = serde_json::from_str(self.as_str())
                .unwrap_or_else(|_| Value::String(self.as_str().to_string()));
            let mut map = serializer.serialize_map(None)?;
            if self.not {
                map.serialize_entry("not", &true)?;
            }
            map.serialize_entry("schema", &schema)?;
            return map.end();
        }
        if self.value.is_none() {
            return serializer.serialize_none();
        }
        if self.not && self.is_optional() {
            // neither prefix form carries both flags
            let mut map = serializer.serialize_map(Some(3))?;
            map.serialize_entry("not", &true)?;
            map.serialize_entry("optional", &true)?;
            map.serialize_entry("value", self.as_str())?;
            return map.end();
        }
        serializer.collect_str(self)
    }
}
