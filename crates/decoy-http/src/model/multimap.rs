//! Case-insensitive, ordered maps of nottable keys to nottable values.
//!
//! Used for headers, query string parameters, path parameters and form parameters
//! ([`KeysToMultiValues`]) and for cookies ([`KeysAndValues`]).
//!
//! Names are grouped by their lower-cased value while the first-seen original
//! case is kept for serialization. Values under a name keep insertion order and
//! are de-duplicated.
//!
//! Matching goes through [`MatchableMultiMap`], a flattened `(name, value)` view of
//! the candidate that understands negated keys, optional keys and regex values.

use super::nottable::NottableString;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// How a pattern map is compared with a candidate map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyMatchStyle {
    /// Every pattern `(name, value)` must be present in the candidate
    #[default]
    SubSet,
    /// Every candidate value under a pattern name must match one of the pattern values
    MatchingKey,
}

/// A name with its ordered values.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyToMultiValue {
    pub name: NottableString,
    pub values: Vec<NottableString>,
}

impl KeyToMultiValue {
    pub fn new(name: impl Into<NottableString>, values: Vec<NottableString>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn single(name: impl Into<NottableString>, value: impl Into<NottableString>) -> Self {
        Self::new(name, vec![value.into()])
    }
}

/// A name with exactly one value.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAndValue {
    pub name: NottableString,
    pub value: NottableString,
}

impl KeyAndValue {
    pub fn new(name: impl Into<NottableString>, value: impl Into<NottableString>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn same_name(a: &NottableString, b: &NottableString) -> bool {
    a.is_not() == b.is_not() && a.as_str().to_lowercase() == b.as_str().to_lowercase()
}

fn same_value(a: &NottableString, b: &NottableString) -> bool {
    a.is_not() == b.is_not() && a.value() == b.value()
}

// ============================================================================
// KeysToMultiValues
// ============================================================================

/// Ordered, case-insensitive multi-valued map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeysToMultiValues {
    entries: Vec<KeyToMultiValue>,
    key_match_style: KeyMatchStyle,
}

impl KeysToMultiValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_match_style(&self) -> KeyMatchStyle {
        self.key_match_style
    }

    pub fn with_key_match_style(mut self, style: KeyMatchStyle) -> Self {
        self.key_match_style = style;
        self
    }

    /// Replace all content with `entries`.
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = KeyToMultiValue>) -> Self {
        self.entries.clear();
        for entry in entries {
            self.add_values(entry.name, entry.values);
        }
        self
    }

    /// Append values under `name`, creating the group when missing.
    pub fn with_entry(
        mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = impl Into<NottableString>>,
    ) -> Self {
        self.add_values(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn add_values(&mut self, name: NottableString, values: Vec<NottableString>) {
        let index = match self.position(&name) {
            Some(i) => i,
            None => {
                self.entries.push(KeyToMultiValue::new(name, Vec::new()));
                self.entries.len() - 1
            }
        };
        let group = &mut self.entries[index].values;
        for value in values {
            if !group.iter().any(|existing| same_value(existing, &value)) {
                group.push(value);
            }
        }
    }

    /// Drop any values under `name` and store `values` in their place.
    pub fn replace_entry(
        &mut self,
        name: impl Into<NottableString>,
        values: impl IntoIterator<Item = impl Into<NottableString>>,
    ) {
        let name = name.into();
        if let Some(index) = self.position(&name) {
            self.entries[index].values.clear();
        }
        self.add_values(name, values.into_iter().map(Into::into).collect());
    }

    /// Remove a name, compared case-insensitively. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.name.as_str().to_lowercase() != name.to_lowercase());
        before != self.entries.len()
    }

    fn position(&self, name: &NottableString) -> Option<usize> {
        self.entries.iter().position(|e| same_name(&e.name, name))
    }

    fn group(&self, name: &str) -> Option<&KeyToMultiValue> {
        let lower = name.to_lowercase();
        self.entries
            .iter()
            .find(|e| !e.name.is_not() && e.name.as_str().to_lowercase() == lower)
    }

    /// All values under `name`; empty when the name is absent.
    pub fn get_values(&self, name: &str) -> Vec<String> {
        self.group(name)
            .map(|g| g.values.iter().map(|v| v.as_str().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn get_first_value(&self, name: &str) -> Option<&str> {
        self.group(name)
            .and_then(|g| g.values.first())
            .map(|v| v.as_str())
    }

    pub fn contains_entry(&self, name: &str) -> bool {
        self.group(name).is_some()
    }

    /// Whether `name` holds a value matching `value`, ignoring case. Negated,
    /// regex and schema values match the way they do in a pattern.
    pub fn contains_entry_value(&self, name: &str, value: &str) -> bool {
        self.group(name)
            .is_some_and(|g| g.values.iter().any(|v| v.matches_ignore_case(value)))
    }

    pub fn entries(&self) -> &[KeyToMultiValue] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Flattened `(name, value)` view used for matching.
    pub fn to_matchable(&self) -> MatchableMultiMap {
        let mut pairs = Vec::new();
        for entry in &self.entries {
            if entry.values.is_empty() {
                pairs.push((entry.name.clone(), None));
            }
            for value in &entry.values {
                pairs.push((entry.name.clone(), Some(value.clone())));
            }
        }
        MatchableMultiMap { pairs }
    }

    /// Whether this map, used as a pattern, matches `candidate`.
    pub fn matches(&self, candidate: &KeysToMultiValues) -> bool {
        candidate.to_matchable().contains_all(self)
    }

    /// Compact wire form, for log and difference messages.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ============================================================================
// KeysAndValues
// ============================================================================

/// Ordered, case-insensitive single-valued map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeysAndValues {
    entries: Vec<KeyAndValue>,
}

impl KeysAndValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(mut self, entries: impl IntoIterator<Item = KeyAndValue>) -> Self {
        self.entries.clear();
        for entry in entries {
            self.put(entry.name, entry.value);
        }
        self
    }

    pub fn with_entry(
        mut self,
        name: impl Into<NottableString>,
        value: impl Into<NottableString>,
    ) -> Self {
        self.put(name.into(), value.into());
        self
    }

    /// Store `value` under `name`, replacing any previous value in place.
    pub fn put(&mut self, name: NottableString, value: NottableString) {
        match self.entries.iter_mut().find(|e| same_name(&e.name, &name)) {
            Some(existing) => existing.value = value,
            None => self.entries.push(KeyAndValue { name, value }),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| e.name.as_str().to_lowercase() != name.to_lowercase());
        before != self.entries.len()
    }

    pub fn get_value(&self, name: &str) -> Option<&str> {
        let lower = name.to_lowercase();
        self.entries
            .iter()
            .find(|e| !e.name.is_not() && e.name.as_str().to_lowercase() == lower)
            .map(|e| e.value.as_str())
    }

    pub fn contains_entry(&self, name: &str) -> bool {
        self.get_value(name).is_some()
    }

    pub fn entries(&self) -> &[KeyAndValue] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn as_multi(&self) -> KeysToMultiValues {
        KeysToMultiValues::new().with_entries(
            self.entries
                .iter()
                .map(|e| KeyToMultiValue::new(e.name.clone(), vec![e.value.clone()])),
        )
    }

    pub fn to_matchable(&self) -> MatchableMultiMap {
        self.as_multi().to_matchable()
    }

    pub fn matches(&self, candidate: &KeysAndValues) -> bool {
        candidate.to_matchable().contains_all(&self.as_multi())
    }
}

// ============================================================================
// Matching view
// ============================================================================

/// Flattened candidate map with case-insensitive, regex-aware lookup.
#[derive(Debug, Clone, Default)]
pub struct MatchableMultiMap {
    pairs: Vec<(NottableString, Option<NottableString>)>,
}

impl MatchableMultiMap {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Candidate values whose names match the (plain) pattern name.
    fn values_for(&self, pattern_name: &NottableString) -> Option<Vec<&str>> {
        let positive = if pattern_name.is_not() {
            pattern_name.negate()
        } else {
            pattern_name.clone()
        };
        let mut found = false;
        let mut values = Vec::new();
        for (name, value) in &self.pairs {
            if positive.matches_nottable(name, true) {
                found = true;
                if let Some(v) = value {
                    values.push(v.as_str());
                }
            }
        }
        found.then_some(values)
    }

    /// Whether every entry of `pattern` is satisfied by this candidate.
    pub fn contains_all(&self, pattern: &KeysToMultiValues) -> bool {
        pattern.entries().iter().all(|entry| match pattern.key_match_style() {
            KeyMatchStyle::SubSet => self.contains_subset_entry(entry),
            KeyMatchStyle::MatchingKey => self.contains_matching_key_entry(entry),
        })
    }

    fn contains_subset_entry(&self, entry: &KeyToMultiValue) -> bool {
        let candidate_values = self.values_for(&entry.name);

        if entry.name.is_not() {
            return candidate_values.is_none();
        }
        let Some(candidate_values) = candidate_values else {
            return entry.name.is_optional()
                || (!entry.values.is_empty() && entry.values.iter().all(|v| v.is_not()));
        };

        entry.values.iter().all(|pattern| {
            if pattern.is_not() {
                let positive = pattern.negate();
                !candidate_values
                    .iter()
                    .any(|c| positive.matches_ignore_case(c))
            } else {
                candidate_values
                    .iter()
                    .any(|c| pattern.matches_ignore_case(c))
            }
        })
    }

    fn contains_matching_key_entry(&self, entry: &KeyToMultiValue) -> bool {
        let candidate_values = self.values_for(&entry.name);

        if entry.name.is_not() {
            return candidate_values.is_none();
        }
        let Some(candidate_values) = candidate_values else {
            return entry.name.is_optional();
        };
        if entry.values.is_empty() {
            return true;
        }
        !candidate_values.is_empty()
            && candidate_values
                .iter()
                .all(|c| entry.values.iter().any(|p| p.matches_ignore_case(c)))
    }
}

// ============================================================================
// Wire format
// ============================================================================

const KEY_MATCH_STYLE_FIELD: &str = "keyMatchStyle";

impl Serialize for KeysToMultiValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if self.key_match_style != KeyMatchStyle::SubSet {
            map.serialize_entry(KEY_MATCH_STYLE_FIELD, &self.key_match_style)?;
        }
        for entry in &self.entries {
            map.serialize_entry(&entry.name.to_string(), &entry.values)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ValuesRaw {
    Many(Vec<NottableString>),
    One(NottableString),
}

impl From<ValuesRaw> for Vec<NottableString> {
    fn from(raw: ValuesRaw) -> Self {
        match raw {
            ValuesRaw::Many(values) => values,
            ValuesRaw::One(value) => vec![value],
        }
    }
}

#[derive(Deserialize)]
struct EntryRaw {
    name: NottableString,
    #[serde(default)]
    values: Option<ValuesRaw>,
    #[serde(default)]
    value: Option<ValuesRaw>,
}

impl<'de> Deserialize<'de> for KeysToMultiValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MultiVisitor;

        impl<'de> Visitor<'de> for MultiVisitor {
            type Value = KeysToMultiValues;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of name to values or an array of {name, values}")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut result = KeysToMultiValues::new();
                while let Some(key) = access.next_key::<String>()? {
                    if key == KEY_MATCH_STYLE_FIELD {
                        result.key_match_style = access.next_value()?;
                        continue;
                    }
                    let values: ValuesRaw = access.next_value()?;
                    result.add_values(NottableString::from_wire(&key), values.into());
                }
                Ok(result)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut result = KeysToMultiValues::new();
                while let Some(entry) = access.next_element::<EntryRaw>()? {
                    let values = entry
                        .values
                        .or(entry.value)
                        .map(Vec::from)
                        .unwrap_or_default();
                    result.add_values(entry.name, values);
                }
                Ok(result)
            }
        }

        deserializer.deserialize_any(MultiVisitor)
    }
}

impl Serialize for KeysAndValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name.to_string(), &entry.value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for KeysAndValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        let mut result = KeysAndValues::new();
        match raw {
            Value::Object(map) => {
                for (name, value) in map {
                    let value = NottableString::deserialize(value).map_err(de::Error::custom)?;
                    result.put(NottableString::from_wire(&name), value);
                }
            }
            Value::Array(items) => {
                for item in items {
                    let entry = EntryRaw::deserialize(item).map_err(de::Error::custom)?;
                    let value = entry
                        .value
                        .or(entry.values)
                        .map(Vec::from)
                        .and_then(|v| v.into_iter().next())
                        .unwrap_or_else(|| NottableString::string(""));
                    result.put(entry.name, value);
                }
            }
            Value::Null => {}
            other => {
                return Err(de::Error::custom(format!(
                    "expected an object or array of cookies, got {other}"
                )))
            }
        }
        Ok(result)
    }
}
