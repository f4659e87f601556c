//! Declarative modifications applied to forwarded requests and responses.

use super::multimap::{KeyAndValue, KeyToMultiValue, KeysAndValues, KeysToMultiValues};
use super::request::HttpRequest;
use super::response::HttpResponse;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Map types that a [`Modifier`] can edit.
pub trait MapModifications: Clone + Default {
    fn overlay_replace(&mut self, replacements: &Self);
    fn overlay_add(&mut self, additions: &Self);
    fn remove_name(&mut self, name: &str);
    fn is_empty_map(&self) -> bool;
}

impl MapModifications for KeysToMultiValues {
    fn overlay_replace(&mut self, replacements: &Self) {
        for KeyToMultiValue { name, values } in replacements.entries() {
            if self.contains_entry(name.as_str()) {
                self.replace_entry(name.clone(), values.clone());
            }
        }
    }

    fn overlay_add(&mut self, additions: &Self) {
        for KeyToMultiValue { name, values } in additions.entries() {
            self.add_values(name.clone(), values.clone());
        }
    }

    fn remove_name(&mut self, name: &str) {
        self.remove(name);
    }

    fn is_empty_map(&self) -> bool {
        self.is_empty()
    }
}

impl MapModifications for KeysAndValues {
    fn overlay_replace(&mut self, replacements: &Self) {
        for KeyAndValue { name, value } in replacements.entries() {
            if self.contains_entry(name.as_str()) {
                self.put(name.clone(), value.clone());
            }
        }
    }

    fn overlay_add(&mut self, additions: &Self) {
        for KeyAndValue { name, value } in additions.entries() {
            self.put(name.clone(), value.clone());
        }
    }

    fn remove_name(&mut self, name: &str) {
        self.remove(name);
    }

    fn is_empty_map(&self) -> bool {
        self.is_empty()
    }
}

/// `{add, replace, remove}` applied in the order replace, add, remove.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Modifier<M> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<M>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<M>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

impl<M: MapModifications> Modifier<M> {
    pub fn apply(&self, existing: Option<&M>) -> Option<M> {
        let Some(existing) = existing else {
            return self.add.clone();
        };
        let mut modified = existing.clone();
        if let Some(replace) = &self.replace {
            modified.overlay_replace(replace);
        }
        if let Some(add) = &self.add {
            modified.overlay_add(add);
        }
        for name in &self.remove {
            modified.remove_name(name);
        }
        Some(modified)
    }
}

/// Regex substitution on the request path, `$1` style group references allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathModifier {
    pub regex: String,
    #[serde(default)]
    pub substitution: String,
}

impl PathModifier {
    /// Rewritten path; an invalid regex leaves the path untouched.
    pub fn apply(&self, path: &str) -> String {
        match Regex::new(&self.regex) {
            Ok(re) => re.replace_all(path, self.substitution.as_str()).into_owned(),
            Err(e) => {
                tracing::warn!("Ignoring path modifier with invalid regex '{}': {}", self.regex, e);
                path.to_string()
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), regex::Error> {
        Regex::new(&self.regex).map(|_| ())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequestModifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathModifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_string_parameters: Option<Modifier<KeysToMultiValues>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Modifier<KeysToMultiValues>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Modifier<KeysAndValues>>,
}

impl HttpRequestModifier {
    pub fn apply(&self, request: &HttpRequest) -> HttpRequest {
        let mut modified = request.clone();
        if let Some(path) = &self.path {
            modified.path = Some(path.apply(request.path_str()).into());
        }
        if let Some(query) = &self.query_string_parameters {
            modified.query_string_parameters =
                apply_or_empty(query, &request.query_string_parameters);
        }
        if let Some(headers) = &self.headers {
            modified.headers = apply_or_empty(headers, &request.headers);
        }
        if let Some(cookies) = &self.cookies {
            modified.cookies = apply_or_empty(cookies, &request.cookies);
        }
        modified
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseModifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Modifier<KeysToMultiValues>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Modifier<KeysAndValues>>,
}

impl HttpResponseModifier {
    pub fn apply(&self, response: &HttpResponse) -> HttpResponse {
        let mut modified = response.clone();
        if let Some(headers) = &self.headers {
            modified.headers = apply_or_empty(headers, &response.headers);
        }
        if let Some(cookies) = &self.cookies {
            modified.cookies = apply_or_empty(cookies, &response.cookies);
        }
        modified
    }
}

/// Empty maps on a message stand for "absent".
fn apply_or_empty<M: MapModifications>(modifier: &Modifier<M>, existing: &M) -> M {
    let existing = (!existing.is_empty_map()).then_some(existing);
    modifier.apply(existing).unwrap_or_default()
}
