//! Bounded log of received requests.

use crate::model::HttpRequest;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRequest {
    pub timestamp: DateTime<Utc>,
    pub http_request: HttpRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expectation_id: Option<String>,
}

/// Oldest entries are dropped once `max_entries` is reached.
pub struct RequestLog {
    entries: RwLock<VecDeque<RecordedRequest>>,
    max_entries: usize,
}

impl RequestLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries,
        }
    }

    pub fn record(&self, request: &HttpRequest, expectation_id: Option<&str>) {
        if self.max_entries == 0 {
            return;
        }
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries {
            entries.pop_front();
        }
        entries.push_back(RecordedRequest {
            timestamp: Utc::now(),
            http_request: request.clone(),
            expectation_id: expectation_id.map(str::to_string),
        });
    }

    pub fn retrieve(&self, pattern: Option<&HttpRequest>) -> Vec<RecordedRequest> {
        self.entries
            .read()
            .iter()
            .filter(|entry| pattern.is_none_or(|p| p.matches(&entry.http_request)))
            .cloned()
            .collect()
    }

    pub fn clear(&self, pattern: Option<&HttpRequest>) {
        let mut entries = self.entries.write();
        match pattern {
            Some(pattern) => entries.retain(|entry| !pattern.matches(&entry.http_request)),
            None => entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded() {
        let log = RequestLog::new(2);
        for path in ["/1", "/2", "/3"] {
            log.record(&HttpRequest::new().with_path(path), None);
        }
        let paths: Vec<String> = log
            .retrieve(None)
            .iter()
            .map(|r| r.http_request.path_str().to_string())
            .collect();
        assert_eq!(paths, vec!["/2", "/3"]);
    }

    #[test]
    fn test_retrieve_by_pattern() {
        let log = RequestLog::new(10);
        log.record(&HttpRequest::new().with_path("/a"), Some("e1"));
        log.record(&HttpRequest::new().with_path("/b"), None);
        let matched = log.retrieve(Some(&HttpRequest::new().with_path("/a")));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].expectation_id.as_deref(), Some("e1"));
    }

    #[test]
    fn test_disabled_when_zero() {
        let log = RequestLog::new(0);
        log.record(&HttpRequest::new(), None);
        assert!(log.is_empty());
    }
}
