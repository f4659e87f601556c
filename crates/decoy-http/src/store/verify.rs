//! Request verification against the request log.

use super::ExpectationStore;
use crate::model::{HttpRequest, Verification, VerificationSequence, VerificationTimes};
use serde::Serialize;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("Request not found {times}, expected:<{expected}> but was:<{actual}>")]
    NotFound {
        times: VerificationTimes,
        expected: String,
        actual: String,
    },
    #[error("Request sequence not found, expected:<{expected}> but was:<{actual}>")]
    SequenceNotFound { expected: String, actual: String },
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// A single logged request renders as an object, several as an array.
fn render_log(requests: &[HttpRequest]) -> String {
    match requests {
        [single] => pretty(single),
        _ => pretty(requests),
    }
}

impl ExpectationStore {
    fn logged_requests(&self) -> Vec<HttpRequest> {
        self.log
            .retrieve(None)
            .into_iter()
            .map(|r| r.http_request)
            .collect()
    }

    /// Check how many logged requests match the verification's pattern.
    pub fn verify(&self, verification: &Verification) -> Result<(), VerificationError> {
        let count = self.log.retrieve(Some(&verification.http_request)).len() as u64;
        if verification.times.matches(count) {
            return Ok(());
        }
        info!(
            "Request not found {}, {} matching request(s) logged",
            verification.times, count
        );
        Err(VerificationError::NotFound {
            times: verification.times,
            expected: pretty(&verification.http_request),
            actual: render_log(&self.logged_requests()),
        })
    }

    /// Check that logged requests match the patterns in order. Unrelated
    /// requests may appear between them.
    pub fn verify_sequence(&self, sequence: &VerificationSequence) -> Result<(), VerificationError> {
        let logged = self.logged_requests();
        let mut remaining = logged.iter();
        for pattern in &sequence.http_requests {
            if !remaining.any(|request| pattern.matches(request)) {
                info!("Request sequence not found at {}", pattern);
                return Err(VerificationError::SequenceNotFound {
                    expected: pretty(&sequence.http_requests),
                    actual: render_log(&logged),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(paths: &[&str]) -> ExpectationStore {
        let store = ExpectationStore::default();
        for path in paths {
            store.record(&HttpRequest::new().with_method("GET").with_path(*path), None);
        }
        store
    }

    fn verification(path: &str, times: VerificationTimes) -> Verification {
        Verification {
            http_request: HttpRequest::new().with_path(path),
            times,
        }
    }

    fn sequence(paths: &[&str]) -> VerificationSequence {
        VerificationSequence {
            http_requests: paths.iter().map(|p| HttpRequest::new().with_path(*p)).collect(),
        }
    }

    #[test]
    fn test_verify_counts_matching_requests() {
        let store = store_with(&["/a", "/b", "/a"]);
        assert!(store.verify(&verification("/a", VerificationTimes::exactly(2))).is_ok());
        assert!(store.verify(&verification("/b", VerificationTimes::at_least(1))).is_ok());
        assert!(store.verify(&verification("/c", VerificationTimes::at_most(0))).is_ok());

        let err = store
            .verify(&verification("/a", VerificationTimes::exactly(1)))
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("Request not found exactly once, expected:<"));
        assert!(err.contains("\"/b\""));
    }

    #[test]
    fn test_verify_sequence_allows_gaps() {
        let store = store_with(&["/one", "/two", "/three"]);
        assert!(store.verify_sequence(&sequence(&["/one", "/three"])).is_ok());
        assert!(store.verify_sequence(&sequence(&[])).is_ok());

        let err = store
            .verify_sequence(&sequence(&["/three", "/one"]))
            .unwrap_err();
        assert!(matches!(err, VerificationError::SequenceNotFound { .. }));
        assert!(err.to_string().starts_with("Request sequence not found"));
    }

    #[test]
    fn test_single_logged_request_renders_as_object() {
        let store = store_with(&["/only"]);
        match store.verify(&verification("/other", VerificationTimes::default())) {
            Err(VerificationError::NotFound { actual, .. }) => assert!(actual.starts_with('{')),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
