//! Assertions about received requests.
//!
//! ```text
//! {"httpRequest": {"path": "/a"}, "times": {"atLeast": 1, "atMost": 2}}
//! {"httpRequests": [{"path": "/a"}, {"path": "/b"}]}
//! ```

use super::request::HttpRequest;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed range for the number of matching requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationTimes {
    #[serde(default)]
    pub at_least: u64,
    /// Negative means no upper bound
    #[serde(default = "unbounded")]
    pub at_most: i64,
}

fn unbounded() -> i64 {
    -1
}

impl Default for VerificationTimes {
    fn default() -> Self {
        Self::at_least(1)
    }
}

impl VerificationTimes {
    pub fn at_least(count: u64) -> Self {
        Self {
            at_least: count,
            at_most: unbounded(),
        }
    }

    pub fn at_most(count: u64) -> Self {
        Self {
            at_least: 0,
            at_most: i64::try_from(count).unwrap_or(i64::MAX),
        }
    }

    pub fn exactly(count: u64) -> Self {
        Self {
            at_least: count,
            at_most: i64::try_from(count).unwrap_or(i64::MAX),
        }
    }

    pub fn between(at_least: u64, at_most: u64) -> Self {
        Self {
            at_least,
            at_most: i64::try_from(at_most).unwrap_or(i64::MAX),
        }
    }

    fn upper_bound(&self) -> Option<u64> {
        u64::try_from(self.at_most).ok()
    }

    pub fn matches(&self, count: u64) -> bool {
        count >= self.at_least && self.upper_bound().is_none_or(|max| count <= max)
    }
}

fn times(count: u64) -> String {
    if count == 1 {
        "once".to_string()
    } else {
        format!("{count} times")
    }
}

impl fmt::Display for VerificationTimes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper_bound() {
            Some(max) if max == self.at_least => write!(f, "exactly {}", times(max)),
            Some(max) if self.at_least == 0 => write!(f, "at most {}", times(max)),
            Some(max) => write!(f, "between {} and {} times", self.at_least, max),
            None => write!(f, "at least {}", times(self.at_least)),
        }
    }
}

/// Requests matching `http_request` were received a number of times in `times`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    #[serde(default)]
    pub http_request: HttpRequest,
    #[serde(default)]
    pub times: VerificationTimes,
}

/// Requests matching each pattern were received in this order, possibly
/// interleaved with others.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSequence {
    #[serde(default)]
    pub http_requests: Vec<HttpRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_times_bounds() {
        let default = VerificationTimes::default();
        assert!(!default.matches(0));
        assert!(default.matches(7));

        let exactly = VerificationTimes::exactly(2);
        assert!(!exactly.matches(1));
        assert!(exactly.matches(2));
        assert!(!exactly.matches(3));

        assert!(VerificationTimes::at_most(1).matches(0));
        assert!(!VerificationTimes::at_most(1).matches(2));
        assert!(VerificationTimes::between(1, 3).matches(3));
    }

    #[test]
    fn test_times_display() {
        assert_eq!(VerificationTimes::at_least(1).to_string(), "at least once");
        assert_eq!(VerificationTimes::exactly(2).to_string(), "exactly 2 times");
        assert_eq!(VerificationTimes::at_most(1).to_string(), "at most once");
        assert_eq!(VerificationTimes::between(1, 4).to_string(), "between 1 and 4 times");
    }

    #[test]
    fn test_wire_forms() {
        let verification: Verification = serde_json::from_value(json!({
            "httpRequest": {"path": "/a"},
            "times": {"atLeast": 2, "atMost": -1}
        }))
        .unwrap();
        assert_eq!(verification.times, VerificationTimes::at_least(2));
        assert_eq!(verification.http_request.path_str(), "/a");

        let defaulted: Verification = serde_json::from_value(json!({})).unwrap();
        assert_eq!(defaulted.times, VerificationTimes::at_least(1));

        let sequence: VerificationSequence =
            serde_json::from_value(json!({"httpRequests": [{"path": "/a"}, {"path": "/b"}]}))
                .unwrap();
        assert_eq!(sequence.http_requests.len(), 2);
    }
}
