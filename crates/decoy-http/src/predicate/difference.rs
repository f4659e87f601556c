//! Collector for the reasons a request did not match an expectation.

use std::collections::BTreeMap;
use std::fmt;

/// Request fields that take part in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchField {
    Method,
    Path,
    PathParameters,
    QueryParameters,
    Headers,
    Cookies,
    Body,
    KeepAlive,
    Secure,
}

impl MatchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchField::Method => "method",
            MatchField::Path => "path",
            MatchField::PathParameters => "pathParameters",
            MatchField::QueryParameters => "queryStringParameters",
            MatchField::Headers => "headers",
            MatchField::Cookies => "cookies",
            MatchField::Body => "body",
            MatchField::KeepAlive => "keepAlive",
            MatchField::Secure => "secure",
        }
    }
}

/// Field-to-reasons report built while matching one request against one pattern.
#[derive(Debug, Default, Clone)]
pub struct MatchDifference {
    reasons: BTreeMap<MatchField, Vec<String>>,
}

impl MatchDifference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: MatchField, reason: impl Into<String>) {
        self.reasons.entry(field).or_default().push(reason.into());
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self, field: MatchField) -> &[String] {
        self.reasons.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = MatchField> + '_ {
        self.reasons.keys().copied()
    }
}

impl fmt::Display for MatchDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, reasons) in &self.reasons {
            for reason in reasons {
                if !first {
                    writeln!(f)?;
                }
                first = false;
                write!(f, "{} didn't match: {}", field.as_str(), reason)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_groups_by_field() {
        let mut diff = MatchDifference::new();
        assert!(diff.is_empty());
        diff.add(MatchField::Body, "missing field /id");
        diff.add(MatchField::Method, "expected GET found POST");
        diff.add(MatchField::Body, "wrong type at /name");

        assert_eq!(diff.reasons(MatchField::Body).len(), 2);
        assert!(diff.reasons(MatchField::Headers).is_empty());
        let rendered = diff.to_string();
        assert!(rendered.starts_with("method didn't match"));
        assert_eq!(rendered.lines().count(), 3);
    }
}
