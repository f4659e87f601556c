//! In-memory expectation store and request log.
//!
//! Expectations are kept sorted by priority (highest first) and then by
//! registration order. Retired expectations are removed as soon as the use
//! that retired them has been claimed.
//!
//! # Module Structure
//!
//! - `mod.rs` - [`ExpectationStore`]
//! - `log` - bounded log of received requests
//! - `verify` - request verification against the log

mod log;
mod verify;

pub use log::{RecordedRequest, RequestLog};
pub use verify::VerificationError;

use crate::model::{Expectation, HttpRequest};
use crate::predicate::MatchDifference;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of requests kept in the log.
pub const DEFAULT_MAX_LOG_ENTRIES: usize = 10_000;

pub struct ExpectationStore {
    expectations: RwLock<Vec<Arc<Expectation>>>,
    log: RequestLog,
}

impl Default for ExpectationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_ENTRIES)
    }
}

impl ExpectationStore {
    pub fn new(max_log_entries: usize) -> Self {
        Self {
            expectations: RwLock::new(Vec::new()),
            log: RequestLog::new(max_log_entries),
        }
    }

    /// Insert an expectation, replacing any with the same id in place.
    pub fn add(&self, expectation: Expectation) -> Arc<Expectation> {
        let expectation = Arc::new(expectation);
        let mut expectations = self.expectations.write();
        match expectations.iter().position(|e| e.id == expectation.id) {
            Some(index) => {
                info!("Updating expectation {}", expectation.id);
                expectations[index] = Arc::clone(&expectation);
            }
            None => {
                info!(
                    "Adding expectation {} for {}",
                    expectation.id, expectation.http_request
                );
                expectations.push(Arc::clone(&expectation));
            }
        }
        // stable: equal priorities keep registration order
        expectations.sort_by(|a, b| b.priority.cmp(&a.priority));
        expectation
    }

    /// Highest-priority active expectation whose pattern matches `request`.
    pub fn first_matching(&self, request: &HttpRequest) -> Option<Arc<Expectation>> {
        let expectations = self.expectations.read();
        for expectation in expectations.iter() {
            if !expectation.is_active() {
                continue;
            }
            let mut difference = MatchDifference::new();
            if expectation
                .http_request
                .matches_with_difference(request, &mut difference)
            {
                debug!("Request {} matched expectation {}", request, expectation.id);
                return Some(Arc::clone(expectation));
            }
            debug!(
                "Request {} didn't match expectation {}:\n{}",
                request, expectation.id, difference
            );
        }
        None
    }

    /// Consume one use of `expectation`, dropping it once retired.
    /// Returns false when another request claimed its last use first.
    pub fn post_process(&self, expectation: &Arc<Expectation>) -> bool {
        let consumed = expectation.try_consume();
        if !expectation.is_active() {
            debug!("Expectation {} retired", expectation.id);
            self.expectations
                .write()
                .retain(|e| !Arc::ptr_eq(e, expectation));
        }
        consumed
    }

    /// Find and claim the expectation that should serve `request`.
    pub fn claim(&self, request: &HttpRequest) -> Option<Arc<Expectation>> {
        loop {
            let expectation = self.first_matching(request)?;
            if self.post_process(&expectation) {
                return Some(expectation);
            }
        }
    }

    /// Remove expectations and logged requests matched by `pattern`.
    /// `None` clears everything.
    pub fn clear(&self, pattern: Option<&HttpRequest>) {
        match pattern {
            None => self.reset(),
            Some(_) => {
                self.clear_expectations(pattern);
                self.clear_log(pattern);
            }
        }
    }

    /// Remove expectations whose pattern is matched by `pattern`.
    pub fn clear_expectations(&self, pattern: Option<&HttpRequest>) {
        let mut expectations = self.expectations.write();
        let before = expectations.len();
        expectations.retain(|e| pattern.is_some_and(|p| !p.matches(&e.http_request)));
        info!("Cleared {} expectation(s)", before - expectations.len());
    }

    /// Remove logged requests matched by `pattern`.
    pub fn clear_log(&self, pattern: Option<&HttpRequest>) {
        self.log.clear(pattern);
    }

    /// Remove the expectation with `id`. Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        let mut expectations = self.expectations.write();
        let before = expectations.len();
        expectations.retain(|e| e.id != id);
        before != expectations.len()
    }

    pub fn reset(&self) {
        self.expectations.write().clear();
        self.log.clear(None);
        info!("Reset all expectations and recorded requests");
    }

    /// Active expectations whose pattern is matched by `pattern`, in match order.
    pub fn retrieve_active(&self, pattern: Option<&HttpRequest>) -> Vec<Arc<Expectation>> {
        self.expectations
            .read()
            .iter()
            .filter(|e| e.is_active())
            .filter(|e| pattern.is_none_or(|p| p.matches(&e.http_request)))
            .cloned()
            .collect()
    }

    pub fn record(&self, request: &HttpRequest, expectation_id: Option<&str>) {
        self.log.record(request, expectation_id);
    }

    /// Logged requests matching `pattern`, oldest first.
    pub fn retrieve_recorded(&self, pattern: Option<&HttpRequest>) -> Vec<RecordedRequest> {
        self.log.retrieve(pattern)
    }

    pub fn len(&self) -> usize {
        self.expectations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.read().is_empty()
    }
}
