//! What one dispatch run did.

use chrono::{DateTime, Utc};
use pulse_core::error::PulseError;
use pulse_core::types::Mode;
use serde::Serialize;

/// One isolated failure. `scope` names what failed: a group key such as
/// `Arrays/Easy`, or a subscriber address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchFailure {
    pub scope: String,
    pub kind: String,
    pub message: String,
}

impl DispatchFailure {
    pub fn new(scope: impl Into<String>, error: &PulseError) -> Self {
        Self {
            scope: scope.into(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Active subscribers loaded for the run.
    pub subscribers: usize,
    pub groups: usize,
    pub delivered: usize,
    /// Subscribers that got nothing: failed group, failed send, bad record.
    pub skipped: usize,
    pub failures: Vec<DispatchFailure>,
}

impl RunSummary {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            finished_at: None,
            subscribers: 0,
            groups: 0,
            delivered: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, scope: impl Into<String>, error: &PulseError) {
        self.failures.push(DispatchFailure::new(scope, error));
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} run: {} subscribers in {} groups, {} delivered, {} skipped, {} failures",
            self.mode,
            self.subscribers,
            self.groups,
            self.delivered,
            self.skipped,
            self.failures.len()
        )
    }
}
