//! Sample and run types for drawprobe.
//!
//! These types carry the data flow: request spec → raw outcomes → run
//! accumulator → distribution.

use super::FailureKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One drawn reward as returned by the service.
///
/// Opaque outside a pool catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawOutcome(String);

impl RawOutcome {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RawOutcome {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl fmt::Display for RawOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of one batch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRequestSpec {
    /// Pool identifier
    pub pool: String,
    /// Requesting user/session token
    pub user: String,
    /// Outcomes requested in this call
    pub batch_size: u32,
}

/// Lifecycle of a sampling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Created, no batch issued yet
    Pending,
    /// Issuing batches
    InProgress,
    /// Every planned batch was attempted or the target was reached
    Completed,
    /// Stopped early after exhausting the consecutive-failure budget
    Degraded,
    /// Stopped early by the caller
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Degraded | Self::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in progress",
            Self::Completed => "completed",
            Self::Degraded => "degraded",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Failed batch counts, split by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCounts {
    pub transport: u64,
    pub rejected: u64,
    pub malformed: u64,
}

impl FailureCounts {
    pub fn record(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::Transport => self.transport += 1,
            FailureKind::Rejected => self.rejected += 1,
            FailureKind::Malformed => self.malformed += 1,
        }
    }

    pub fn get(&self, kind: FailureKind) -> u64 {
        match kind {
            FailureKind::Transport => self.transport,
            FailureKind::Rejected => self.rejected,
            FailureKind::Malformed => self.malformed,
        }
    }

    pub fn total(&self) -> u64 {
        self.transport + self.rejected + self.malformed
    }
}

/// Mutable accumulator for one sampling run.
///
/// Owned by exactly one collector invocation; discarded after the
/// distribution has been computed.
#[derive(Debug, Clone)]
pub struct SampleRun {
    pool: String,
    target: u64,
    batch_size: u32,
    outcomes: Vec<RawOutcome>,
    batches_issued: u64,
    batches_succeeded: u64,
    failures: FailureCounts,
    consecutive_failures: u32,
    status: RunStatus,
}

impl SampleRun {
    /// Create a pending run.
    ///
    /// `batch_size` is clamped to at least one outcome per call.
    pub fn new(pool: impl Into<String>, target: u64, batch_size: u32) -> Self {
        Self {
            pool: pool.into(),
            target,
            batch_size: batch_size.max(1),
            outcomes: Vec::new(),
            batches_issued: 0,
            batches_succeeded: 0,
            failures: FailureCounts::default(),
            consecutive_failures: 0,
            status: RunStatus::Pending,
        }
    }

    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Number of batch attempts needed to reach the target if none fail.
    pub fn planned_batches(&self) -> u64 {
        self.target.div_ceil(u64::from(self.batch_size))
    }

    /// All collected outcomes, in draw order.
    pub fn outcomes(&self) -> &[RawOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<RawOutcome> {
        self.outcomes
    }

    pub fn collected(&self) -> u64 {
        self.outcomes.len() as u64
    }

    pub fn batches_issued(&self) -> u64 {
        self.batches_issued
    }

    pub fn batches_succeeded(&self) -> u64 {
        self.batches_succeeded
    }

    pub fn failures(&self) -> FailureCounts {
        self.failures
    }

    pub fn failed_batches(&self) -> u64 {
        self.failures.total()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// True while planned batches remain and the target is not reached.
    pub fn wants_more(&self) -> bool {
        self.batches_issued < self.planned_batches() && self.collected() < self.target
    }

    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
    }

    pub(crate) fn record_success(&mut self, outcomes: Vec<RawOutcome>) {
        self.batches_issued += 1;
        self.batches_succeeded += 1;
        self.consecutive_failures = 0;
        self.outcomes.extend(outcomes);
    }

    /// Record a skipped batch; returns the current failure streak.
    pub(crate) fn record_failure(&mut self, kind: FailureKind) -> u32 {
        self.batches_issued += 1;
        self.failures.record(kind);
        self.consecutive_failures += 1;
        self.consecutive_failures
    }
}

/// Empirical distribution: display label → occurrence count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution {
    counts: BTreeMap<String, u64>,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, label: &str) {
        match self.counts.get_mut(label) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(label.to_string(), 1);
            }
        }
    }

    /// Count for a label (0 if never observed).
    pub fn get(&self, label: &str) -> u64 {
        self.counts.get(label).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(label, count)| (label.as_str(), *count))
    }

    /// Entries ordered by count descending, then label.
    pub fn by_count(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    pub fn as_map(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }
}
