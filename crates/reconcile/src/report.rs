//! Run report - per-resource outcomes of one reconciliation pass

use crate::types::{Observed, ResourceId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether the engine invoked the applier for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Resource was already converged (or never reached)
    None,
    /// Applier ran
    Applied,
}

/// Why a resource failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Root required but the run is not elevated; probe was never called
    InsufficientPrivilege,
    /// Probe tool failed
    Probe { message: String },
    /// Applier failed, with the underlying tool's message
    Apply { message: String },
    /// Applier reported success but the re-probe disagrees
    Verification { observed: Observed },
}

/// Why a resource was never attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A prerequisite failed or was itself skipped
    DependencyFailed { dependency: ResourceId },
    /// An earlier failure halted the run
    RunHalted,
}

/// Final disposition of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Already converged; applier never invoked
    Unchanged,
    /// Applied and verified converged
    Converged,
    Failed(FailureReason),
    Skipped(SkipReason),
}

impl OutcomeStatus {
    /// Whether this outcome counts toward overall run success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Unchanged | Self::Converged)
    }
}

/// Outcome record for a single resource
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub id: ResourceId,
    /// First observation, absent when probing never happened
    pub start: Option<Observed>,
    /// Post-apply observation, absent when nothing was applied
    pub end: Option<Observed>,
    pub action: Action,
    pub status: OutcomeStatus,
}

/// Per-kind outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub unchanged: usize,
    pub converged: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl OutcomeCounts {
    pub fn total(&self) -> usize {
        self.unchanged + self.converged + self.failed + self.skipped
    }
}

/// Aggregated outcomes of one reconciliation pass, in traversal order
///
/// Immutable once the run completes; rendering and exit-code mapping are the
/// caller's concern.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<ReconcileOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// True iff every resource ended `Unchanged` or `Converged`
    pub fn overall_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.status.is_success())
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for outcome in &self.outcomes {
            match outcome.status {
                OutcomeStatus::Unchanged => counts.unchanged += 1,
                OutcomeStatus::Converged => counts.converged += 1,
                OutcomeStatus::Failed(_) => counts.failed += 1,
                OutcomeStatus::Skipped(_) => counts.skipped += 1,
            }
        }
        counts
    }

    /// Outcomes that did not succeed, for diagnostic display
    pub fn problems(&self) -> impl Iterator<Item = &ReconcileOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }
}
