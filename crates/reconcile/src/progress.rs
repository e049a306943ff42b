//! Progress reporting seam
//!
//! Keeps the engine free of UI concerns; the binary plugs in whatever
//! spinner or logger it wants.

use crate::report::ReconcileOutcome;

/// Receives engine progress during a reconciliation pass
pub trait ProgressCallback {
    /// Called once before the first resource, with the total count
    fn on_run_start(&mut self, total: usize);

    /// Called before a resource is probed
    fn on_resource_start(&mut self, id: &str);

    /// Called after a resource's outcome is recorded
    fn on_resource_complete(&mut self, outcome: &ReconcileOutcome);

    /// Called once after the last resource
    fn on_run_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _total: usize) {}
    fn on_resource_start(&mut self, _id: &str) {}
    fn on_resource_complete(&mut self, _outcome: &ReconcileOutcome) {}
    fn on_run_complete(&mut self) {}
}
