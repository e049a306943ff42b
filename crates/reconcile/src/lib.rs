//! # Reconcile
//!
//! A state-reconciliation engine for externally-owned resources.
//!
//! Every managed facility is declared as a [`ResourceSpec`]: a stable id, a
//! desired state, a privilege level, its prerequisites, and a handler that
//! knows how to probe and converge it. The engine orders the set by its
//! dependency graph, then walks it sequentially: probe, diff, apply if
//! needed, re-probe to verify. Nothing is cached between runs: every pass
//! re-probes live state, which is what makes a pass safely re-runnable.
//!
//! ## Core Concepts
//!
//! - **Probe**: read-only query of a resource's current state
//! - **Apply**: minimal action converging a resource toward its desired state
//! - **execution_order**: deterministic topological ordering of the set
//! - **reconcile**: one full ordered traversal, producing a [`RunReport`]
//!
//! Per-resource failures are contained: a failing resource is recorded in the
//! report and its dependents are mechanically skipped, so independent
//! branches still converge. Only configuration errors (dependency cycles,
//! unknown prerequisites) abort a run before any resource is touched.

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod graph;
pub mod poll;
pub mod progress;
pub mod report;
pub mod types;

// Re-export main types at crate root
pub use descriptor::{Apply, Handler, Probe, ResourceSpec};
pub use engine::{EngineOptions, PrivilegeContext, reconcile};
pub use error::ConfigError;
pub use graph::execution_order;
pub use poll::ReadinessPoll;
pub use progress::{NoProgress, ProgressCallback};
pub use report::{
    Action, FailureReason, OutcomeCounts, OutcomeStatus, ReconcileOutcome, RunReport, SkipReason,
};
pub use types::{Observed, Privilege, ResourceId, StateValue, merge_preserving, satisfies};
