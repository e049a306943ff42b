//! Resource descriptors and the probe/apply plug-in contract

use crate::types::{Observed, Privilege, ResourceId, StateValue};
use anyhow::Result;
use std::fmt;

/// Read-only state query for one resource
///
/// Probes must be side-effect-free and safe to call repeatedly; the engine
/// calls them at least twice per applied resource (diff and verify). A probe
/// that runs but cannot classify what it sees returns [`Observed::Unknown`];
/// an `Err` means the underlying tool itself failed.
pub trait Probe: Send + Sync + fmt::Debug {
    fn probe(&self) -> Result<Observed>;
}

/// State-changing half of the plug-in contract
///
/// Appliers perform the minimal action converging the resource toward
/// `desired`. They must be safe to call when the resource is already
/// converged, even though the engine never does so.
pub trait Apply: Send + Sync + fmt::Debug {
    fn converge(&self, desired: &StateValue) -> Result<()>;
}

/// Combined handler implemented by every resource plug-in
pub trait Handler: Probe + Apply {}

impl<T: Probe + Apply> Handler for T {}

/// Static descriptor binding a resource to its handler and metadata
///
/// Descriptors are built once per run from configuration and never mutated
/// while the engine walks them.
#[derive(Debug)]
pub struct ResourceSpec {
    /// Stable identifier, unique within the set
    pub id: ResourceId,
    /// State the resource must reach
    pub desired: StateValue,
    /// Privilege needed to probe and apply
    pub privilege: Privilege,
    /// Resources that must be converged before this one is attempted
    pub depends_on: Vec<ResourceId>,
    /// Probe/apply implementation
    pub handler: Box<dyn Handler>,
}

impl ResourceSpec {
    pub fn new(
        id: impl Into<ResourceId>,
        desired: StateValue,
        privilege: Privilege,
        handler: Box<dyn Handler>,
    ) -> Self {
        Self {
            id: id.into(),
            desired,
            privilege,
            depends_on: Vec::new(),
            handler,
        }
    }

    /// Declare a prerequisite
    pub fn requires(mut self, id: impl Into<ResourceId>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    pub fn needs_root(&self) -> bool {
        self.privilege == Privilege::Root
    }
}
