//! Command implementations

pub mod apply;
pub mod status;

use crate::config::{self, Manifest};
use anyhow::Result;
use reconcile::{Observed, ResourceSpec, execution_order, satisfies};
use serde::Serialize;
use std::path::PathBuf;

pub use apply::apply;
pub use status::status;

/// Resolve the manifest path, falling back to the default location
pub fn manifest_path(config: Option<PathBuf>) -> Result<PathBuf> {
    match config {
        Some(path) => Ok(path),
        None => config::default_manifest_path(),
    }
}

/// Load the manifest named by `--config` or the default path
pub fn load_manifest(config: Option<PathBuf>) -> Result<Manifest> {
    let path = manifest_path(config)?;
    Manifest::load(&path)
}

/// One resource's probed state relative to its desired state
#[derive(Debug, Serialize)]
pub struct ResourceOverview {
    pub id: String,
    pub desired: String,
    pub observed: String,
    pub converged: bool,
    /// Probe could not run (tool error); never converged
    pub probe_error: Option<String>,
}

/// Probe every resource read-only, in execution order
///
/// Shared by `status` and the `apply` preview. Probes are side-effect-free,
/// so this never changes the system.
pub fn probe_overview(specs: &[ResourceSpec]) -> Result<Vec<ResourceOverview>> {
    let order = execution_order(specs)?;

    let mut overview = Vec::with_capacity(order.len());
    for i in order {
        let spec = &specs[i];
        let (observed, probe_error) = match spec.handler.probe() {
            Ok(observed) => (Some(observed), None),
            Err(e) => (None, Some(format!("{e:#}"))),
        };

        let converged = observed
            .as_ref()
            .is_some_and(|o| satisfies(o, &spec.desired));

        overview.push(ResourceOverview {
            id: spec.id.to_string(),
            desired: spec.desired.to_string(),
            observed: observed
                .as_ref()
                .map_or_else(|| "probe failed".to_string(), Observed::to_string),
            converged,
            probe_error,
        });
    }

    Ok(overview)
}
