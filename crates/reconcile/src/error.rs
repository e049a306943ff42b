//! Configuration-time error taxonomy
//!
//! These errors abort a run before any resource is probed; partial graphs
//! are never reconciled. Per-resource failures are not errors at this level;
//! they are contained in the run report.

use crate::types::ResourceId;
use thiserror::Error;

/// Errors detected while validating and ordering a descriptor set
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Two descriptors declare the same id
    #[error("duplicate resource id: {0}")]
    DuplicateResource(ResourceId),

    /// A `depends_on` entry has no matching descriptor
    #[error("resource {resource} depends on unknown resource {dependency}")]
    UnknownDependency {
        resource: ResourceId,
        dependency: ResourceId,
    },

    /// No topological order exists
    #[error("dependency cycle involving: {}", members.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", "))]
    DependencyCycle { members: Vec<ResourceId> },
}
