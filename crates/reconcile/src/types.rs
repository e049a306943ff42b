//! Core value types for state reconciliation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a managed resource
///
/// Ids are declared once and never change during a run. Conventionally
/// namespaced by resource type: `pkg:tailscale`, `dns:Wi-Fi`,
/// `firewall:stealth`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Privilege level a resource needs for both probing and applying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    /// Normal user operations
    User,
    /// Requires an elevated (euid 0) process
    Root,
}

/// A desired or observed state value
///
/// Desired and observed state for a resource share this value domain;
/// the diff rules in [`satisfies`] decide what counts as converged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateValue {
    /// On/off facility (firewall enabled, remote login, package installed)
    Flag(bool),
    /// Scalar textual setting (pmset values, versions)
    Text(String),
    /// Ordered list (DNS servers, firewall allow list)
    List(Vec<String>),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(true) => f.write_str("on"),
            Self::Flag(false) => f.write_str("off"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// What a probe saw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observed {
    /// Resource exists with this state
    Value(StateValue),
    /// Resource does not exist / is not configured
    Absent,
    /// Probe ran but could not classify the state
    ///
    /// Distinct from a probe *error*: the tool answered, the answer just
    /// doesn't map onto the value domain. Unknown never satisfies a
    /// desired value.
    Unknown,
}

impl Observed {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => v.fmt(f),
            Self::Absent => f.write_str("absent"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Check whether an observation satisfies a desired state
///
/// Scalars demand exact equality. Lists use containment: every desired
/// entry must be present in the observed list, and unrelated observed
/// entries never count against convergence. `Absent` and `Unknown` never
/// satisfy anything.
pub fn satisfies(observed: &Observed, desired: &StateValue) -> bool {
    match (observed, desired) {
        (Observed::Value(StateValue::List(current)), StateValue::List(wanted)) => {
            wanted.iter().all(|w| current.contains(w))
        }
        (Observed::Value(current), desired) => current == desired,
        (Observed::Absent | Observed::Unknown, _) => false,
    }
}

/// Merge required entries into an existing list without dropping anything
///
/// Newly required entries go first, in their declared order; pre-existing
/// entries follow in their original order. Entries already present stay
/// where they are. List resources are add-only: nothing is ever removed.
pub fn merge_preserving(existing: &[String], required: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = required
        .iter()
        .filter(|r| !existing.contains(r))
        .cloned()
        .collect();
    merged.extend(existing.iter().cloned());
    merged
}
