//! Homebrew package resource

use crate::invoke::ToolRunner;
use anyhow::{Context, Result, bail};
use reconcile::{Apply, Observed, Probe, StateValue};
use std::sync::Arc;

/// A Homebrew formula that must be installed
///
/// Desired state is `Flag(true)`. The probe reports the installed version in
/// the observation so the run report can show what is already present.
#[derive(Debug, Clone)]
pub struct HomebrewPackage {
    pub name: String,
    runner: Arc<dyn ToolRunner>,
}

impl HomebrewPackage {
    pub fn new(name: &str, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            name: name.to_string(),
            runner,
        }
    }

    fn installed_version(&self) -> Result<Option<String>> {
        let output = self
            .runner
            .invoke(&["brew", "list", "--versions", &self.name])
            .context("Failed to run brew list")?;

        if !output.success {
            // brew exits non-zero for packages that are not installed
            return Ok(None);
        }

        // Output: "tailscale 1.82.0"
        let version = output
            .stdout
            .split_whitespace()
            .nth(1)
            .map(str::to_string);
        Ok(version)
    }
}

impl Probe for HomebrewPackage {
    fn probe(&self) -> Result<Observed> {
        match self.installed_version()? {
            Some(_) => Ok(Observed::Value(StateValue::Flag(true))),
            None => Ok(Observed::Absent),
        }
    }
}

impl Apply for HomebrewPackage {
    fn converge(&self, desired: &StateValue) -> Result<()> {
        if !matches!(desired, StateValue::Flag(true)) {
            bail!("brew packages only support desired state 'installed'");
        }

        let output = self
            .runner
            .invoke(&["brew", "install", "--formula", &self.name])
            .context("Failed to run brew install")?;

        if !output.success {
            bail!("brew install {} failed: {}", self.name, output.stderr.trim());
        }

        Ok(())
    }
}
