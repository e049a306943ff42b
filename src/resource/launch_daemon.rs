//! Launch daemon resource (launchctl)
//!
//! Registers a system launch daemon from its plist and waits for it to come
//! up. The plist's Label is validated against the declared label before
//! anything is bootstrapped, so a manifest typo cannot load the wrong job.

use crate::invoke::ToolRunner;
use anyhow::{Context, Result, bail};
use reconcile::{Apply, Observed, Probe, ReadinessPoll, StateValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A launchd system daemon that must be registered and running
#[derive(Debug, Clone)]
pub struct LaunchDaemon {
    pub label: String,
    pub plist: PathBuf,
    poll: ReadinessPoll,
    runner: Arc<dyn ToolRunner>,
}

impl LaunchDaemon {
    pub fn new(label: &str, plist: impl Into<PathBuf>, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            label: label.to_string(),
            plist: plist.into(),
            poll: ReadinessPoll::new(10, Duration::from_secs(1)),
            runner,
        }
    }

    /// Override the post-bootstrap readiness poll (tests use a fast one)
    pub fn with_poll(mut self, poll: ReadinessPoll) -> Self {
        self.poll = poll;
        self
    }

    fn is_loaded(&self) -> Result<bool> {
        let target = format!("system/{}", self.label);
        let output = self
            .runner
            .invoke(&["launchctl", "print", &target])
            .context("Failed to query launchctl")?;
        // launchctl print exits non-zero for unknown services
        Ok(output.success)
    }

    /// Check the plist actually declares the label we are about to load
    fn validate_plist(&self) -> Result<()> {
        if !Path::new(&self.plist).exists() {
            bail!("daemon plist not found: {}", self.plist.display());
        }

        let value = plist::Value::from_file(&self.plist)
            .with_context(|| format!("Could not parse {}", self.plist.display()))?;

        let label = value
            .as_dictionary()
            .and_then(|d| d.get("Label"))
            .and_then(plist::Value::as_string);

        match label {
            Some(l) if l == self.label => Ok(()),
            Some(l) => bail!(
                "plist {} declares label {l}, expected {}",
                self.plist.display(),
                self.label
            ),
            None => bail!("plist {} has no Label key", self.plist.display()),
        }
    }
}

impl Probe for LaunchDaemon {
    fn probe(&self) -> Result<Observed> {
        if self.is_loaded()? {
            Ok(Observed::Value(StateValue::Flag(true)))
        } else {
            Ok(Observed::Absent)
        }
    }
}

impl Apply for LaunchDaemon {
    fn converge(&self, desired: &StateValue) -> Result<()> {
        if !matches!(desired, StateValue::Flag(true)) {
            bail!("launch daemons only support desired state 'loaded'");
        }

        self.validate_plist()?;

        let plist = self.plist.to_string_lossy();
        let output = self
            .runner
            .invoke(&["launchctl", "bootstrap", "system", &plist])
            .context("Failed to run launchctl bootstrap")?;

        // "already bootstrapped" is convergence, not failure
        if !output.success && !output.stderr.contains("already bootstrapped") {
            bail!(
                "launchctl bootstrap {} failed: {}",
                self.label,
                output.stderr.trim()
            );
        }

        // Daemons start asynchronously; give this one a bounded window to
        // register before the engine's verification probe runs.
        let ready = self.poll.wait_for(|| self.is_loaded())?;
        if !ready {
            bail!("daemon {} did not come up after bootstrap", self.label);
        }

        Ok(())
    }
}
