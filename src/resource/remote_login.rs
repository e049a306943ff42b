//! Remote login resource (systemsetup)

use crate::invoke::ToolRunner;
use anyhow::{Context, Result, bail};
use reconcile::{Apply, Observed, Probe, StateValue};
use std::sync::Arc;

/// SSH remote login on/off
#[derive(Debug, Clone)]
pub struct RemoteLogin {
    runner: Arc<dyn ToolRunner>,
}

impl RemoteLogin {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }
}

impl Probe for RemoteLogin {
    fn probe(&self) -> Result<Observed> {
        let stdout = self
            .runner
            .capture(&["systemsetup", "-getremotelogin"])
            .context("Failed to query remote login")?;

        // "Remote Login: On" / "Remote Login: Off"
        match stdout.rsplit(':').next().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("on") => Ok(Observed::Value(StateValue::Flag(true))),
            Some(v) if v.eq_ignore_ascii_case("off") => {
                Ok(Observed::Value(StateValue::Flag(false)))
            }
            _ => Ok(Observed::Unknown),
        }
    }
}

impl Apply for RemoteLogin {
    fn converge(&self, desired: &StateValue) -> Result<()> {
        let StateValue::Flag(on) = desired else {
            bail!("remote login requires an on/off desired state");
        };
        let value = if *on { "on" } else { "off" };

        let output = self
            .runner
            .invoke(&["systemsetup", "-setremotelogin", value])
            .context("Failed to set remote login")?;
        if !output.success {
            bail!("systemsetup -setremotelogin failed: {}", output.stderr.trim());
        }

        Ok(())
    }
}
