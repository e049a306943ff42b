//! Power management resource (pmset)
//!
//! Headless servers want sleep disabled and the machine restarting itself
//! after power loss. Each pmset key is its own resource so the report shows
//! exactly which setting drifted.

use crate::invoke::ToolRunner;
use anyhow::{Context, Result, bail};
use reconcile::{Apply, Observed, Probe, StateValue};
use regex::Regex;
use std::sync::Arc;

/// One pmset setting applied across all power sources (`pmset -a`)
#[derive(Debug, Clone)]
pub struct PowerSetting {
    /// pmset key, e.g. "sleep", "displaysleep", "powernap", "autorestart"
    pub key: String,
    runner: Arc<dyn ToolRunner>,
}

impl PowerSetting {
    pub fn new(key: &str, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            key: key.to_string(),
            runner,
        }
    }

    fn current_value(&self) -> Result<Option<String>> {
        let stdout = self
            .runner
            .capture(&["pmset", "-g", "custom"])
            .context("Failed to read pmset settings")?;
        Ok(parse_pmset_value(&stdout, &self.key))
    }
}

/// Find `key value` in `pmset -g custom` output
fn parse_pmset_value(stdout: &str, key: &str) -> Option<String> {
    let re = Regex::new(&format!(r"(?m)^\s*{}\s+(\S+)", regex::escape(key))).ok()?;
    // Sections repeat per power source; settings are applied with -a, so the
    // first match is representative
    re.captures(stdout).map(|caps| caps[1].to_string())
}

impl Probe for PowerSetting {
    fn probe(&self) -> Result<Observed> {
        match self.current_value()? {
            Some(value) => Ok(Observed::Value(StateValue::Text(value))),
            None => Ok(Observed::Absent),
        }
    }
}

impl Apply for PowerSetting {
    fn converge(&self, desired: &StateValue) -> Result<()> {
        let StateValue::Text(value) = desired else {
            bail!("pmset settings require a textual desired value");
        };

        let output = self
            .runner
            .invoke(&["pmset", "-a", &self.key, value])
            .context("Failed to run pmset")?;
        if !output.success {
            bail!("pmset -a {} {} failed: {}", self.key, value, output.stderr.trim());
        }

        Ok(())
    }
}
