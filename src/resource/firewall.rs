//! Application firewall resources (socketfilterfw)
//!
//! Two shapes: scalar on/off flags (global state, stealth mode, block-all)
//! and the add-only application allow list. socketfilterfw output is prose,
//! so probing is tolerant: anything unrecognized observes as Unknown rather
//! than failing the resource.

use crate::invoke::ToolRunner;
use anyhow::{Context, Result, bail};
use reconcile::{Apply, Observed, Probe, StateValue};
use regex::Regex;
use std::sync::Arc;

const SOCKETFILTERFW: &str = "/usr/libexec/ApplicationFirewall/socketfilterfw";

/// Which scalar firewall flag this resource manages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallSetting {
    /// Firewall on/off
    Global,
    /// Don't respond to probe connections
    Stealth,
    /// Block all incoming connections
    BlockAll,
}

impl FirewallSetting {
    fn get_flag(self) -> &'static str {
        match self {
            Self::Global => "--getglobalstate",
            Self::Stealth => "--getstealthmode",
            Self::BlockAll => "--getblockall",
        }
    }

    fn set_flag(self) -> &'static str {
        match self {
            Self::Global => "--setglobalstate",
            Self::Stealth => "--setstealthmode",
            Self::BlockAll => "--setblockall",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Global => "enabled",
            Self::Stealth => "stealth",
            Self::BlockAll => "block-all",
        }
    }
}

/// A scalar firewall flag
#[derive(Debug, Clone)]
pub struct FirewallFlag {
    pub setting: FirewallSetting,
    runner: Arc<dyn ToolRunner>,
}

impl FirewallFlag {
    pub fn new(setting: FirewallSetting, runner: Arc<dyn ToolRunner>) -> Self {
        Self { setting, runner }
    }
}

impl Probe for FirewallFlag {
    fn probe(&self) -> Result<Observed> {
        let stdout = self
            .runner
            .capture(&[SOCKETFILTERFW, self.setting.get_flag()])
            .context("Failed to query firewall state")?;

        // e.g. "Firewall is enabled. (State = 1)" / "Stealth mode disabled"
        let lower = stdout.to_lowercase();
        if lower.contains("disabled") || lower.contains("state = 0") {
            Ok(Observed::Value(StateValue::Flag(false)))
        } else if lower.contains("enabled") || lower.contains("state = 1") {
            Ok(Observed::Value(StateValue::Flag(true)))
        } else {
            Ok(Observed::Unknown)
        }
    }
}

impl Apply for FirewallFlag {
    fn converge(&self, desired: &StateValue) -> Result<()> {
        let StateValue::Flag(on) = desired else {
            bail!("firewall flags require an on/off desired state");
        };
        let value = if *on { "on" } else { "off" };

        let output = self
            .runner
            .invoke(&[SOCKETFILTERFW, self.setting.set_flag(), value])
            .context("Failed to set firewall state")?;
        if !output.success {
            bail!("socketfilterfw failed: {}", output.stderr.trim());
        }

        Ok(())
    }
}

/// The application allow list, add-only
///
/// Apply adds each missing application individually; existing entries are
/// never touched or removed.
#[derive(Debug, Clone)]
pub struct FirewallAllowList {
    runner: Arc<dyn ToolRunner>,
}

impl FirewallAllowList {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self { runner }
    }

    fn listed_apps(&self) -> Result<Vec<String>> {
        let stdout = self
            .runner
            .capture(&[SOCKETFILTERFW, "--listapps"])
            .context("Failed to list firewall applications")?;
        Ok(parse_listed_apps(&stdout))
    }
}

/// Pull application paths out of `--listapps` prose
fn parse_listed_apps(stdout: &str) -> Vec<String> {
    // Lines look like: "1 :  /Applications/Tailscale.app"
    let line_re = Regex::new(r"^\s*\d+\s*:\s*(\S.*)$").expect("static regex");
    stdout
        .lines()
        .filter_map(|line| line_re.captures(line))
        .map(|caps| caps[1].trim().to_string())
        .collect()
}

impl Probe for FirewallAllowList {
    fn probe(&self) -> Result<Observed> {
        let apps = self.listed_apps()?;
        if apps.is_empty() {
            Ok(Observed::Absent)
        } else {
            Ok(Observed::Value(StateValue::List(apps)))
        }
    }
}

impl Apply for FirewallAllowList {
    fn converge(&self, desired: &StateValue) -> Result<()> {
        let StateValue::List(required) = desired else {
            bail!("firewall allow list requires a list of application paths");
        };

        let existing = self.listed_apps()?;
        for app in required {
            if existing.contains(app) {
                continue;
            }
            let output = self
                .runner
                .invoke(&[SOCKETFILTERFW, "--add", app])
                .with_context(|| format!("Failed to add {app} to firewall allow list"))?;
            if !output.success {
                bail!(
                    "socketfilterfw --add {} failed: {}",
                    app,
                    output.stderr.trim()
                );
            }
        }

        Ok(())
    }
}
