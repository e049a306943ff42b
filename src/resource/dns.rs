//! DNS server list resource (networksetup)
//!
//! List-valued and add-only: required servers are merged in front of
//! whatever is already configured, and nothing is ever removed. macOS has no
//! append operation for DNS, so the applier writes the full merged list.

use crate::invoke::ToolRunner;
use anyhow::{Context, Result, bail};
use reconcile::{Apply, Observed, Probe, StateValue, merge_preserving};
use std::sync::Arc;

/// DNS servers for one network service (e.g. "Wi-Fi")
#[derive(Debug, Clone)]
pub struct DnsServers {
    pub service: String,
    runner: Arc<dyn ToolRunner>,
}

impl DnsServers {
    pub fn new(service: &str, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            service: service.to_string(),
            runner,
        }
    }

    fn current_servers(&self) -> Result<Vec<String>> {
        let stdout = self
            .runner
            .capture(&["networksetup", "-getdnsservers", &self.service])
            .context("Failed to read DNS servers")?;

        // networksetup prints a sentence, not an empty list, when unset
        if stdout.contains("aren't any DNS Servers") {
            return Ok(Vec::new());
        }

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl Probe for DnsServers {
    fn probe(&self) -> Result<Observed> {
        let servers = self.current_servers()?;
        if servers.is_empty() {
            Ok(Observed::Absent)
        } else {
            Ok(Observed::Value(StateValue::List(servers)))
        }
    }
}

impl Apply for DnsServers {
    fn converge(&self, desired: &StateValue) -> Result<()> {
        let StateValue::List(required) = desired else {
            bail!("dns resource requires a list of servers");
        };

        let existing = self.current_servers()?;
        let merged = merge_preserving(&existing, required);

        let mut argv = vec!["networksetup", "-setdnsservers", &self.service];
        argv.extend(merged.iter().map(String::as_str));

        let output = self
            .runner
            .invoke(&argv)
            .context("Failed to set DNS servers")?;
        if !output.success {
            bail!(
                "networksetup -setdnsservers failed: {}",
                output.stderr.trim()
            );
        }

        Ok(())
    }
}
