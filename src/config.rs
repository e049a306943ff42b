//! Manifest loading and descriptor construction
//!
//! The manifest is a static TOML declaration of the machine's target state.
//! `build_specs` turns it into the descriptor set the engine consumes,
//! wiring dependencies (daemons on their packages, DNS on its daemon) and
//! assigning privilege levels per resource type.

use anyhow::{Context, Result};
use reconcile::{Privilege, ResourceId, ResourceSpec, StateValue};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::invoke::ToolRunner;
use crate::resource::{
    DnsServers, FirewallAllowList, FirewallFlag, FirewallSetting, HomebrewPackage, LaunchDaemon,
    PowerSetting, RemoteLogin,
};

/// Default manifest location: ~/.config/steward/steward.toml
pub fn default_manifest_path() -> Result<PathBuf> {
    let home = crate::privilege::real_home().context("Could not determine home directory")?;
    Ok(home.join(".config").join("steward").join("steward.toml"))
}

// ============================================================================
// Manifest schema
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub packages: Packages,
    #[serde(default)]
    pub daemons: Vec<Daemon>,
    #[serde(default)]
    pub dns: Option<Dns>,
    #[serde(default)]
    pub firewall: Option<Firewall>,
    #[serde(default)]
    pub power: Option<Power>,
    #[serde(default)]
    pub remote: Option<Remote>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Packages {
    #[serde(default)]
    pub formulae: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Daemon {
    pub label: String,
    pub plist: String,
    #[serde(default)]
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dns {
    pub service: String,
    pub servers: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Firewall {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub stealth: Option<bool>,
    #[serde(default)]
    pub block_all: Option<bool>,
    /// Applications allowed through the firewall (add-only)
    #[serde(default)]
    pub allow: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Power {
    #[serde(default)]
    pub sleep: Option<u32>,
    #[serde(default)]
    pub displaysleep: Option<u32>,
    #[serde(default)]
    pub powernap: Option<bool>,
    #[serde(default)]
    pub autorestart: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Remote {
    #[serde(default)]
    pub ssh: Option<bool>,
}

impl Manifest {
    /// Load a manifest from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid manifest format in {}", path.display()))
    }
}

// ============================================================================
// Descriptor construction
// ============================================================================

/// Build the descriptor set from a manifest
///
/// Ids are namespaced by resource type (`pkg:`, `daemon:`, `dns:`,
/// `firewall:`, `power:`, `remote:`). Declaration order here fixes the
/// tie-break order the engine uses for unconstrained resources.
pub fn build_specs(manifest: &Manifest, runner: &Arc<dyn ToolRunner>) -> Vec<ResourceSpec> {
    let mut specs = Vec::new();

    for name in &manifest.packages.formulae {
        specs.push(ResourceSpec::new(
            format!("pkg:{name}"),
            StateValue::Flag(true),
            Privilege::User,
            Box::new(HomebrewPackage::new(name, Arc::clone(runner))),
        ));
    }

    for daemon in &manifest.daemons {
        let plist = shellexpand::tilde(&daemon.plist).to_string();
        let mut spec = ResourceSpec::new(
            format!("daemon:{}", daemon.label),
            StateValue::Flag(true),
            Privilege::Root,
            Box::new(LaunchDaemon::new(&daemon.label, plist, Arc::clone(runner))),
        );
        for req in &daemon.requires {
            spec = spec.requires(req.as_str());
        }
        specs.push(spec);
    }

    if let Some(dns) = &manifest.dns
        && !dns.servers.is_empty()
    {
        let mut spec = ResourceSpec::new(
            format!("dns:{}", dns.service),
            StateValue::List(dns.servers.clone()),
            Privilege::Root,
            Box::new(DnsServers::new(&dns.service, Arc::clone(runner))),
        );
        for req in &dns.requires {
            spec = spec.requires(req.as_str());
        }
        specs.push(spec);
    }

    if let Some(firewall) = &manifest.firewall {
        let flags = [
            (FirewallSetting::Global, firewall.enabled),
            (FirewallSetting::Stealth, firewall.stealth),
            (FirewallSetting::BlockAll, firewall.block_all),
        ];
        for (setting, desired) in flags {
            if let Some(on) = desired {
                specs.push(ResourceSpec::new(
                    format!("firewall:{}", setting.key()),
                    StateValue::Flag(on),
                    Privilege::Root,
                    Box::new(FirewallFlag::new(setting, Arc::clone(runner))),
                ));
            }
        }

        if !firewall.allow.is_empty() {
            let apps: Vec<String> = firewall
                .allow
                .iter()
                .map(|a| shellexpand::tilde(a).to_string())
                .collect();
            // Punching holes only makes sense once the firewall is on
            let mut spec = ResourceSpec::new(
                "firewall:allow",
                StateValue::List(apps),
                Privilege::Root,
                Box::new(FirewallAllowList::new(Arc::clone(runner))),
            );
            if firewall.enabled.is_some() {
                spec = spec.requires("firewall:enabled");
            }
            specs.push(spec);
        }
    }

    if let Some(power) = &manifest.power {
        let settings = [
            ("sleep", power.sleep.map(|v| v.to_string())),
            ("displaysleep", power.displaysleep.map(|v| v.to_string())),
            ("powernap", power.powernap.map(|b| u32::from(b).to_string())),
            (
                "autorestart",
                power.autorestart.map(|b| u32::from(b).to_string()),
            ),
        ];
        for (key, desired) in settings {
            if let Some(value) = desired {
                specs.push(ResourceSpec::new(
                    format!("power:{key}"),
                    StateValue::Text(value),
                    Privilege::Root,
                    Box::new(PowerSetting::new(key, Arc::clone(runner))),
                ));
            }
        }
    }

    if let Some(remote) = &manifest.remote {
        if let Some(ssh) = remote.ssh {
            specs.push(ResourceSpec::new(
                "remote:ssh",
                StateValue::Flag(ssh),
                Privilege::Root,
                Box::new(RemoteLogin::new(Arc::clone(runner))),
            ));
        }
    }

    specs
}

/// Drop root-privileged resources and everything that depends on them
///
/// Used by `--user-only` runs: what remains can converge without elevation.
/// Returns the pruned set and the ids that were removed.
pub fn prune_for_user_only(specs: Vec<ResourceSpec>) -> (Vec<ResourceSpec>, Vec<ResourceId>) {
    let mut removed: HashSet<ResourceId> = specs
        .iter()
        .filter(|s| s.needs_root())
        .map(|s| s.id.clone())
        .collect();

    // Transitive closure: anything depending on a removed resource goes too
    loop {
        let mut grew = false;
        for spec in &specs {
            if removed.contains(&spec.id) {
                continue;
            }
            if spec.depends_on.iter().any(|d| removed.contains(d)) {
                removed.insert(spec.id.clone());
                grew = true;
            }
        }
        if !grew {
            break;
        }
    }

    let mut removed_ids: Vec<ResourceId> = Vec::new();
    let mut kept = Vec::new();
    for spec in specs {
        if removed.contains(&spec.id) {
            removed_ids.push(spec.id);
        } else {
            kept.push(spec);
        }
    }

    (kept, removed_ids)
}
