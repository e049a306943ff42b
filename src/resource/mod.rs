//! Resource plug-ins
//!
//! Each module wraps exactly one external tool family behind the core
//! `Probe`/`Apply` contract: Homebrew for packages, launchctl for daemon
//! registration, networksetup for DNS, socketfilterfw for the application
//! firewall, pmset for power management, systemsetup for remote login.
//! The engine never sees a shell command; it sees observed state values.

pub mod brew_package;
pub mod dns;
pub mod firewall;
pub mod launch_daemon;
pub mod power;
pub mod remote_login;

pub use brew_package::HomebrewPackage;
pub use dns::DnsServers;
pub use firewall::{FirewallAllowList, FirewallFlag, FirewallSetting};
pub use launch_daemon::LaunchDaemon;
pub use power::PowerSetting;
pub use remote_login::RemoteLogin;
