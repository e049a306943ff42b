//! Privilege detection
//!
//! The engine only needs to know whether root operations are possible; the
//! details (euid, sudo pass-through of the invoking user) live here. When the
//! process was elevated with sudo, config still belongs to the invoking user,
//! so the real user/home helpers honour SUDO_USER.

use reconcile::PrivilegeContext;
use std::path::PathBuf;

/// Effective uid of this process
pub fn euid() -> u32 {
    // SAFETY: geteuid has no failure modes and touches no memory
    unsafe { libc::geteuid() }
}

/// Detect the privilege context of the running process
pub fn detect() -> PrivilegeContext {
    let uid = euid();
    PrivilegeContext {
        uid,
        elevated: uid == 0,
    }
}

/// The invoking user's name, seeing through sudo
pub fn real_user() -> Option<String> {
    real_user_from(
        std::env::var("SUDO_USER").ok().as_deref(),
        std::env::var("USER").ok().as_deref(),
    )
}

/// The invoking user's home directory, seeing through sudo
pub fn real_home() -> Option<PathBuf> {
    match std::env::var("SUDO_USER") {
        Ok(sudo_user) if !sudo_user.is_empty() => {
            let tilde_user = format!("~{sudo_user}");
            let expanded = shellexpand::tilde(&tilde_user);
            Some(PathBuf::from(expanded.as_ref()))
        }
        _ => dirs::home_dir(),
    }
}

fn real_user_from(sudo_user: Option<&str>, user: Option<&str>) -> Option<String> {
    match sudo_user {
        Some(s) if !s.is_empty() => Some(s.to_string()),
        _ => user.map(str::to_string),
    }
}
