//! Centralized path configuration for vmcycle.

use std::path::PathBuf;

/// Get the vmcycle configuration directory.
///
/// Resolution order:
/// 1. `VMCYCLE_CONFIG_DIR` environment variable
/// 2. `<platform config dir>/vmcycle` (e.g., `~/.config/vmcycle`)
/// 3. `/etc/vmcycle`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VMCYCLE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::config_dir().map(|d| d.join("vmcycle")).unwrap_or_else(|| PathBuf::from("/etc/vmcycle"))
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Locations searched for `vmadm`, in order.
///
/// `VMCYCLE_VMADM` comes first when set.
pub fn vmadm_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(path) = std::env::var("VMCYCLE_VMADM") {
        candidates.push(PathBuf::from(path));
    }
    candidates.push(PathBuf::from("/usr/sbin/vmadm"));
    candidates.push(PathBuf::from("/usr/vm/sbin/vmadm"));
    candidates
}
