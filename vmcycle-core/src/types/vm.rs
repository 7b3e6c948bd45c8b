//! VM domain types.

use serde::{Deserialize, Serialize};

/// Brand used when none is configured.
pub const DEFAULT_BRAND: &str = "joyent-minimal";

/// Snapshot of a VM as returned by `VmFacade::load`.
///
/// Mirrors the subset of `vmadm get` output we care about; unknown fields
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmObject {
    /// VM identifier (UUID)
    pub uuid: String,

    /// Human-readable alias
    #[serde(default)]
    pub alias: Option<String>,

    /// OS personality (e.g., "joyent-minimal", "kvm")
    #[serde(default)]
    pub brand: Option<String>,

    /// Current VM state
    pub state: VmState,

    /// Image this VM was created from
    #[serde(default)]
    pub image_uuid: Option<String>,

    /// Whether the VM boots on its own after creation
    #[serde(default)]
    pub autoboot: bool,
}

/// VM state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VmState {
    /// VM is being provisioned
    Provisioning,

    /// VM is running
    Running,

    /// VM is stopped
    Stopped,

    /// Zone is installed but not booted
    Installed,

    /// VM failed to provision or boot
    Failed,

    /// Any other state reported by the backend
    Other(String),
}

impl VmState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Installed => "installed",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for VmState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "provisioning" => Self::Provisioning,
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "installed" => Self::Installed,
            "failed" => Self::Failed,
            _ => Self::Other(s),
        }
    }
}

impl From<VmState> for String {
    fn from(state: VmState) -> Self {
        state.as_str().to_string()
    }
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable record shared between the provisioning helper and the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleState {
    /// VM under test, filled in once the VM has been created
    pub uuid: Option<String>,

    /// Fixed OS personality of the VM under test
    pub brand: String,
}

impl CycleState {
    pub fn new(brand: impl Into<String>) -> Self {
        Self { uuid: None, brand: brand.into() }
    }
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new(DEFAULT_BRAND)
    }
}

/// Payload for `VmFacade::create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSpec {
    pub image_uuid: String,
    pub brand: String,
    pub alias: String,
    pub autoboot: bool,
    /// Keep the VM out of the datacenter inventory (test VMs)
    pub do_not_inventory: bool,
}
