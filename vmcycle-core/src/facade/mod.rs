//! VM facade abstraction.
//!
//! vmcycle never manages VMs itself. Everything goes through the `VmFacade`
//! trait:
//! - `vmadm`: the SmartOS `vmadm` tool, driven as a subprocess
//! - `simulated`: an in-process VM table for dry runs and tests

use crate::error::Result;
use crate::types::{ProvisionSpec, VmObject, VmOptions};
use async_trait::async_trait;

/// VM facade trait.
///
/// All backends must implement this trait.
/// Methods are instrumented by implementations (not here) to maintain observability.
#[async_trait]
pub trait VmFacade: Send + Sync {
    /// Fetch the current state of a VM.
    async fn load(&self, uuid: &str) -> Result<VmObject>;

    /// Boot a stopped VM.
    async fn start(&self, uuid: &str, options: &VmOptions) -> Result<()>;

    /// Shut down a running VM.
    async fn stop(&self, uuid: &str, options: &VmOptions) -> Result<()>;

    /// Create a VM and return its UUID.
    async fn create(&self, spec: &ProvisionSpec) -> Result<String>;

    /// Destroy a VM and release its resources.
    async fn delete(&self, uuid: &str) -> Result<()>;

    /// UUIDs of every VM carrying `alias`.
    async fn lookup_alias(&self, alias: &str) -> Result<Vec<String>>;

    /// Backend name (for logging/metrics).
    fn name(&self) -> &str;
}

mod factory;
pub mod simulated;
pub mod vmadm;

pub use factory::{FacadeConfig, FacadeFactory};
pub use simulated::{FacadeOp, SimulatedFacade};
pub use vmadm::VmadmFacade;
