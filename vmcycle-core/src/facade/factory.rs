//! Backend selection.
//!
//! Picks a `VmFacade` implementation by name, with configuration for the
//! backends that need it.

use crate::error::{CycleError, Result};
use crate::facade::{SimulatedFacade, VmFacade, VmadmFacade};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Configuration for backend selection.
#[derive(Debug, Clone)]
pub struct FacadeConfig {
    /// Backend name. Values: "vmadm", "simulated"
    pub backend: String,

    /// Explicit `vmadm` path (otherwise searched for)
    pub vmadm_path: Option<PathBuf>,

    /// Artificial per-operation delay for the simulated backend
    pub simulated_latency: Duration,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self { backend: "vmadm".to_string(), vmadm_path: None, simulated_latency: Duration::ZERO }
    }
}

/// Factory for creating VM facades.
pub struct FacadeFactory;

impl FacadeFactory {
    /// Create the backend named in `config`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The backend name is unknown
    /// - The `vmadm` binary cannot be found
    #[instrument(skip(config), fields(backend = %config.backend))]
    pub fn create(config: &FacadeConfig) -> Result<Arc<dyn VmFacade>> {
        let facade: Arc<dyn VmFacade> = match config.backend.as_str() {
            "vmadm" => Arc::new(VmadmFacade::new(config.vmadm_path.clone())?),
            "simulated" => {
                Arc::new(SimulatedFacade::new().with_latency(config.simulated_latency))
            }
            other => {
                return Err(CycleError::InvalidConfig {
                    reason: format!("Unknown backend '{}'. Valid options: vmadm, simulated", other),
                })
            }
        };

        info!(backend = facade.name(), "VM facade initialized");
        Ok(facade)
    }
}
