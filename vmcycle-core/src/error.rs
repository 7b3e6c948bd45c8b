//! Error types for vmcycle.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vmcycle operations.
pub type Result<T> = std::result::Result<T, CycleError>;

/// Main error type for vmcycle.
#[derive(Error, Debug)]
pub enum CycleError {
    // VM facade errors
    #[error("Failed to load VM {vm_id}: {reason}")]
    VmLoadFailed { vm_id: String, reason: String },

    #[error("Failed to start VM {vm_id}: {reason}")]
    VmStartFailed { vm_id: String, reason: String },

    #[error("Failed to stop VM {vm_id}: {reason}")]
    VmStopFailed { vm_id: String, reason: String },

    #[error("Failed to create VM from image {image_uuid}: {reason}")]
    VmCreateFailed { image_uuid: String, reason: String },

    #[error("Failed to delete VM {vm_id}: {reason}")]
    VmDeleteFailed { vm_id: String, reason: String },

    #[error("Failed to look up VMs with alias {alias}: {reason}")]
    VmLookupFailed { alias: String, reason: String },

    #[error("VM not found: {vm_id}")]
    VmNotFound { vm_id: String },

    #[error("VM {vm_id} is {state}, cannot {operation}")]
    InvalidVmState { vm_id: String, state: String, operation: String },

    // Backend errors
    #[error("VM backend not found: {backend}. {hint}")]
    BackendNotFound { backend: String, hint: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CycleError {
    /// Short label for metrics (`reason` tag).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VmLoadFailed { .. } => "load_failed",
            Self::VmStartFailed { .. } => "start_failed",
            Self::VmStopFailed { .. } => "stop_failed",
            Self::VmCreateFailed { .. } => "create_failed",
            Self::VmDeleteFailed { .. } => "delete_failed",
            Self::VmLookupFailed { .. } => "lookup_failed",
            Self::VmNotFound { .. } => "not_found",
            Self::InvalidVmState { .. } => "invalid_state",
            Self::BackendNotFound { .. } => "backend_not_found",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::IoError { .. } => "io",
        }
    }
}
