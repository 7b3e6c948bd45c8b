//! Domain types.

pub mod options;
pub mod vm;

pub use options::VmOptions;
pub use vm::{CycleState, ProvisionSpec, VmObject, VmState, DEFAULT_BRAND};
