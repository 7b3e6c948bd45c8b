//! vmcycle core library
//!
//! Provisions a VM through a `VmFacade`, drives it through repeated
//! start/stop cycles, and reports each check as a TAP assertion.

pub mod config;
pub mod error;
pub mod facade;
pub mod harness;
pub mod observability;
pub mod paths;
pub mod plan;
pub mod report;
pub mod sequencer;
pub mod types;

// Re-export commonly used items
pub use config::Config;
pub use error::{CycleError, Result};
pub use facade::{FacadeConfig, FacadeFactory, VmFacade};
pub use harness::{on_new_vm, run_cycle_test, CycleRun, CycleTest, ProvisionOptions};
pub use observability::init as init_observability;
pub use plan::{Plan, Step};
pub use report::{Assertion, TestReport};
pub use sequencer::{SequenceOutcome, Sequencer, StepOutcome, StepRecord};
pub use types::{CycleState, ProvisionSpec, VmObject, VmOptions, VmState};
