//! Test harness: provisions a VM, runs a plan against it, tears it down.
//!
//! `run_cycle_test` is the entry point used by the CLI. It wraps
//! `on_new_vm` in a named report and an outer timeout.

use crate::facade::VmFacade;
use crate::observability::metrics;
use crate::plan::{Plan, DEFAULT_CYCLES};
use crate::report::TestReport;
use crate::sequencer::{SequenceOutcome, Sequencer};
use crate::types::{CycleState, ProvisionSpec, DEFAULT_BRAND};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Outer timeout for a whole run, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 240_000;

/// Bound on cleanup once the outer timeout has fired, in milliseconds.
pub const DEFAULT_CLEANUP_TIMEOUT_MS: u64 = 60_000;

/// Alias given to test VMs: `autozone-<pid>`.
pub fn default_alias() -> String {
    format!("autozone-{}", std::process::id())
}

/// How the test VM is created and whether it is kept afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub autoboot: bool,
    pub do_not_inventory: bool,
    pub alias: String,
    /// Leave the VM in place after the run (debugging)
    pub keep_vm: bool,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self { autoboot: false, do_not_inventory: true, alias: default_alias(), keep_vm: false }
    }
}

/// Create a VM, run `plan` against it, then delete it.
///
/// Records `created VM`/`deleted VM` assertions around the plan's own. If
/// creation fails the plan is not run and `None` is returned. Teardown runs
/// even when the plan aborted. On successful deletion `state.uuid` is cleared.
#[instrument(skip_all, fields(image_uuid = %image_uuid, alias = %options.alias))]
pub async fn on_new_vm(
    facade: &dyn VmFacade,
    image_uuid: &str,
    options: &ProvisionOptions,
    state: &mut CycleState,
    plan: &Plan,
    report: &mut TestReport,
) -> Option<SequenceOutcome> {
    let spec = ProvisionSpec {
        image_uuid: image_uuid.to_string(),
        brand: state.brand.clone(),
        alias: options.alias.clone(),
        autoboot: options.autoboot,
        do_not_inventory: options.do_not_inventory,
    };

    let uuid = match facade.create(&spec).await {
        Ok(uuid) => {
            report.pass(format!("created VM: {}", uuid));
            uuid
        }
        Err(e) => {
            error!(error = %e, "Failed to create VM, skipping plan");
            metrics::record_provision_failure("create", e.kind());
            report.fail(format!("error creating VM: {}", e));
            return None;
        }
    };
    state.uuid = Some(uuid.clone());

    let outcome = Sequencer::new(facade, &uuid).run(plan, report).await;

    if options.keep_vm {
        info!(vm_id = %uuid, "Keeping VM after run");
    } else {
        teardown(facade, state, report).await;
    }

    Some(outcome)
}

/// Delete the VM in `state`, if any, recording the result.
async fn teardown(facade: &dyn VmFacade, state: &mut CycleState, report: &mut TestReport) {
    let Some(uuid) = state.uuid.clone() else {
        return;
    };

    match facade.delete(&uuid).await {
        Ok(()) => {
            report.pass(format!("deleted VM: {}", uuid));
            state.uuid = None;
        }
        Err(e) => {
            metrics::record_provision_failure("delete", e.kind());
            report.fail(format!("error deleting VM: {}", e));
        }
    }
}

/// Find the VM that `create` was still producing when the run was cut off.
///
/// Only an unambiguous match is adopted into `state`.
async fn recover_by_alias(
    facade: &dyn VmFacade,
    alias: &str,
    state: &mut CycleState,
    report: &mut TestReport,
) {
    match facade.lookup_alias(alias).await {
        Ok(found) => match found.as_slice() {
            [] => debug!(%alias, "No VM left over from interrupted create"),
            [uuid] => {
                warn!(vm_id = %uuid, %alias, "Found VM created after the run timed out");
                state.uuid = Some(uuid.clone());
            }
            many => {
                report.fail(format!(
                    "{} VMs carry alias {}, not deleting any: {}",
                    many.len(),
                    alias,
                    many.join(", ")
                ));
            }
        },
        Err(e) => {
            metrics::record_provision_failure("lookup", e.kind());
            report.fail(format!("error looking up VM by alias: {}", e));
        }
    }
}

/// A named start/stop cycle test.
#[derive(Debug, Clone)]
pub struct CycleTest {
    pub name: String,
    pub image_uuid: String,
    pub cycles: usize,
    pub brand: String,
    /// Bound on the whole run, provisioning and teardown included
    pub timeout: Duration,
    /// Extra bound on cleanup after `timeout` fires
    pub cleanup_timeout: Duration,
    pub provision: ProvisionOptions,
}

impl CycleTest {
    pub fn new(image_uuid: impl Into<String>) -> Self {
        Self {
            name: "start/stop cycles".to_string(),
            image_uuid: image_uuid.into(),
            cycles: DEFAULT_CYCLES,
            brand: DEFAULT_BRAND.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            cleanup_timeout: Duration::from_millis(DEFAULT_CLEANUP_TIMEOUT_MS),
            provision: ProvisionOptions::default(),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct CycleRun {
    pub report: TestReport,
    pub state: CycleState,
    /// `None` if the VM was never created or the run timed out
    pub outcome: Option<SequenceOutcome>,
    pub timed_out: bool,
}

/// Run `test` against `facade` under its outer timeout.
///
/// On timeout the in-flight step is dropped, a failing assertion is
/// recorded, and a VM that was created but not yet deleted is deleted. If
/// the timeout hit during `create`, the VM is looked up by its alias first.
/// Cleanup is bounded by `cleanup_timeout`, so a run that times out takes at
/// most `timeout + cleanup_timeout`.
#[instrument(skip_all, fields(test = %test.name, cycles = test.cycles))]
pub async fn run_cycle_test(facade: &dyn VmFacade, test: &CycleTest) -> CycleRun {
    let plan = Plan::new(test.cycles);
    let mut report = TestReport::new(&test.name);
    let mut state = CycleState::new(&test.brand);

    info!(backend = facade.name(), steps = plan.len(), "Starting cycle test");

    let result = tokio::time::timeout(
        test.timeout,
        on_new_vm(facade, &test.image_uuid, &test.provision, &mut state, &plan, &mut report),
    )
    .await;

    let (outcome, timed_out) = match result {
        Ok(outcome) => (outcome, false),
        Err(_) => {
            warn!(timeout_ms = test.timeout.as_millis() as u64, "Cycle test timed out");
            report.fail(format!("timeout exceeded ({} ms)", test.timeout.as_millis()));
            let cleanup = async {
                if state.uuid.is_none() {
                    recover_by_alias(facade, &test.provision.alias, &mut state, &mut report).await;
                }
                if !test.provision.keep_vm {
                    teardown(facade, &mut state, &mut report).await;
                }
            };
            if tokio::time::timeout(test.cleanup_timeout, cleanup).await.is_err() {
                error!(vm_id = ?state.uuid, "Cleanup after timeout also timed out");
                report.fail(format!(
                    "cleanup exceeded ({} ms)",
                    test.cleanup_timeout.as_millis()
                ));
            }
            (None, true)
        }
    };

    metrics::record_run(report.is_success());
    info!(
        passed = report.passed(),
        failed = report.failed(),
        skipped = report.skipped,
        "Cycle test finished"
    );

    CycleRun { report, state, outcome, timed_out }
}
