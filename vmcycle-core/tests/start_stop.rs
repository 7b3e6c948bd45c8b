//! Integration tests for start/stop cycle runs.
//!
//! These tests verify:
//! - Plan execution order against the facade
//! - Assertion counts with and without failures
//! - Abort short-circuiting and teardown
//! - The outer timeout
//!
//! Tests use a recording mock facade and the simulated backend, so no
//! hypervisor is needed.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use vmcycle_core::{
    error::{CycleError, Result},
    facade::{FacadeOp, SimulatedFacade},
    harness::{on_new_vm, run_cycle_test, CycleTest, ProvisionOptions},
    CycleState, Plan, ProvisionSpec, Sequencer, Step, StepOutcome, TestReport, VmFacade, VmObject,
    VmOptions, VmState,
};

const IMAGE: &str = "01b2c898-945f-11e1-a523-af1afbe22822";
const VM_ID: &str = "7a1b7c0e-5d2f-4c4e-9f7e-3b8a2d6c1e00";

/// Mock facade that records every call (doesn't require an actual VM).
#[derive(Default)]
struct RecordingFacade {
    calls: Mutex<Vec<String>>,
    options: Mutex<Vec<VmOptions>>,
    /// Fail the call with this position in `calls` (0-based)
    fail_at: Option<usize>,
}

impl RecordingFacade {
    fn failing_at(call: usize) -> Self {
        Self { fail_at: Some(call), ..Default::default() }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Record the call; returns true if it should fail.
    fn record(&self, call: &str) -> bool {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call.to_string());
        self.fail_at == Some(calls.len() - 1)
    }
}

#[async_trait]
impl VmFacade for RecordingFacade {
    async fn load(&self, uuid: &str) -> Result<VmObject> {
        if self.record("load") {
            return Err(CycleError::VmNotFound { vm_id: uuid.to_string() });
        }
        Ok(VmObject {
            uuid: uuid.to_string(),
            alias: None,
            brand: Some("joyent-minimal".to_string()),
            state: VmState::Stopped,
            image_uuid: Some(IMAGE.to_string()),
            autoboot: false,
        })
    }

    async fn start(&self, uuid: &str, options: &VmOptions) -> Result<()> {
        self.options.lock().unwrap().push(options.clone());
        if self.record("start") {
            return Err(CycleError::VmStartFailed {
                vm_id: uuid.to_string(),
                reason: "zoneadm: zone is busy".to_string(),
            });
        }
        Ok(())
    }

    async fn stop(&self, uuid: &str, options: &VmOptions) -> Result<()> {
        self.options.lock().unwrap().push(options.clone());
        if self.record("stop") {
            return Err(CycleError::VmStopFailed {
                vm_id: uuid.to_string(),
                reason: "timed out waiting for shutdown".to_string(),
            });
        }
        Ok(())
    }

    async fn create(&self, spec: &ProvisionSpec) -> Result<String> {
        if self.record("create") {
            return Err(CycleError::VmCreateFailed {
                image_uuid: spec.image_uuid.clone(),
                reason: "image not installed".to_string(),
            });
        }
        Ok(VM_ID.to_string())
    }

    async fn delete(&self, _uuid: &str) -> Result<()> {
        self.record("delete");
        Ok(())
    }

    async fn lookup_alias(&self, _alias: &str) -> Result<Vec<String>> {
        self.record("lookup");
        Ok(vec![VM_ID.to_string()])
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[tokio::test]
async fn test_all_steps_pass() {
    let facade = RecordingFacade::default();
    let mut report = TestReport::new("all pass");

    let outcome = Sequencer::new(&facade, VM_ID).run(&Plan::new(10), &mut report).await;

    assert!(!outcome.aborted);
    assert_eq!(outcome.trace.len(), 21);
    assert_eq!(report.assertions.len(), 21);
    assert_eq!(report.passed(), 21);
    assert!(report.is_success());
    assert_eq!(report.skipped, 0);
    assert!(outcome.trace.iter().all(|r| r.outcome == StepOutcome::Passed));
}

#[tokio::test]
async fn test_steps_run_in_plan_order_with_empty_options() {
    let facade = RecordingFacade::default();
    let mut report = TestReport::new("order");

    Sequencer::new(&facade, VM_ID).run(&Plan::new(2), &mut report).await;

    assert_eq!(facade.calls(), vec!["load", "start", "stop", "start", "stop"]);
    let options = facade.options.lock().unwrap();
    assert_eq!(options.len(), 4);
    assert!(options.iter().all(VmOptions::is_empty));
}

#[tokio::test]
async fn test_start_failure_short_circuits_remaining_steps() {
    // Plan [load, start, stop, start, stop]; the first start fails.
    let facade = RecordingFacade::failing_at(1);
    let mut report = TestReport::new("start fails");

    let outcome = Sequencer::new(&facade, VM_ID).run(&Plan::new(2), &mut report).await;

    assert!(outcome.aborted);
    assert_eq!(outcome.first_failure(), Some(2));

    // Assertions: [load: pass, start: fail], nothing afterwards
    assert_eq!(report.assertions.len(), 2);
    assert!(report.assertions[0].ok);
    assert_eq!(report.assertions[0].description, "loaded obj for new VM");
    assert!(!report.assertions[1].ok);
    assert!(report.assertions[1].description.starts_with("unable to start VM: "));
    assert!(report.assertions[1].description.contains("zone is busy"));

    // Every step still shows up in the trace
    assert_eq!(outcome.trace.len(), 5);
    assert_eq!(outcome.skipped(), 3);
    assert_eq!(report.skipped, 3);
    assert!(outcome.trace[2..].iter().all(|r| r.outcome == StepOutcome::Skipped));

    // Skipped steps never reach the facade
    assert_eq!(facade.calls(), vec!["load", "start"]);
}

#[tokio::test]
async fn test_load_failure_skips_every_cycle() {
    let facade = RecordingFacade::failing_at(0);
    let mut report = TestReport::new("load fails");

    let outcome = Sequencer::new(&facade, VM_ID).run(&Plan::new(3), &mut report).await;

    assert!(outcome.aborted);
    assert_eq!(report.assertions.len(), 1);
    assert!(report.assertions[0].description.starts_with("load obj from new VM: "));
    assert_eq!(outcome.skipped(), 6);
    assert_eq!(facade.calls(), vec!["load"]);
}

#[tokio::test]
async fn test_stop_failure_mid_run() {
    // Plan of 3 cycles; the second stop is call index 4.
    let facade = RecordingFacade::failing_at(4);
    let mut report = TestReport::new("stop fails");

    let outcome = Sequencer::new(&facade, VM_ID).run(&Plan::new(3), &mut report).await;

    assert_eq!(outcome.first_failure(), Some(5));
    assert_eq!(outcome.trace[4].step, Step::Stop);
    assert_eq!(report.assertions.len(), 5);
    assert_eq!(report.failed(), 1);
    assert!(report.assertions[4].description.starts_with("unable to stop VM: "));
    assert_eq!(outcome.skipped(), 2);
}

#[tokio::test]
async fn test_on_new_vm_provisions_runs_and_tears_down() {
    let facade = RecordingFacade::default();
    let mut state = CycleState::default();
    let mut report = TestReport::new("provision");
    let options = ProvisionOptions { alias: "autozone-test".to_string(), ..Default::default() };

    let outcome =
        on_new_vm(&facade, IMAGE, &options, &mut state, &Plan::new(1), &mut report).await;

    assert!(outcome.is_some());
    assert_eq!(facade.calls(), vec!["create", "load", "start", "stop", "delete"]);
    assert_eq!(report.assertions.len(), 5);
    assert!(report.is_success());
    assert_eq!(report.assertions[0].description, format!("created VM: {}", VM_ID));
    assert_eq!(report.assertions[4].description, format!("deleted VM: {}", VM_ID));
    assert_eq!(state.uuid, None);
    assert_eq!(state.brand, "joyent-minimal");
}

#[tokio::test]
async fn test_create_failure_skips_plan() {
    let facade = RecordingFacade::failing_at(0);
    let mut state = CycleState::default();
    let mut report = TestReport::new("create fails");

    let outcome = on_new_vm(
        &facade,
        IMAGE,
        &ProvisionOptions::default(),
        &mut state,
        &Plan::new(10),
        &mut report,
    )
    .await;

    assert!(outcome.is_none());
    assert_eq!(facade.calls(), vec!["create"]);
    assert_eq!(report.assertions.len(), 1);
    assert!(report.assertions[0].description.starts_with("error creating VM: "));
    assert_eq!(state.uuid, None);
}

#[tokio::test]
async fn test_teardown_runs_after_abort() {
    let facade = SimulatedFacade::new().with_failure(FacadeOp::Stop, 1, "zone refused to halt");
    let mut state = CycleState::default();
    let mut report = TestReport::new("abort then teardown");

    let outcome = on_new_vm(
        &facade,
        IMAGE,
        &ProvisionOptions::default(),
        &mut state,
        &Plan::new(4),
        &mut report,
    )
    .await
    .expect("VM should have been created");

    assert!(outcome.aborted);
    // create, load, start, stop (fail), delete
    assert_eq!(report.assertions.len(), 5);
    assert_eq!(report.failed(), 1);
    assert!(report.assertions.last().unwrap().description.starts_with("deleted VM: "));
    assert_eq!(facade.calls(FacadeOp::Start).await, 1);
    assert_eq!(facade.calls(FacadeOp::Delete).await, 1);
    assert_eq!(facade.vm_count().await, 0);
}

#[tokio::test]
async fn test_delete_failure_keeps_uuid_and_fails_run() {
    let facade = SimulatedFacade::new().with_failure(FacadeOp::Delete, 1, "zone is busy");
    let mut state = CycleState::default();
    let mut report = TestReport::new("delete fails");

    let outcome = on_new_vm(
        &facade,
        IMAGE,
        &ProvisionOptions::default(),
        &mut state,
        &Plan::new(2),
        &mut report,
    )
    .await
    .expect("VM should have been created");

    assert!(!outcome.aborted);
    // create, load, 2 * (start, stop), delete
    assert_eq!(report.assertions.len(), 7);
    assert_eq!(report.failed(), 1);
    let last = report.assertions.last().unwrap();
    assert!(!last.ok);
    assert!(last.description.starts_with("error deleting VM: "));
    assert!(last.description.contains("zone is busy"));
    assert!(!report.is_success());

    let uuid = state.uuid.clone().expect("uuid should survive a failed delete");
    assert_eq!(facade.state_of(&uuid).await, Some(VmState::Stopped));
    assert!(report.to_tap().contains("# fail  1\n"));
}

#[tokio::test]
async fn test_keep_vm_leaves_vm_in_place() {
    let facade = SimulatedFacade::new();
    let mut state = CycleState::default();
    let mut report = TestReport::new("keep");
    let options = ProvisionOptions { keep_vm: true, ..Default::default() };

    on_new_vm(&facade, IMAGE, &options, &mut state, &Plan::new(2), &mut report).await;

    let uuid = state.uuid.clone().expect("uuid should be kept");
    assert_eq!(facade.state_of(&uuid).await, Some(VmState::Stopped));
    assert_eq!(facade.calls(FacadeOp::Delete).await, 0);
    assert_eq!(report.assertions.len(), 6);
}

#[tokio::test]
async fn test_run_cycle_test_against_simulated_backend() {
    let facade: Arc<dyn VmFacade> = Arc::new(SimulatedFacade::new());
    let test = CycleTest { cycles: 10, ..CycleTest::new(IMAGE) };

    let run = run_cycle_test(facade.as_ref(), &test).await;

    assert!(!run.timed_out);
    // create + load + 10 * (start, stop) + delete
    assert_eq!(run.report.assertions.len(), 23);
    assert!(run.report.is_success());
    assert_eq!(run.report.name, "start/stop cycles");
    assert!(run.report.to_tap().contains("1..23\n"));
    assert_eq!(run.outcome.map(|o| o.trace.len()), Some(21));
}

#[tokio::test]
async fn test_outer_timeout_records_failure_and_cleans_up() {
    let facade = SimulatedFacade::new().with_latency(Duration::from_millis(20));
    let test = CycleTest {
        cycles: 50,
        timeout: Duration::from_millis(150),
        ..CycleTest::new(IMAGE)
    };

    let run = run_cycle_test(&facade, &test).await;

    assert!(run.timed_out);
    assert!(run.outcome.is_none());
    assert!(!run.report.is_success());
    assert!(run
        .report
        .assertions
        .iter()
        .any(|a| !a.ok && a.description == "timeout exceeded (150 ms)"));
    // The VM created before the timeout was deleted afterwards
    assert_eq!(facade.vm_count().await, 0);
    assert_eq!(run.state.uuid, None);
}

#[tokio::test]
async fn test_timeout_during_create_looks_up_alias() {
    let facade = SimulatedFacade::new().with_latency(Duration::from_millis(200));
    let test = CycleTest {
        timeout: Duration::from_millis(50),
        provision: ProvisionOptions { alias: "autozone-slow".to_string(), ..Default::default() },
        ..CycleTest::new(IMAGE)
    };

    let run = run_cycle_test(&facade, &test).await;

    assert!(run.timed_out);
    assert_eq!(run.report.assertions.len(), 1);
    assert_eq!(run.report.assertions[0].description, "timeout exceeded (50 ms)");
    // The dropped create never inserted a VM, so there is nothing to delete
    assert_eq!(facade.calls(FacadeOp::Lookup).await, 1);
    assert_eq!(facade.calls(FacadeOp::Delete).await, 0);
    assert_eq!(facade.vm_count().await, 0);
    assert_eq!(run.state.uuid, None);
}

#[tokio::test]
async fn test_timeout_during_create_deletes_vm_found_by_alias() {
    let facade = RecordingFacade::default();

    // Only the create stalls; everything after it answers immediately
    struct StallingCreate(RecordingFacade);

    #[async_trait]
    impl VmFacade for StallingCreate {
        async fn load(&self, uuid: &str) -> Result<VmObject> {
            self.0.load(uuid).await
        }
        async fn start(&self, uuid: &str, options: &VmOptions) -> Result<()> {
            self.0.start(uuid, options).await
        }
        async fn stop(&self, uuid: &str, options: &VmOptions) -> Result<()> {
            self.0.stop(uuid, options).await
        }
        async fn create(&self, spec: &ProvisionSpec) -> Result<String> {
            self.0.record("create");
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(spec.alias.clone())
        }
        async fn delete(&self, uuid: &str) -> Result<()> {
            self.0.delete(uuid).await
        }
        async fn lookup_alias(&self, alias: &str) -> Result<Vec<String>> {
            self.0.lookup_alias(alias).await
        }
        fn name(&self) -> &str {
            "stalling"
        }
    }

    let stalling = StallingCreate(facade);
    let test = CycleTest { timeout: Duration::from_millis(50), ..CycleTest::new(IMAGE) };

    let run = run_cycle_test(&stalling, &test).await;

    assert!(run.timed_out);
    assert_eq!(stalling.0.calls(), vec!["create", "lookup", "delete"]);
    let last = run.report.assertions.last().unwrap();
    assert_eq!(last.description, format!("deleted VM: {}", VM_ID));
    assert_eq!(run.state.uuid, None);
}

#[tokio::test]
async fn test_cleanup_after_timeout_has_its_own_bound() {
    let facade = SimulatedFacade::new().with_latency(Duration::from_millis(100));
    let test = CycleTest {
        timeout: Duration::from_millis(150),
        cleanup_timeout: Duration::from_millis(50),
        ..CycleTest::new(IMAGE)
    };

    let started = std::time::Instant::now();
    let run = run_cycle_test(&facade, &test).await;

    assert!(run.timed_out);
    assert!(started.elapsed() < Duration::from_millis(1_000));
    let descriptions: Vec<&str> =
        run.report.assertions.iter().map(|a| a.description.as_str()).collect();
    assert!(descriptions.contains(&"timeout exceeded (150 ms)"));
    assert!(descriptions.contains(&"cleanup exceeded (50 ms)"));
    // The delete was cut off, so the VM is still reported as present
    assert!(run.state.uuid.is_some());
    assert_eq!(facade.vm_count().await, 1);
}
