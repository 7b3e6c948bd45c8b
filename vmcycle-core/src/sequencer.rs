//! Step sequencer.
//!
//! Runs a plan one step at a time against a VM facade. The first failing step
//! sets the abort flag; every later start/stop is skipped without touching the
//! facade or recording an assertion, but still shows up in the trace so the
//! whole plan is accounted for.

use crate::facade::VmFacade;
use crate::observability::metrics;
use crate::plan::{Plan, Step};
use crate::report::TestReport;
use crate::types::VmOptions;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// What happened to one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum StepOutcome {
    Passed,
    Failed(String),
    Skipped,
}

impl StepOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed(_) => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Trace entry for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position in the plan
    pub index: usize,
    pub step: Step,
    pub outcome: StepOutcome,
}

/// Result of running a whole plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOutcome {
    pub trace: Vec<StepRecord>,
    pub aborted: bool,
}

impl SequenceOutcome {
    pub fn skipped(&self) -> usize {
        self.trace.iter().filter(|r| r.outcome == StepOutcome::Skipped).count()
    }

    /// Index of the step that set the abort flag.
    pub fn first_failure(&self) -> Option<usize> {
        self.trace
            .iter()
            .find(|r| matches!(r.outcome, StepOutcome::Failed(_)))
            .map(|r| r.index)
    }
}

/// Interprets a plan against one VM.
pub struct Sequencer<'a> {
    facade: &'a dyn VmFacade,
    uuid: &'a str,
}

impl<'a> Sequencer<'a> {
    pub fn new(facade: &'a dyn VmFacade, uuid: &'a str) -> Self {
        Self { facade, uuid }
    }

    /// Run every step of `plan`, recording assertions into `report`.
    #[instrument(skip(self, plan, report), fields(vm_id = %self.uuid, steps = plan.len()))]
    pub async fn run(&self, plan: &Plan, report: &mut TestReport) -> SequenceOutcome {
        let mut aborted = false;
        let mut trace = Vec::with_capacity(plan.len());

        for (i, step) in plan.into_iter().enumerate() {
            let index = i + 1;

            // Load runs unconditionally; only start/stop honor the abort flag.
            let outcome = if aborted && *step != Step::Load {
                debug!(index, %step, "Skipping step after abort");
                report.skipped += 1;
                StepOutcome::Skipped
            } else {
                let outcome = self.execute(*step, report).await;
                if let StepOutcome::Failed(reason) = &outcome {
                    warn!(index, %step, %reason, "Step failed, aborting remaining steps");
                    aborted = true;
                }
                outcome
            };

            metrics::record_step(*step, outcome.label());
            trace.push(StepRecord { index, step: *step, outcome });
        }

        info!(aborted, skipped = report.skipped, "Sequence complete");
        SequenceOutcome { trace, aborted }
    }

    async fn execute(&self, step: Step, report: &mut TestReport) -> StepOutcome {
        let started = Instant::now();
        // Start/stop always get empty options.
        let options = VmOptions::default();
        let result = match step {
            Step::Load => self.facade.load(self.uuid).await.map(|_| ()),
            Step::Start => self.facade.start(self.uuid, &options).await,
            Step::Stop => self.facade.stop(self.uuid, &options).await,
        };
        metrics::record_step_duration(step, started.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                report.pass(success_text(step));
                StepOutcome::Passed
            }
            Err(e) => {
                let reason = e.to_string();
                report.fail(format!("{}: {}", failure_text(step), reason));
                StepOutcome::Failed(reason)
            }
        }
    }
}

fn success_text(step: Step) -> &'static str {
    match step {
        Step::Load => "loaded obj for new VM",
        Step::Start => "started VM",
        Step::Stop => "stopped VM",
    }
}

fn failure_text(step: Step) -> &'static str {
    match step {
        Step::Load => "load obj from new VM",
        Step::Start => "unable to start VM",
        Step::Stop => "unable to stop VM",
    }
}
