//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - `_seconds` suffix for histograms measuring duration
//!
//! Recording is a no-op until a recorder is installed.

use crate::plan::Step;
use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Register all core metrics with descriptions.
pub fn register_core_metrics() {
    describe_counter!(
        "vmcycle_step_total",
        "Total number of plan steps (by op, outcome: passed, failed, skipped)"
    );
    describe_histogram!(
        "vmcycle_step_duration_seconds",
        "Time taken by a facade call for one step (by op)"
    );
    describe_counter!("vmcycle_runs_total", "Total number of cycle runs (by result)");
    describe_counter!(
        "vmcycle_provision_failures_total",
        "Total number of create/delete failures (by op, reason)"
    );
}

pub fn record_step(step: Step, outcome: &'static str) {
    counter!("vmcycle_step_total", "op" => step.to_string(), "outcome" => outcome).increment(1);
}

pub fn record_step_duration(step: Step, duration_secs: f64) {
    histogram!("vmcycle_step_duration_seconds", "op" => step.to_string()).record(duration_secs);
}

pub fn record_run(success: bool) {
    let result = if success { "pass" } else { "fail" };
    counter!("vmcycle_runs_total", "result" => result).increment(1);
}

pub fn record_provision_failure(op: &'static str, reason: &'static str) {
    counter!("vmcycle_provision_failures_total", "op" => op, "reason" => reason).increment(1);
}
