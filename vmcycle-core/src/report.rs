//! Assertion recording and TAP output.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One recorded check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// 1-based position in the report
    pub id: usize,
    pub ok: bool,
    pub description: String,
}

/// Results of one named test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub name: String,
    pub assertions: Vec<Assertion>,
    /// Steps that were not attempted because an earlier step failed.
    /// Informational only; skipped steps are not assertions.
    pub skipped: usize,
}

impl TestReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Record a boolean assertion.
    pub fn ok(&mut self, ok: bool, description: impl Into<String>) {
        let assertion =
            Assertion { id: self.assertions.len() + 1, ok, description: description.into() };
        if ok {
            tracing::info!(id = assertion.id, "ok - {}", assertion.description);
        } else {
            tracing::warn!(id = assertion.id, "not ok - {}", assertion.description);
        }
        self.assertions.push(assertion);
    }

    pub fn pass(&mut self, description: impl Into<String>) {
        self.ok(true, description);
    }

    pub fn fail(&mut self, description: impl Into<String>) {
        self.ok(false, description);
    }

    pub fn passed(&self) -> usize {
        self.assertions.iter().filter(|a| a.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.assertions.len() - self.passed()
    }

    /// At least one assertion and none failed.
    pub fn is_success(&self) -> bool {
        !self.assertions.is_empty() && self.failed() == 0
    }

    /// Render as TAP version 13.
    pub fn to_tap(&self) -> String {
        let mut out = String::from("TAP version 13\n");
        let _ = writeln!(out, "# {}", self.name);
        for a in &self.assertions {
            let status = if a.ok { "ok" } else { "not ok" };
            let _ = writeln!(out, "{} {} {}", status, a.id, a.description);
        }
        let _ = writeln!(out, "\n1..{}", self.assertions.len());
        let _ = writeln!(out, "# tests {}", self.assertions.len());
        let _ = writeln!(out, "# pass  {}", self.passed());
        if self.failed() > 0 {
            let _ = writeln!(out, "# fail  {}", self.failed());
        }
        if self.skipped > 0 {
            let _ = writeln!(out, "# skip  {}", self.skipped);
        }
        if self.is_success() {
            out.push_str("\n# ok\n");
        }
        out
    }
}
