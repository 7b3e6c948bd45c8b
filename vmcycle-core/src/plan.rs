//! Step plans.
//!
//! A plan is one load followed by `cycles` start/stop pairs. Steps are plain
//! descriptors; the sequencer interprets them.

use serde::{Deserialize, Serialize};

/// Number of start/stop pairs when none is configured.
pub const DEFAULT_CYCLES: usize = 10;

/// Largest accepted number of start/stop pairs.
pub const MAX_CYCLES: usize = 10_000;

/// One unit of work in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Load,
    Start,
    Stop,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load => write!(f, "load"),
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// Ordered list of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    /// `[Load, Start, Stop, Start, Stop, ...]` with `cycles` start/stop pairs.
    pub fn new(cycles: usize) -> Self {
        let mut steps = Vec::with_capacity(1 + 2 * cycles.min(MAX_CYCLES));
        steps.push(Step::Load);
        for _ in 0..cycles {
            steps.push(Step::Start);
            steps.push(Step::Stop);
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of start/stop pairs.
    pub fn cycles(&self) -> usize {
        self.steps.iter().filter(|s| **s == Step::Start).count()
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::new(DEFAULT_CYCLES)
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
