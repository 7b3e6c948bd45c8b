//! Options passed to start/stop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options for `VmFacade::start` and `VmFacade::stop`.
///
/// The cycle test always passes the default, which means "let the backend
/// decide". Fields are only honored by operations that support them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmOptions {
    /// Graceful stop timeout before the backend gives up (stop only)
    pub timeout: Option<Duration>,

    /// Force the operation (stop only: halt without a clean shutdown)
    pub force: bool,
}

impl VmOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.timeout.is_none() && !self.force
    }
}
