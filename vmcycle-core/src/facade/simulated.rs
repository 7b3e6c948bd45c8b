//! In-process VM backend.
//!
//! Keeps a VM table in memory and enforces the same state rules as `vmadm`
//! (no starting a running VM, no stopping a stopped one). Failures can be
//! injected per operation to exercise abort handling.

use crate::error::{CycleError, Result};
use crate::facade::VmFacade;
use crate::types::{ProvisionSpec, VmObject, VmOptions, VmState};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Facade operation, used to address injected failures and call counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacadeOp {
    Load,
    Start,
    Stop,
    Create,
    Delete,
    Lookup,
}

impl FacadeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Lookup => "lookup",
        }
    }
}

impl std::fmt::Display for FacadeOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct Inner {
    vms: HashMap<String, VmObject>,
    calls: HashMap<FacadeOp, usize>,
    /// (operation, 1-based call number) -> failure reason
    failures: HashMap<(FacadeOp, usize), String>,
}

/// Simulated backend.
#[derive(Debug, Default)]
pub struct SimulatedFacade {
    inner: Mutex<Inner>,
    latency: Duration,
}

impl SimulatedFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every operation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the `nth` call (1-based) of `op` fail with `reason`.
    pub fn with_failure(mut self, op: FacadeOp, nth: usize, reason: impl Into<String>) -> Self {
        self.inner.get_mut().failures.insert((op, nth), reason.into());
        self
    }

    /// Number of times `op` has been called.
    pub async fn calls(&self, op: FacadeOp) -> usize {
        self.inner.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    /// Current state of a VM, if it exists.
    pub async fn state_of(&self, uuid: &str) -> Option<VmState> {
        self.inner.lock().await.vms.get(uuid).map(|vm| vm.state.clone())
    }

    /// Number of VMs in the table.
    pub async fn vm_count(&self) -> usize {
        self.inner.lock().await.vms.len()
    }

    /// Count the call and return the injected failure for it, if any.
    async fn enter(&self, op: FacadeOp) -> Option<String> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut inner = self.inner.lock().await;
        let count = inner.calls.entry(op).or_insert(0);
        *count += 1;
        let nth = *count;
        let failure = inner.failures.remove(&(op, nth));
        if failure.is_some() {
            debug!(%op, nth, "Injecting failure");
        }
        failure
    }

    async fn transition(
        &self,
        uuid: &str,
        operation: &str,
        from: VmState,
        to: VmState,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let vm = inner
            .vms
            .get_mut(uuid)
            .ok_or_else(|| CycleError::VmNotFound { vm_id: uuid.to_string() })?;

        if vm.state != from {
            return Err(CycleError::InvalidVmState {
                vm_id: uuid.to_string(),
                state: vm.state.to_string(),
                operation: operation.to_string(),
            });
        }

        vm.state = to;
        Ok(())
    }
}

#[async_trait]
impl VmFacade for SimulatedFacade {
    #[instrument(skip(self), fields(backend = "simulated"))]
    async fn load(&self, uuid: &str) -> Result<VmObject> {
        if let Some(reason) = self.enter(FacadeOp::Load).await {
            return Err(CycleError::VmLoadFailed { vm_id: uuid.to_string(), reason });
        }

        self.inner
            .lock()
            .await
            .vms
            .get(uuid)
            .cloned()
            .ok_or_else(|| CycleError::VmNotFound { vm_id: uuid.to_string() })
    }

    #[instrument(skip(self), fields(backend = "simulated"))]
    async fn start(&self, uuid: &str, _options: &VmOptions) -> Result<()> {
        if let Some(reason) = self.enter(FacadeOp::Start).await {
            return Err(CycleError::VmStartFailed { vm_id: uuid.to_string(), reason });
        }

        self.transition(uuid, "start", VmState::Stopped, VmState::Running).await
    }

    #[instrument(skip(self), fields(backend = "simulated"))]
    async fn stop(&self, uuid: &str, _options: &VmOptions) -> Result<()> {
        if let Some(reason) = self.enter(FacadeOp::Stop).await {
            return Err(CycleError::VmStopFailed { vm_id: uuid.to_string(), reason });
        }

        self.transition(uuid, "stop", VmState::Running, VmState::Stopped).await
    }

    #[instrument(skip(self, spec), fields(backend = "simulated", alias = %spec.alias))]
    async fn create(&self, spec: &ProvisionSpec) -> Result<String> {
        if let Some(reason) = self.enter(FacadeOp::Create).await {
            return Err(CycleError::VmCreateFailed { image_uuid: spec.image_uuid.clone(), reason });
        }

        let uuid = uuid::Uuid::new_v4().to_string();
        let vm = VmObject {
            uuid: uuid.clone(),
            alias: Some(spec.alias.clone()),
            brand: Some(spec.brand.clone()),
            state: if spec.autoboot { VmState::Running } else { VmState::Stopped },
            image_uuid: Some(spec.image_uuid.clone()),
            autoboot: spec.autoboot,
        };

        self.inner.lock().await.vms.insert(uuid.clone(), vm);
        debug!(vm_id = %uuid, "Simulated VM created");
        Ok(uuid)
    }

    #[instrument(skip(self), fields(backend = "simulated"))]
    async fn delete(&self, uuid: &str) -> Result<()> {
        if let Some(reason) = self.enter(FacadeOp::Delete).await {
            return Err(CycleError::VmDeleteFailed { vm_id: uuid.to_string(), reason });
        }

        self.inner
            .lock()
            .await
            .vms
            .remove(uuid)
            .map(|_| ())
            .ok_or_else(|| CycleError::VmNotFound { vm_id: uuid.to_string() })
    }

    #[instrument(skip(self), fields(backend = "simulated"))]
    async fn lookup_alias(&self, alias: &str) -> Result<Vec<String>> {
        if let Some(reason) = self.enter(FacadeOp::Lookup).await {
            return Err(CycleError::VmLookupFailed { alias: alias.to_string(), reason });
        }

        let inner = self.inner.lock().await;
        let mut found: Vec<String> = inner
            .vms
            .values()
            .filter(|vm| vm.alias.as_deref() == Some(alias))
            .map(|vm| vm.uuid.clone())
            .collect();
        found.sort();
        Ok(found)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
