//! `vmadm` backend for SmartOS hosts.
//!
//! Drives the stock `vmadm` tool as a subprocess:
//! - Load: `vmadm get <uuid>` (JSON on stdout)
//! - Start: `vmadm start <uuid>`
//! - Stop: `vmadm stop <uuid> [-F] [-t <secs>]`
//! - Create: `vmadm create` with the JSON payload on stdin
//! - Delete: `vmadm delete <uuid>`
//! - Lookup: `vmadm lookup alias=<alias>` (one UUID per line)

use crate::error::{CycleError, Result};
use crate::facade::VmFacade;
use crate::paths;
use crate::types::{ProvisionSpec, VmObject, VmOptions};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Marker `vmadm create` prints in front of the new VM's UUID.
const CREATED_MARKER: &str = "Successfully created VM ";

/// `vmadm` backend.
#[derive(Debug, Clone)]
pub struct VmadmFacade {
    /// Program to execute
    program: PathBuf,
    /// Arguments placed before every subcommand
    prefix_args: Vec<String>,
}

impl VmadmFacade {
    /// Create a backend using `binary_path`, or the first `vmadm` found in
    /// the usual locations.
    pub fn new(binary_path: Option<PathBuf>) -> Result<Self> {
        let program = match binary_path {
            Some(path) if path.exists() => path,
            Some(path) => {
                return Err(CycleError::BackendNotFound {
                    backend: "vmadm".to_string(),
                    hint: format!("{} does not exist", path.display()),
                })
            }
            None => Self::find_binary()?,
        };

        Ok(Self { program, prefix_args: Vec::new() })
    }

    /// Use an arbitrary command as `vmadm` (e.g., `sh fake-vmadm.sh`).
    pub fn with_command(program: impl Into<PathBuf>, prefix_args: Vec<String>) -> Self {
        Self { program: program.into(), prefix_args }
    }

    fn find_binary() -> Result<PathBuf> {
        paths::vmadm_candidates().into_iter().find(|path| path.exists()).ok_or_else(|| {
            CycleError::BackendNotFound {
                backend: "vmadm".to_string(),
                hint: "Set VMCYCLE_VMADM or use --backend simulated".to_string(),
            }
        })
    }

    /// Run `vmadm` with `args`, optionally feeding `stdin`.
    async fn run(&self, args: &[String], stdin: Option<&[u8]>) -> std::io::Result<Output> {
        debug!(program = %self.program.display(), ?args, "Running vmadm");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix_args)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            // A step dropped by the outer timeout must not keep vmadm running.
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input).await?;
                // Close stdin so vmadm sees EOF
                drop(pipe);
            }
        }

        child.wait_with_output().await
    }

    /// Run a subcommand that only reports success through its exit status.
    async fn run_checked(&self, args: Vec<String>) -> std::result::Result<Output, String> {
        match self.run(&args, None).await {
            Ok(output) if output.status.success() => Ok(output),
            Ok(output) => Err(failure_reason(&output)),
            Err(e) => Err(format!("Failed to spawn vmadm: {}", e)),
        }
    }
}

/// Human-readable reason for a failed invocation.
fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("vmadm exited with {}", output.status)
    } else {
        stderr.to_string()
    }
}

/// Extract the new VM's UUID from `vmadm create` output.
pub(crate) fn parse_created_uuid(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (_, rest) = line.split_once(CREATED_MARKER)?;
        let token = rest.split_whitespace().next()?;
        uuid::Uuid::parse_str(token).ok().map(|u| u.to_string())
    })
}

/// UUIDs listed by `vmadm lookup`, one per line.
pub(crate) fn parse_lookup(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| uuid::Uuid::parse_str(line.trim()).ok())
        .map(|u| u.to_string())
        .collect()
}

/// Build `vmadm stop` arguments.
pub(crate) fn stop_args(uuid: &str, options: &VmOptions) -> Vec<String> {
    let mut args = vec!["stop".to_string(), uuid.to_string()];
    if options.force {
        args.push("-F".to_string());
    }
    if let Some(timeout) = options.timeout {
        args.push("-t".to_string());
        args.push(timeout.as_secs().max(1).to_string());
    }
    args
}

#[async_trait]
impl VmFacade for VmadmFacade {
    #[instrument(skip(self), fields(backend = "vmadm"))]
    async fn load(&self, uuid: &str) -> Result<VmObject> {
        let output = self
            .run_checked(vec!["get".to_string(), uuid.to_string()])
            .await
            .map_err(|reason| CycleError::VmLoadFailed { vm_id: uuid.to_string(), reason })?;

        serde_json::from_slice(&output.stdout).map_err(|e| CycleError::VmLoadFailed {
            vm_id: uuid.to_string(),
            reason: format!("Invalid vmadm get output: {}", e),
        })
    }

    #[instrument(skip(self), fields(backend = "vmadm"))]
    async fn start(&self, uuid: &str, options: &VmOptions) -> Result<()> {
        if !options.is_empty() {
            debug!("vmadm start ignores timeout/force options");
        }

        let start = Instant::now();
        self.run_checked(vec!["start".to_string(), uuid.to_string()])
            .await
            .map_err(|reason| CycleError::VmStartFailed { vm_id: uuid.to_string(), reason })?;

        info!(duration_ms = start.elapsed().as_millis() as u64, "VM started");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "vmadm"))]
    async fn stop(&self, uuid: &str, options: &VmOptions) -> Result<()> {
        let start = Instant::now();
        self.run_checked(stop_args(uuid, options))
            .await
            .map_err(|reason| CycleError::VmStopFailed { vm_id: uuid.to_string(), reason })?;

        info!(duration_ms = start.elapsed().as_millis() as u64, "VM stopped");
        Ok(())
    }

    #[instrument(skip(self, spec), fields(backend = "vmadm", image_uuid = %spec.image_uuid))]
    async fn create(&self, spec: &ProvisionSpec) -> Result<String> {
        let create_failed = |reason: String| CycleError::VmCreateFailed {
            image_uuid: spec.image_uuid.clone(),
            reason,
        };

        let payload = serde_json::to_vec(spec).map_err(|e| create_failed(e.to_string()))?;
        let output = self
            .run(&["create".to_string()], Some(payload.as_slice()))
            .await
            .map_err(|e| create_failed(format!("Failed to spawn vmadm: {}", e)))?;

        if !output.status.success() {
            return Err(create_failed(failure_reason(&output)));
        }

        // vmadm reports the UUID on stderr; accept stdout too.
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let uuid = parse_created_uuid(&stderr)
            .or_else(|| parse_created_uuid(&stdout))
            .ok_or_else(|| {
                warn!(%stderr, %stdout, "vmadm create succeeded without reporting a UUID");
                create_failed("No VM UUID in vmadm create output".to_string())
            })?;

        info!(vm_id = %uuid, alias = %spec.alias, "VM created");
        Ok(uuid)
    }

    #[instrument(skip(self), fields(backend = "vmadm"))]
    async fn delete(&self, uuid: &str) -> Result<()> {
        self.run_checked(vec!["delete".to_string(), uuid.to_string()])
            .await
            .map_err(|reason| CycleError::VmDeleteFailed { vm_id: uuid.to_string(), reason })?;

        info!("VM deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "vmadm"))]
    async fn lookup_alias(&self, alias: &str) -> Result<Vec<String>> {
        let output = self
            .run_checked(vec!["lookup".to_string(), format!("alias={}", alias)])
            .await
            .map_err(|reason| CycleError::VmLookupFailed { alias: alias.to_string(), reason })?;

        Ok(parse_lookup(&String::from_utf8_lossy(&output.stdout)))
    }

    fn name(&self) -> &str {
        "vmadm"
    }
}
