//! Lifecycle state machine: detect current state, decide the next action,
//! perform it, re-validate before advancing.
//!
//! Provisioning state is re-derived from runtime-observable facts (container
//! existence, snapshot names, workload markers) at the start of every stage,
//! never trusted from memory. Re-running a workflow after any partial failure
//! therefore resumes at the first unmet postcondition, and an interrupted run
//! can always be safely restarted from the top.

use crate::command::{build_clone_spec, build_network_spec};
use crate::config::{SourceRef, TargetConfig};
use crate::error::ProvisionError;
use crate::health::{HealthChecker, Probe};
use crate::installer::ServiceInstaller;
use crate::retry::RetryPolicy;
use crate::runtime::RuntimeClient;
use std::sync::Arc;

/// Derived provisioning state for a target. Transitions are monotonic
/// forward within one run; variant order is the lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProvisionState {
    Absent,
    Cloned,
    NetworkConfigured,
    WorkloadInstalled,
    Verified,
    Snapshotted,
}

/// Everything one orchestration run needs, resolved up front.
pub struct ProvisionPlan {
    pub target: TargetConfig,
    /// Template to clone from. `None` for workflows that require the target
    /// to already exist.
    pub source: Option<SourceRef>,
    pub workload: Option<Arc<dyn ServiceInstaller>>,
    /// Health probe gating success; `None` when the workload exposes no
    /// network-reachable health signal.
    pub probe: Option<Arc<dyn Probe>>,
    /// Freeze the result as this snapshot (template-finalization workflows).
    pub finalize_snapshot: Option<String>,
}

impl ProvisionPlan {
    pub fn validate(&self) -> Result<(), ProvisionError> {
        self.target.validate()?;
        if let Some(source) = &self.source {
            source.validate()?;
            if source.source_ctid == self.target.ctid {
                return Err(ProvisionError::ConfigInvalid {
                    field: "ctid".to_string(),
                    reason: "target must differ from the clone source".to_string(),
                });
            }
        }
        if matches!(&self.finalize_snapshot, Some(name) if name.is_empty()) {
            return Err(ProvisionError::ConfigInvalid {
                field: "finalize_snapshot".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

pub struct LifecycleOrchestrator {
    runtime: Arc<dyn RuntimeClient>,
    waiter: RetryPolicy,
    checker: HealthChecker,
}

impl LifecycleOrchestrator {
    pub fn new(runtime: Arc<dyn RuntimeClient>) -> Self {
        Self::with_policies(
            runtime,
            RetryPolicy::state_wait_default(),
            RetryPolicy::health_default(),
        )
    }

    pub fn with_policies(
        runtime: Arc<dyn RuntimeClient>,
        state_wait: RetryPolicy,
        health: RetryPolicy,
    ) -> Self {
        Self {
            runtime,
            waiter: state_wait,
            checker: HealthChecker::new(health),
        }
    }

    /// Derive the target's current state from runtime-observable facts.
    pub async fn detect_state(
        &self,
        plan: &ProvisionPlan,
    ) -> Result<ProvisionState, ProvisionError> {
        let ctid = plan.target.ctid;
        let status = self.runtime.status(ctid).await?;
        if !status.exists {
            return Ok(ProvisionState::Absent);
        }
        if let Some(snapshot) = &plan.finalize_snapshot {
            let snapshots = self.runtime.snapshot_list(ctid).await?;
            if snapshots.iter().any(|s| s == snapshot) {
                return Ok(ProvisionState::Snapshotted);
            }
        }
        if let Some(installer) = &plan.workload {
            if installer.is_installed(self.runtime.as_ref(), ctid).await? {
                return Ok(ProvisionState::WorkloadInstalled);
            }
        }
        Ok(ProvisionState::Cloned)
    }

    /// Drive the plan to its terminal state. Idempotent: every stage probes
    /// its postcondition first and performs no side effect when it already
    /// holds.
    pub async fn run(&self, plan: &ProvisionPlan) -> Result<ProvisionState, ProvisionError> {
        plan.validate()?;
        let ctid = plan.target.ctid;

        let mut state = self.detect_state(plan).await?;
        tracing::info!("[Orchestrator] Container {} detected state: {:?}", ctid, state);

        // Completion marker present: the whole run is a no-op.
        let complete = match state {
            ProvisionState::Snapshotted => true,
            ProvisionState::WorkloadInstalled => plan.finalize_snapshot.is_none(),
            _ => false,
        };
        if complete {
            tracing::info!(
                "[Orchestrator] Container {} already provisioned; nothing to do",
                ctid
            );
            return Ok(state);
        }

        // Absent -> Cloned
        if state == ProvisionState::Absent {
            let source = plan.source.as_ref().ok_or_else(|| {
                ProvisionError::Runtime(format!(
                    "container {ctid} does not exist and the plan has no clone source"
                ))
            })?;
            self.ensure_source(source).await?;
            let spec = build_clone_spec(&plan.target, source);
            tracing::info!(
                "[Orchestrator] Cloning {}@{} into {} ({})",
                source.source_ctid,
                source.snapshot_name,
                ctid,
                spec.hostname
            );
            let out = self.runtime.clone_container(&spec).await?;
            if !out.success() {
                tracing::error!(
                    "[Orchestrator] Clone failed (exit {}): {}",
                    out.exit_code,
                    out.last_stderr_line()
                );
                return Err(ProvisionError::CloneFailed {
                    source_ctid: source.source_ctid,
                    target: ctid,
                    exit_code: out.exit_code,
                });
            }
            let observed = self.runtime.status(ctid).await?;
            if !observed.exists {
                return Err(ProvisionError::Runtime(format!(
                    "clone reported success but container {ctid} does not exist"
                )));
            }
            state = state.max(ProvisionState::Cloned);
        }

        // Cloned -> NetworkConfigured. The runtime surface has no config
        // read-back, so the value is reapplied on re-runs; setting an
        // identical value is change-free.
        if let Some(netspec) = build_network_spec(&plan.target) {
            tracing::info!(
                "[Orchestrator] Setting {} on {}: {}",
                netspec.key,
                ctid,
                netspec.value
            );
            let out = self
                .runtime
                .set_property(ctid, &netspec.key, &netspec.value)
                .await?;
            if !out.success() {
                return Err(ProvisionError::PostCloneConfigFailed {
                    ctid,
                    reason: format!(
                        "set {} failed (exit {}): {}",
                        netspec.key,
                        out.exit_code,
                        out.last_stderr_line()
                    ),
                });
            }
            state = state.max(ProvisionState::NetworkConfigured);
        }

        // NetworkConfigured -> WorkloadInstalled
        if let Some(installer) = &plan.workload {
            self.ensure_running(ctid).await?;
            let runtime = self.runtime.as_ref();
            if installer.is_installed(runtime, ctid).await? {
                tracing::info!(
                    "[Orchestrator] Workload {} already installed in {}; skipping install",
                    installer.workload(),
                    ctid
                );
            } else {
                installer.install(runtime, ctid).await?;
                if !installer.is_installed(runtime, ctid).await? {
                    return Err(ProvisionError::InstallFailed {
                        ctid,
                        reason: format!(
                            "{} install completed but its marker is still absent",
                            installer.workload()
                        ),
                    });
                }
            }
            installer.configure(runtime, ctid).await?;
            installer.manage_service(runtime, ctid).await?;
            state = state.max(ProvisionState::WorkloadInstalled);
        }

        // WorkloadInstalled -> Verified
        if let Some(probe) = &plan.probe {
            if let Err(err) = self.checker.probe(probe.as_ref()).await {
                if let Some(installer) = &plan.workload {
                    let logs = installer.service_logs(self.runtime.as_ref(), ctid).await;
                    tracing::error!(
                        "[Orchestrator] Health check failed; recent {} logs:\n{}",
                        installer.workload(),
                        logs
                    );
                }
                return Err(err);
            }
            state = state.max(ProvisionState::Verified);
        }

        // Verified -> Snapshotted
        if let Some(snapshot) = &plan.finalize_snapshot {
            state = self.finalize(ctid, snapshot).await?;
        }

        Ok(state)
    }

    /// Freeze the target as `snapshot_name`: shutdown, poll stopped, create
    /// the snapshot, restart, poll running. No-op when the snapshot already
    /// exists.
    pub async fn finalize(
        &self,
        ctid: u32,
        snapshot_name: &str,
    ) -> Result<ProvisionState, ProvisionError> {
        let status = self.runtime.status(ctid).await?;
        if !status.exists {
            return Err(ProvisionError::Runtime(format!(
                "container {ctid} does not exist"
            )));
        }
        let snapshots = self.runtime.snapshot_list(ctid).await?;
        if snapshots.iter().any(|s| s == snapshot_name) {
            tracing::info!(
                "[Orchestrator] Snapshot '{}' of {} already exists; nothing to do",
                snapshot_name,
                ctid
            );
            return Ok(ProvisionState::Snapshotted);
        }

        if status.running {
            tracing::info!("[Orchestrator] Shutting down {} for snapshot", ctid);
            let out = self.runtime.shutdown(ctid).await?;
            if !out.success() {
                return Err(ProvisionError::Runtime(format!(
                    "shutdown {} failed (exit {}): {}",
                    ctid,
                    out.exit_code,
                    out.last_stderr_line()
                )));
            }
            self.wait_until(ctid, false).await?;
        }

        tracing::info!("[Orchestrator] Creating snapshot '{}' of {}", snapshot_name, ctid);
        let out = self.runtime.snapshot_create(ctid, snapshot_name).await?;
        if !out.success() {
            return Err(ProvisionError::SnapshotFailed {
                ctid,
                name: snapshot_name.to_string(),
                exit_code: out.exit_code,
            });
        }

        let out = self.runtime.start(ctid).await?;
        if !out.success() {
            return Err(ProvisionError::Runtime(format!(
                "start {} failed (exit {}): {}",
                ctid,
                out.exit_code,
                out.last_stderr_line()
            )));
        }
        self.wait_until(ctid, true).await?;
        Ok(ProvisionState::Snapshotted)
    }

    /// Verify the source template and its named snapshot exist.
    async fn ensure_source(&self, source: &SourceRef) -> Result<(), ProvisionError> {
        let not_found = || ProvisionError::SourceNotFound {
            ctid: source.source_ctid,
            snapshot: source.snapshot_name.clone(),
        };
        let status = self.runtime.status(source.source_ctid).await?;
        if !status.exists {
            return Err(not_found());
        }
        let snapshots = self.runtime.snapshot_list(source.source_ctid).await?;
        if !snapshots.iter().any(|s| s == &source.snapshot_name) {
            return Err(not_found());
        }
        Ok(())
    }

    /// Start the target if it is not running; in-container steps need it up.
    async fn ensure_running(&self, ctid: u32) -> Result<(), ProvisionError> {
        let status = self.runtime.status(ctid).await?;
        if status.running {
            return Ok(());
        }
        tracing::info!("[Orchestrator] Starting container {}", ctid);
        let out = self.runtime.start(ctid).await?;
        if !out.success() {
            return Err(ProvisionError::Runtime(format!(
                "start {} failed (exit {}): {}",
                ctid,
                out.exit_code,
                out.last_stderr_line()
            )));
        }
        self.wait_until(ctid, true).await
    }

    /// Bounded status poll until the target reaches the wanted run state.
    async fn wait_until(&self, ctid: u32, want_running: bool) -> Result<(), ProvisionError> {
        let policy = self.waiter;
        for attempt in 1..=policy.max_attempts {
            let status = self.runtime.status(ctid).await?;
            if status.exists && status.running == want_running {
                return Ok(());
            }
            tracing::debug!(
                "[Orchestrator] Waiting for {} to be {} (attempt {}/{})",
                ctid,
                if want_running { "running" } else { "stopped" },
                attempt,
                policy.max_attempts
            );
            if attempt < policy.max_attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }
        let timeout_secs = policy.total_budget().as_secs();
        Err(if want_running {
            ProvisionError::StartTimeout { ctid, timeout_secs }
        } else {
            ProvisionError::ShutdownTimeout { ctid, timeout_secs }
        })
    }
}
