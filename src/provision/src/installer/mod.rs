//! Pluggable per-workload install steps.
//!
//! Each workload implements the same contract so the orchestrator never
//! needs workload-specific knowledge. `is_installed` must check a durable
//! signal (installed package plus expected path, not a bare directory) —
//! it doubles as the completion marker for the orchestrator's short-circuit.

use crate::error::ProvisionError;
use crate::runtime::{ExecOutput, RuntimeClient};
use async_trait::async_trait;

pub mod nginx;
pub mod vllm;

pub use nginx::NginxInstaller;
pub use vllm::{VllmInstallMode, VllmInstaller};

#[async_trait]
pub trait ServiceInstaller: Send + Sync {
    /// Short workload name used in logs.
    fn workload(&self) -> &'static str;

    /// Durable installed-workload check.
    async fn is_installed(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<bool, ProvisionError>;

    async fn install(&self, runtime: &dyn RuntimeClient, ctid: u32)
        -> Result<(), ProvisionError>;

    /// Generate and apply the workload's configuration, replacing any
    /// conflicting defaults.
    async fn configure(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<(), ProvisionError>;

    /// Enable and restart the managed unit.
    async fn manage_service(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<(), ProvisionError>;

    /// Recent service log tail for diagnostics; best effort.
    async fn service_logs(&self, runtime: &dyn RuntimeClient, ctid: u32) -> String;
}

/// Run a shell snippet inside the container.
pub(crate) async fn exec_sh(
    runtime: &dyn RuntimeClient,
    ctid: u32,
    script: &str,
) -> Result<ExecOutput, ProvisionError> {
    runtime
        .exec(
            ctid,
            &["sh".to_string(), "-lc".to_string(), script.to_string()],
        )
        .await
}

/// Run a shell snippet and classify a non-zero exit as `InstallFailed`.
pub(crate) async fn exec_step(
    runtime: &dyn RuntimeClient,
    ctid: u32,
    step: &str,
    script: &str,
) -> Result<(), ProvisionError> {
    let out = exec_sh(runtime, ctid, script).await?;
    if !out.success() {
        return Err(ProvisionError::InstallFailed {
            ctid,
            reason: format!(
                "{} (exit {}): {}",
                step,
                out.exit_code,
                out.last_stderr_line()
            ),
        });
    }
    Ok(())
}

/// `journalctl` tail for a unit, exec'd inside the container.
pub(crate) async fn unit_logs(runtime: &dyn RuntimeClient, ctid: u32, unit: &str) -> String {
    let script = format!("journalctl -u {unit} -n 50 --no-pager");
    match exec_sh(runtime, ctid, &script).await {
        Ok(out) if out.success() && !out.stdout.is_empty() => out.stdout,
        _ => String::from("(service logs not available)"),
    }
}
