//! RuntimeClient — thin capability surface over the container runtime CLI.
//!
//! Command-level operations return an `ExecOutput`; the orchestrator inspects
//! the exit code and classifies failures. Errors from this layer itself mean
//! the tool could not be invoked at all.

use crate::command::CloneSpec;
use crate::error::ProvisionError;
use async_trait::async_trait;
use tokio::process::Command;

/// Observed container status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtStatus {
    pub exists: bool,
    pub running: bool,
}

/// Captured output of a runtime invocation or in-container exec.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last stderr line, for compact diagnostics.
    pub fn last_stderr_line(&self) -> &str {
        self.stderr.lines().last().unwrap_or("no output available")
    }
}

/// Container lifecycle operations consumed by the orchestrator.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    async fn status(&self, ctid: u32) -> Result<CtStatus, ProvisionError>;

    /// Clone the source snapshot into the target and apply the spec's
    /// settings (hostname, memory, cores, features, unprivileged flag).
    async fn clone_container(&self, spec: &CloneSpec) -> Result<ExecOutput, ProvisionError>;

    async fn set_property(
        &self,
        ctid: u32,
        key: &str,
        value: &str,
    ) -> Result<ExecOutput, ProvisionError>;

    async fn snapshot_list(&self, ctid: u32) -> Result<Vec<String>, ProvisionError>;

    async fn snapshot_create(&self, ctid: u32, name: &str)
        -> Result<ExecOutput, ProvisionError>;

    async fn shutdown(&self, ctid: u32) -> Result<ExecOutput, ProvisionError>;

    async fn start(&self, ctid: u32) -> Result<ExecOutput, ProvisionError>;

    /// Execute a command inside the container.
    async fn exec(&self, ctid: u32, cmd: &[String]) -> Result<ExecOutput, ProvisionError>;
}

/// `pct`-backed runtime client.
pub struct PctClient {
    pct_bin: String,
}

impl PctClient {
    pub fn new() -> Self {
        Self {
            pct_bin: "pct".to_string(),
        }
    }

    /// Use a non-default `pct` binary (e.g., a wrapper on the host).
    pub fn with_binary(pct_bin: impl Into<String>) -> Self {
        Self {
            pct_bin: pct_bin.into(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<ExecOutput, ProvisionError> {
        tracing::debug!("[PctClient] {} {}", self.pct_bin, args.join(" "));
        let output = Command::new(&self.pct_bin)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                ProvisionError::Runtime(format!("failed to invoke {}: {}", self.pct_bin, e))
            })?;
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

impl Default for PctClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuntimeClient for PctClient {
    async fn status(&self, ctid: u32) -> Result<CtStatus, ProvisionError> {
        let out = self
            .run(&["status".to_string(), ctid.to_string()])
            .await?;
        // A missing container makes `pct status` fail; that is the only
        // existence signal the tool exposes.
        if !out.success() {
            return Ok(CtStatus {
                exists: false,
                running: false,
            });
        }
        Ok(CtStatus {
            exists: true,
            running: out.stdout.contains("running"),
        })
    }

    async fn clone_container(&self, spec: &CloneSpec) -> Result<ExecOutput, ProvisionError> {
        let clone_args = vec![
            "clone".to_string(),
            spec.source_ctid.to_string(),
            spec.target_ctid.to_string(),
            "--snapname".to_string(),
            spec.snapshot_name.clone(),
            "--hostname".to_string(),
            spec.hostname.clone(),
            "--storage".to_string(),
            spec.storage.clone(),
            "--full".to_string(),
        ];
        let cloned = self.run(&clone_args).await?;
        if !cloned.success() {
            return Ok(cloned);
        }

        let mut set_args = vec![
            "set".to_string(),
            spec.target_ctid.to_string(),
            "-memory".to_string(),
            spec.memory_mb.to_string(),
            "-cores".to_string(),
            spec.cores.to_string(),
            "-unprivileged".to_string(),
            spec.unprivileged.to_string(),
        ];
        if !spec.features.is_empty() {
            set_args.push("-features".to_string());
            set_args.push(spec.features.join(","));
        }
        self.run(&set_args).await
    }

    async fn set_property(
        &self,
        ctid: u32,
        key: &str,
        value: &str,
    ) -> Result<ExecOutput, ProvisionError> {
        self.run(&[
            "set".to_string(),
            ctid.to_string(),
            format!("-{key}"),
            value.to_string(),
        ])
        .await
    }

    async fn snapshot_list(&self, ctid: u32) -> Result<Vec<String>, ProvisionError> {
        let out = self
            .run(&["listsnapshot".to_string(), ctid.to_string()])
            .await?;
        if !out.success() {
            return Err(ProvisionError::Runtime(format!(
                "listsnapshot {} failed (exit {}): {}",
                ctid,
                out.exit_code,
                out.last_stderr_line()
            )));
        }
        Ok(parse_snapshot_list(&out.stdout))
    }

    async fn snapshot_create(
        &self,
        ctid: u32,
        name: &str,
    ) -> Result<ExecOutput, ProvisionError> {
        self.run(&[
            "snapshot".to_string(),
            ctid.to_string(),
            name.to_string(),
        ])
        .await
    }

    async fn shutdown(&self, ctid: u32) -> Result<ExecOutput, ProvisionError> {
        self.run(&["shutdown".to_string(), ctid.to_string()]).await
    }

    async fn start(&self, ctid: u32) -> Result<ExecOutput, ProvisionError> {
        self.run(&["start".to_string(), ctid.to_string()]).await
    }

    async fn exec(&self, ctid: u32, cmd: &[String]) -> Result<ExecOutput, ProvisionError> {
        let mut args = vec!["exec".to_string(), ctid.to_string(), "--".to_string()];
        args.extend_from_slice(cmd);
        self.run(&args).await
    }
}

/// Parse `pct listsnapshot` output. Lines look like
/// `` `-> snapname  <timestamp>  <description>``; the synthetic `current`
/// entry is not a snapshot.
pub fn parse_snapshot_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let marker = tokens.next()?;
            if !marker.ends_with("->") {
                return None;
            }
            let name = tokens.next()?;
            if name == "current" {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}
