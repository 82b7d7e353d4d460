//! Provisioning error taxonomy
//!
//! Every stage failure is fatal to the run; there is no rollback. The next
//! invocation resumes via the orchestrator's postcondition re-checks instead.
//! `exit_code` is the single place an error kind maps to a process exit code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("invalid config field '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    #[error("source container {ctid} or snapshot '{snapshot}' not found")]
    SourceNotFound { ctid: u32, snapshot: String },

    #[error("clone of {source_ctid} into {target} failed (exit {exit_code})")]
    CloneFailed {
        source_ctid: u32,
        target: u32,
        exit_code: i32,
    },

    #[error("post-clone configuration of {ctid} failed: {reason}")]
    PostCloneConfigFailed { ctid: u32, reason: String },

    #[error("workload install on {ctid} failed: {reason}")]
    InstallFailed { ctid: u32, reason: String },

    #[error("health check against {url} failed after {attempts} attempts")]
    HealthCheckFailed { url: String, attempts: u32 },

    #[error("container {ctid} did not stop within {timeout_secs}s")]
    ShutdownTimeout { ctid: u32, timeout_secs: u64 },

    #[error("container {ctid} did not start within {timeout_secs}s")]
    StartTimeout { ctid: u32, timeout_secs: u64 },

    #[error("snapshot '{name}' of {ctid} failed (exit {exit_code})")]
    SnapshotFailed {
        ctid: u32,
        name: String,
        exit_code: i32,
    },

    #[error("runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    /// Name of the stage that produced this error, for the terminal
    /// diagnostic line.
    pub fn stage(&self) -> &'static str {
        match self {
            ProvisionError::ConfigInvalid { .. } => "config resolution",
            ProvisionError::SourceNotFound { .. } => "source check",
            ProvisionError::CloneFailed { .. } => "clone",
            ProvisionError::PostCloneConfigFailed { .. } => "post-clone config",
            ProvisionError::InstallFailed { .. } => "workload install",
            ProvisionError::HealthCheckFailed { .. } => "health check",
            ProvisionError::ShutdownTimeout { .. } => "shutdown wait",
            ProvisionError::StartTimeout { .. } => "start wait",
            ProvisionError::SnapshotFailed { .. } => "snapshot",
            ProvisionError::Runtime(_) => "runtime",
            ProvisionError::Io(_) => "io",
        }
    }

    /// Stable process exit code, uniform across the workflow binaries.
    ///
    /// 0 success / idempotent no-op, 1 unclassified, 2 invalid arguments,
    /// 3 source or snapshot not found, 4 primary action failed, 5 post-action
    /// configuration or verification failed, 6 shutdown/start timeout.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::ConfigInvalid { .. } => 2,
            ProvisionError::SourceNotFound { .. } => 3,
            ProvisionError::CloneFailed { .. }
            | ProvisionError::InstallFailed { .. }
            | ProvisionError::SnapshotFailed { .. } => 4,
            ProvisionError::PostCloneConfigFailed { .. }
            | ProvisionError::HealthCheckFailed { .. } => 5,
            ProvisionError::ShutdownTimeout { .. } | ProvisionError::StartTimeout { .. } => 6,
            ProvisionError::Runtime(_) | ProvisionError::Io(_) => 1,
        }
    }
}
