//! Idempotent LXC provisioning core
//!
//! This crate drives a target container through a declarative lifecycle:
//! clone from a template snapshot, apply target settings, install a workload,
//! verify it responds, optionally freeze the result as a new snapshot.
//! Provisioning state is never stored — every run re-derives it from
//! runtime-observable facts, so any workflow can be re-run after a crash or
//! partial failure and resumes at the first unmet postcondition.

pub mod command;
pub mod config;
pub mod error;
pub mod health;
pub mod installer;
pub mod orchestrator;
pub mod retry;
pub mod runtime;

pub use command::{build_clone_spec, build_network_spec, CloneSpec, NetworkSpec};
pub use config::{Catalog, NetworkConfig, SourceRef, TargetConfig};
pub use error::ProvisionError;
pub use health::{HealthChecker, HttpProbe, Probe, ProbeOutcome};
pub use installer::{NginxInstaller, ServiceInstaller, VllmInstallMode, VllmInstaller};
pub use orchestrator::{LifecycleOrchestrator, ProvisionPlan, ProvisionState};
pub use retry::RetryPolicy;
pub use runtime::{CtStatus, ExecOutput, PctClient, RuntimeClient};
