//! Inference-server workload: vLLM under systemd.
//!
//! Two install procedures exist in the fleet and neither supersedes the
//! other: a source build for targets tracking upstream, and a pinned package
//! manifest for reproducible templates. Both produce the same durable marker
//! (the venv python can import vllm), so the rest of the pipeline treats them
//! identically.

use super::{exec_sh, exec_step, unit_logs, ServiceInstaller};
use crate::error::ProvisionError;
use crate::runtime::RuntimeClient;
use async_trait::async_trait;
use tera::{Context, Tera};

/// Default API listen port, also the health probe target.
pub const DEFAULT_PORT: u16 = 8000;
/// Health endpoint served by the OpenAI-compatible API server.
pub const HEALTH_PATH: &str = "/health";

const VLLM_DIR: &str = "/opt/vllm";
const VENV_DIR: &str = "/opt/vllm/venv";
const SRC_DIR: &str = "/opt/vllm/src";
const REPO_URL: &str = "https://github.com/vllm-project/vllm.git";

/// Pinned package set for the manifest variant.
const PINNED_PACKAGES: &[&str] = &["vllm==0.5.4", "huggingface-hub==0.24.5"];

const UNIT_TEMPLATE: &str = "\
[Unit]
Description=vLLM inference server
After=network-online.target

[Service]
ExecStart={{ venv }}/bin/python -m vllm.entrypoints.openai.api_server --host 0.0.0.0 --port {{ port }}
Restart=on-failure
RestartSec=5

[Install]
WantedBy=multi-user.target
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VllmInstallMode {
    /// git clone + editable install from source
    SourceBuild,
    /// pinned package manifest
    PinnedManifest,
}

pub struct VllmInstaller {
    mode: VllmInstallMode,
    port: u16,
}

impl VllmInstaller {
    pub fn new(mode: VllmInstallMode, port: u16) -> Self {
        Self { mode, port }
    }

    /// Render the systemd unit for this installer's listen port.
    pub fn render_unit(&self) -> Result<String, ProvisionError> {
        let mut tera = Tera::default();
        tera.add_raw_template("vllm/vllm.service", UNIT_TEMPLATE)
            .map_err(|e| ProvisionError::Runtime(format!("unit template: {e}")))?;
        let mut ctx = Context::new();
        ctx.insert("venv", VENV_DIR);
        ctx.insert("port", &self.port);
        tera.render("vllm/vllm.service", &ctx)
            .map_err(|e| ProvisionError::Runtime(format!("unit render: {e}")))
    }
}

#[async_trait]
impl ServiceInstaller for VllmInstaller {
    fn workload(&self) -> &'static str {
        "vllm"
    }

    async fn is_installed(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<bool, ProvisionError> {
        let script = format!(
            "test -x {VENV_DIR}/bin/python && {VENV_DIR}/bin/python -c 'import vllm'"
        );
        let out = exec_sh(runtime, ctid, &script).await?;
        Ok(out.success())
    }

    async fn install(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<(), ProvisionError> {
        tracing::info!(
            "[VllmInstaller] Installing vllm ({:?}) in container {}",
            self.mode,
            ctid
        );
        exec_step(
            runtime,
            ctid,
            "install build prerequisites",
            "apt-get update -qq && DEBIAN_FRONTEND=noninteractive \
             apt-get install -y -qq git python3 python3-venv",
        )
        .await?;
        exec_step(
            runtime,
            ctid,
            "create venv",
            &format!("mkdir -p {VLLM_DIR} && python3 -m venv {VENV_DIR}"),
        )
        .await?;

        match self.mode {
            VllmInstallMode::SourceBuild => {
                exec_step(
                    runtime,
                    ctid,
                    "clone vllm source",
                    &format!(
                        "test -d {SRC_DIR}/.git || git clone --depth 1 {REPO_URL} {SRC_DIR}"
                    ),
                )
                .await?;
                exec_step(
                    runtime,
                    ctid,
                    "pip install from source",
                    &format!("{VENV_DIR}/bin/pip install -e {SRC_DIR}"),
                )
                .await
            }
            VllmInstallMode::PinnedManifest => {
                exec_step(
                    runtime,
                    ctid,
                    "pip install pinned manifest",
                    &format!(
                        "{VENV_DIR}/bin/pip install {}",
                        PINNED_PACKAGES.join(" ")
                    ),
                )
                .await
            }
        }
    }

    async fn configure(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<(), ProvisionError> {
        let unit = self.render_unit()?;
        tracing::info!(
            "[VllmInstaller] Writing vllm.service (port {}) in container {}",
            self.port,
            ctid
        );
        let script = format!(
            "cat > /etc/systemd/system/vllm.service <<'VLLM_UNIT'\n{unit}VLLM_UNIT\n\
             systemctl daemon-reload"
        );
        exec_step(runtime, ctid, "write vllm unit", &script).await
    }

    async fn manage_service(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<(), ProvisionError> {
        let out = exec_sh(
            runtime,
            ctid,
            "systemctl enable vllm && systemctl restart vllm",
        )
        .await?;
        if !out.success() {
            let logs = self.service_logs(runtime, ctid).await;
            tracing::error!(
                "[VllmInstaller] vllm restart failed in {} (exit {}), recent logs:\n{}",
                ctid,
                out.exit_code,
                logs
            );
            return Err(ProvisionError::InstallFailed {
                ctid,
                reason: format!("vllm restart failed (exit {})", out.exit_code),
            });
        }
        Ok(())
    }

    async fn service_logs(&self, runtime: &dyn RuntimeClient, ctid: u32) -> String {
        unit_logs(runtime, ctid, "vllm").await
    }
}
