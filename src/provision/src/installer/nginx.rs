//! Reverse-proxy workload: nginx fronting a single backend.
//!
//! `configure` renders a server block from the backend target and installs it
//! as the only enabled site; the distribution default site would shadow it on
//! port 80 and is removed.

use super::{exec_sh, exec_step, unit_logs, ServiceInstaller};
use crate::error::ProvisionError;
use crate::runtime::RuntimeClient;
use async_trait::async_trait;
use tera::{Context, Tera};

const SITE_TEMPLATE: &str = "\
server {
    listen 80 default_server;
    server_name {{ server_name }};

    location / {
        proxy_pass http://{{ backend_ip }}:{{ backend_port }};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
    }
}
";

/// Port the generated server block listens on.
pub const LISTEN_PORT: u16 = 80;

const SITES_AVAILABLE: &str = "/etc/nginx/sites-available";
const SITES_ENABLED: &str = "/etc/nginx/sites-enabled";

pub struct NginxInstaller {
    site_name: String,
    backend_ip: String,
    backend_port: u16,
}

impl NginxInstaller {
    pub fn new(
        site_name: impl Into<String>,
        backend_ip: impl Into<String>,
        backend_port: u16,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            backend_ip: backend_ip.into(),
            backend_port,
        }
    }

    /// Render the server block for this installer's backend.
    pub fn render_site(&self) -> Result<String, ProvisionError> {
        let mut tera = Tera::default();
        tera.add_raw_template("nginx/site.conf", SITE_TEMPLATE)
            .map_err(|e| ProvisionError::Runtime(format!("site template: {e}")))?;
        let mut ctx = Context::new();
        ctx.insert("server_name", &self.site_name);
        ctx.insert("backend_ip", &self.backend_ip);
        ctx.insert("backend_port", &self.backend_port);
        tera.render("nginx/site.conf", &ctx)
            .map_err(|e| ProvisionError::Runtime(format!("site render: {e}")))
    }
}

#[async_trait]
impl ServiceInstaller for NginxInstaller {
    fn workload(&self) -> &'static str {
        "nginx"
    }

    async fn is_installed(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<bool, ProvisionError> {
        // Package state plus the expected tree; a leftover directory alone
        // must not count as installed.
        let out = exec_sh(
            runtime,
            ctid,
            "dpkg-query -W -f='${Status}' nginx 2>/dev/null | grep -q 'install ok installed' \
             && test -d /etc/nginx",
        )
        .await?;
        Ok(out.success())
    }

    async fn install(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<(), ProvisionError> {
        tracing::info!("[NginxInstaller] Installing nginx in container {}", ctid);
        exec_step(
            runtime,
            ctid,
            "apt install nginx",
            "apt-get update -qq && DEBIAN_FRONTEND=noninteractive apt-get install -y -qq nginx",
        )
        .await
    }

    async fn configure(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<(), ProvisionError> {
        let site = self.render_site()?;
        tracing::info!(
            "[NginxInstaller] Writing site '{}' (backend {}:{}) in container {}",
            self.site_name,
            self.backend_ip,
            self.backend_port,
            ctid
        );
        let script = format!(
            "cat > {SITES_AVAILABLE}/{name} <<'NGINX_SITE'\n{site}NGINX_SITE\n\
             ln -sf {SITES_AVAILABLE}/{name} {SITES_ENABLED}/{name} && \
             rm -f {SITES_ENABLED}/default && \
             nginx -t",
            name = self.site_name,
        );
        exec_step(runtime, ctid, "write nginx site", &script).await
    }

    async fn manage_service(
        &self,
        runtime: &dyn RuntimeClient,
        ctid: u32,
    ) -> Result<(), ProvisionError> {
        let out = exec_sh(
            runtime,
            ctid,
            "systemctl enable nginx && systemctl restart nginx",
        )
        .await?;
        if !out.success() {
            let logs = self.service_logs(runtime, ctid).await;
            tracing::error!(
                "[NginxInstaller] nginx restart failed in {} (exit {}), recent logs:\n{}",
                ctid,
                out.exit_code,
                logs
            );
            return Err(ProvisionError::InstallFailed {
                ctid,
                reason: format!("nginx restart failed (exit {})", out.exit_code),
            });
        }
        Ok(())
    }

    async fn service_logs(&self, runtime: &dyn RuntimeClient, ctid: u32) -> String {
        unit_logs(runtime, ctid, "nginx").await
    }
}
