//! Workload installer behavior: durable markers, generated artifacts, and
//! failure diagnostics.

mod common;

use common::{failed_output, FakeRuntime, ok_output};
use provision::{
    NginxInstaller, ProvisionError, ServiceInstaller, VllmInstallMode, VllmInstaller,
};
use provision::installer::vllm;

fn nginx() -> NginxInstaller {
    NginxInstaller::new("app1", "10.0.0.120", 8000)
}

fn exec_calls_containing(runtime: &FakeRuntime, needle: &str) -> Vec<String> {
    runtime
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("exec") && call.contains(needle))
        .collect()
}

#[test]
fn nginx_site_renders_backend_and_server_name() {
    let site = nginx().render_site().unwrap();
    assert!(site.contains("server_name app1;"), "site:\n{site}");
    assert!(
        site.contains("proxy_pass http://10.0.0.120:8000;"),
        "site:\n{site}"
    );
    assert!(site.contains("listen 80 default_server;"));
}

#[tokio::test]
async fn nginx_configure_installs_site_and_removes_default() {
    let runtime = FakeRuntime::new();
    nginx().configure(&runtime, 910).await.unwrap();

    let writes = exec_calls_containing(&runtime, "/etc/nginx/sites-available/app1");
    assert_eq!(writes.len(), 1, "calls: {:?}", runtime.calls());
    let script = &writes[0];
    assert!(script.contains("ln -sf /etc/nginx/sites-available/app1"));
    assert!(script.contains("rm -f /etc/nginx/sites-enabled/default"));
    assert!(script.contains("nginx -t"));
}

#[tokio::test]
async fn nginx_marker_requires_installed_package() {
    let runtime = FakeRuntime::new().respond_to_exec("dpkg-query", failed_output(1));
    assert!(!nginx().is_installed(&runtime, 910).await.unwrap());

    let runtime = FakeRuntime::new();
    assert!(nginx().is_installed(&runtime, 910).await.unwrap());
}

#[tokio::test]
async fn nginx_install_failure_is_classified() {
    let runtime = FakeRuntime::new().respond_to_exec("apt-get", failed_output(100));
    let err = nginx().install(&runtime, 910).await.unwrap_err();
    assert!(matches!(err, ProvisionError::InstallFailed { ctid: 910, .. }));
    assert_eq!(err.exit_code(), 4);
}

#[tokio::test]
async fn nginx_restart_failure_fetches_service_logs() {
    let runtime = FakeRuntime::new()
        .respond_to_exec("systemctl enable nginx", failed_output(1))
        .respond_to_exec(
            "journalctl",
            provision::ExecOutput {
                stdout: "nginx: [emerg] bind() failed".to_string(),
                stderr: String::new(),
                exit_code: 0,
            },
        );
    let err = nginx().manage_service(&runtime, 910).await.unwrap_err();
    assert!(matches!(err, ProvisionError::InstallFailed { .. }));
    assert_eq!(
        exec_calls_containing(&runtime, "journalctl -u nginx").len(),
        1,
        "restart failure must capture recent unit logs"
    );
}

#[tokio::test]
async fn vllm_marker_imports_the_package() {
    let runtime = FakeRuntime::new().respond_to_exec("import vllm", ok_output());
    let installer = VllmInstaller::new(VllmInstallMode::SourceBuild, vllm::DEFAULT_PORT);
    assert!(installer.is_installed(&runtime, 950).await.unwrap());

    let runtime = FakeRuntime::new().respond_to_exec("import vllm", failed_output(1));
    assert!(!installer.is_installed(&runtime, 950).await.unwrap());
}

#[tokio::test]
async fn vllm_source_build_clones_upstream() {
    let runtime = FakeRuntime::new();
    VllmInstaller::new(VllmInstallMode::SourceBuild, vllm::DEFAULT_PORT)
        .install(&runtime, 950)
        .await
        .unwrap();
    assert_eq!(exec_calls_containing(&runtime, "git clone").len(), 1);
    assert_eq!(exec_calls_containing(&runtime, "pip install -e").len(), 1);
}

#[tokio::test]
async fn vllm_manifest_installs_pinned_packages() {
    let runtime = FakeRuntime::new();
    VllmInstaller::new(VllmInstallMode::PinnedManifest, vllm::DEFAULT_PORT)
        .install(&runtime, 950)
        .await
        .unwrap();
    assert_eq!(exec_calls_containing(&runtime, "vllm==").len(), 1);
    assert!(exec_calls_containing(&runtime, "git clone").is_empty());
}

#[tokio::test]
async fn vllm_configure_writes_unit_and_reloads() {
    let runtime = FakeRuntime::new();
    let installer = VllmInstaller::new(VllmInstallMode::PinnedManifest, 8000);
    installer.configure(&runtime, 950).await.unwrap();

    let writes = exec_calls_containing(&runtime, "/etc/systemd/system/vllm.service");
    assert_eq!(writes.len(), 1);
    assert!(writes[0].contains("daemon-reload"));

    let unit = installer.render_unit().unwrap();
    assert!(unit.contains("--port 8000"), "unit:\n{unit}");
    assert!(unit.contains("vllm.entrypoints.openai.api_server"));
}
