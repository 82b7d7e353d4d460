//! Workload workflow: install, configure, and verify a service inside an
//! existing container.

use clap::{ArgGroup, Parser, ValueEnum};
use provision::installer::{nginx, vllm};
use provision::{
    HttpProbe, LifecycleOrchestrator, NginxInstaller, PctClient, Probe, ProvisionError,
    ProvisionPlan, RetryPolicy, ServiceInstaller, VllmInstallMode, VllmInstaller,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Workload {
    /// nginx reverse proxy
    Nginx,
    /// vLLM built from source
    VllmSource,
    /// vLLM from the pinned package manifest
    VllmManifest,
}

#[derive(Parser)]
#[command(
    name = "ct-workload",
    about = "Install, configure, and verify a workload inside a container",
    group(ArgGroup::new("config").required(true).args(["config_file", "config_json"]))
)]
struct Args {
    /// Target container id
    ctid: u32,
    /// Workload to install
    #[arg(long, value_enum)]
    workload: Workload,
    /// Backend address the reverse proxy forwards to
    #[arg(long, value_name = "IP", required_if_eq("workload", "nginx"))]
    backend_ip: Option<String>,
    /// Backend port the reverse proxy forwards to
    #[arg(long, value_name = "PORT", required_if_eq("workload", "nginx"))]
    backend_port: Option<u16>,
    /// Port probed for health (defaults to the workload's listen port)
    #[arg(long)]
    health_port: Option<u16>,
    /// Health probe attempts before giving up
    #[arg(long, default_value_t = 12)]
    health_attempts: u32,
    /// Seconds between health probe attempts
    #[arg(long, default_value_t = 10)]
    health_interval_secs: u64,
    /// Skip the health verification stage
    #[arg(long)]
    no_verify: bool,
    /// Path to the JSON configuration catalog
    #[arg(long, value_name = "PATH")]
    config_file: Option<PathBuf>,
    /// The target's JSON configuration block
    #[arg(long, value_name = "JSON")]
    config_json: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let target = match ctforge::resolve_target(
        args.ctid,
        args.config_file.as_deref(),
        args.config_json.as_deref(),
    ) {
        Ok(target) => target,
        Err(err) => ctforge::finish("ct-workload", Err(err)),
    };

    let (installer, default_port, health_path): (Arc<dyn ServiceInstaller>, u16, &str) =
        match args.workload {
            Workload::Nginx => match (&args.backend_ip, args.backend_port) {
                (Some(ip), Some(port)) => (
                    Arc::new(NginxInstaller::new(target.name.clone(), ip.clone(), port)),
                    nginx::LISTEN_PORT,
                    "/",
                ),
                _ => ctforge::finish(
                    "ct-workload",
                    Err(ProvisionError::ConfigInvalid {
                        field: "backend".to_string(),
                        reason: "--backend-ip and --backend-port are required for nginx"
                            .to_string(),
                    }),
                ),
            },
            Workload::VllmSource => (
                Arc::new(VllmInstaller::new(
                    VllmInstallMode::SourceBuild,
                    vllm::DEFAULT_PORT,
                )),
                vllm::DEFAULT_PORT,
                vllm::HEALTH_PATH,
            ),
            Workload::VllmManifest => (
                Arc::new(VllmInstaller::new(
                    VllmInstallMode::PinnedManifest,
                    vllm::DEFAULT_PORT,
                )),
                vllm::DEFAULT_PORT,
                vllm::HEALTH_PATH,
            ),
        };

    let probe: Option<Arc<dyn Probe>> = if args.no_verify {
        None
    } else if let Some(network) = &target.network {
        let port = args.health_port.unwrap_or(default_port);
        let url = format!("http://{}:{}{}", network.address(), port, health_path);
        match HttpProbe::new(url) {
            Ok(probe) => Some(Arc::new(probe)),
            Err(err) => ctforge::finish("ct-workload", Err(err)),
        }
    } else {
        tracing::warn!("[ct-workload] No network configured; skipping health verification");
        None
    };

    let plan = ProvisionPlan {
        target,
        source: None,
        workload: Some(installer),
        probe,
        finalize_snapshot: None,
    };

    let orchestrator = LifecycleOrchestrator::with_policies(
        Arc::new(PctClient::new()),
        RetryPolicy::state_wait_default(),
        RetryPolicy::new(
            args.health_attempts,
            Duration::from_secs(args.health_interval_secs),
        ),
    );
    ctforge::finish("ct-workload", orchestrator.run(&plan).await);
}
