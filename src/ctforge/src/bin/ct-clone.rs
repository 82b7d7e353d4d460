//! Clone workflow: create a target container from a template snapshot and
//! apply its declared settings.

use clap::{ArgGroup, Parser};
use provision::{LifecycleOrchestrator, PctClient, ProvisionPlan, SourceRef};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "ct-clone",
    about = "Clone a container from a template snapshot and apply its settings",
    group(ArgGroup::new("config").required(true).args(["config_file", "config_json"]))
)]
struct Args {
    /// Target container id
    ctid: u32,
    /// Source template container id
    source_ctid: u32,
    /// Template snapshot to clone from
    snapshot_name: String,
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
        Err(err) => ctforge::finish("ct-clone", Err(err)),
    };

    let plan = ProvisionPlan {
        target,
        source: Some(SourceRef {
            source_ctid: args.source_ctid,
            snapshot_name: args.snapshot_name,
        }),
        workload: None,
        probe: None,
        finalize_snapshot: None,
    };

    let orchestrator = LifecycleOrchestrator::new(Arc::new(PctClient::new()));
    ctforge::finish("ct-clone", orchestrator.run(&plan).await);
}
