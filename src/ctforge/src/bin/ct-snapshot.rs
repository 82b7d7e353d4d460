//! Snapshot finalization workflow: freeze a provisioned container as a
//! reusable template snapshot.

use clap::Parser;
use provision::{LifecycleOrchestrator, PctClient};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "ct-snapshot",
    about = "Freeze a provisioned container as a reusable template snapshot"
)]
struct Args {
    /// Target container id
    ctid: u32,
    /// Name for the new snapshot
    snapshot_name: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let orchestrator = LifecycleOrchestrator::new(Arc::new(PctClient::new()));
    ctforge::finish(
        "ct-snapshot",
        orchestrator.finalize(args.ctid, &args.snapshot_name).await,
    );
}
