//! Shared plumbing for the workflow binaries.
//!
//! The binaries are the only place a taxonomy kind becomes a process exit
//! code: every stage returns a typed error and `finish` performs the single
//! mapping, emitting one terminal diagnostic line either way.

use provision::{Catalog, ProvisionError, ProvisionState, TargetConfig};
use std::path::Path;

/// Log the terminal line for a workflow and exit with its mapped code.
pub fn finish(workflow: &str, result: Result<ProvisionState, ProvisionError>) -> ! {
    match result {
        Ok(state) => {
            tracing::info!("[{}] Completed: {:?}", workflow, state);
            std::process::exit(0);
        }
        Err(err) => {
            tracing::error!("[{}] {} failed: {}", workflow, err.stage(), err);
            std::process::exit(err.exit_code());
        }
    }
}

/// Resolve the target's configuration from a catalog file or an inline JSON
/// block (the two forms the workflows accept).
pub fn resolve_target(
    ctid: u32,
    config_file: Option<&Path>,
    config_json: Option<&str>,
) -> Result<TargetConfig, ProvisionError> {
    match (config_file, config_json) {
        (Some(path), _) => Catalog::load(path)?.resolve(ctid),
        (None, Some(json)) => provision::config::resolve_block(json, ctid),
        (None, None) => Err(ProvisionError::ConfigInvalid {
            field: "config".to_string(),
            reason: "either --config-file or --config-json is required".to_string(),
        }),
    }
}
