//! Target configuration: catalog schema, resolution, validation.
//!
//! One upfront parse into `TargetConfig` replaces per-call field lookups.
//! Semantic validation (positive integers, address shapes) happens here, at
//! the boundary, so a bad catalog entry fails with a named field before any
//! runtime operation is attempted.

use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;

/// Default host bridge for the container's network interface.
pub const DEFAULT_BRIDGE: &str = "vmbr0";

fn default_if_name() -> String {
    "eth0".to_string()
}

fn default_bridge() -> String {
    DEFAULT_BRIDGE.to_string()
}

/// Network settings applied as a dedicated post-clone step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Container address in CIDR form (e.g., "10.0.0.110/24")
    pub ip: String,
    /// IPv4 gateway
    pub gateway: String,
    /// Interface name inside the container
    #[serde(default = "default_if_name")]
    pub if_name: String,
    /// Host bridge the interface attaches to
    #[serde(default = "default_bridge")]
    pub bridge: String,
}

impl NetworkConfig {
    /// Address portion of `ip`, without the prefix length.
    pub fn address(&self) -> &str {
        self.ip.split('/').next().unwrap_or(&self.ip)
    }

    fn validate(&self) -> Result<(), ProvisionError> {
        let mut parts = self.ip.splitn(2, '/');
        let addr = parts.next().unwrap_or_default();
        let prefix = parts.next();
        if addr.parse::<Ipv4Addr>().is_err() {
            return Err(invalid("network.ip", "not a valid IPv4 CIDR address"));
        }
        match prefix.map(str::parse::<u8>) {
            Some(Ok(len)) if len <= 32 => {}
            _ => return Err(invalid("network.ip", "missing or invalid prefix length")),
        }
        if self.gateway.parse::<Ipv4Addr>().is_err() {
            return Err(invalid("network.gateway", "not a valid IPv4 address"));
        }
        if self.if_name.is_empty() {
            return Err(invalid("network.if_name", "must not be empty"));
        }
        if self.bridge.is_empty() {
            return Err(invalid("network.bridge", "must not be empty"));
        }
        Ok(())
    }
}

/// Declarative configuration for one target container.
///
/// Immutable once resolved; owned by the orchestration run that parsed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target container id. May be omitted in a catalog block whose key
    /// already names it; the resolver fills it in and cross-checks.
    #[serde(default)]
    pub ctid: u32,
    pub name: String,
    pub memory_mb: u64,
    pub cores: u32,
    pub storage_pool: String,
    #[serde(default)]
    pub storage_size_gb: Option<u64>,
    /// Runtime feature flags (e.g., "nesting=1"), order preserved.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub unprivileged: bool,
    #[serde(default)]
    pub network: Option<NetworkConfig>,
    #[serde(default)]
    pub mac_address: Option<String>,
}

impl TargetConfig {
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.ctid == 0 {
            return Err(invalid("ctid", "must be a positive integer"));
        }
        if self.name.is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if self.memory_mb == 0 {
            return Err(invalid("memory_mb", "must be a positive integer"));
        }
        if self.cores == 0 {
            return Err(invalid("cores", "must be a positive integer"));
        }
        if self.storage_pool.is_empty() {
            return Err(invalid("storage_pool", "must not be empty"));
        }
        if matches!(self.storage_size_gb, Some(0)) {
            return Err(invalid("storage_size_gb", "must be a positive integer"));
        }
        if let Some(network) = &self.network {
            network.validate()?;
        }
        Ok(())
    }
}

/// Template container and snapshot a clone is created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_ctid: u32,
    pub snapshot_name: String,
}

impl SourceRef {
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.source_ctid == 0 {
            return Err(invalid("source_ctid", "must be a positive integer"));
        }
        if self.snapshot_name.is_empty() {
            return Err(invalid("snapshot_name", "must not be empty"));
        }
        Ok(())
    }
}

/// Central configuration catalog: one JSON object per target, keyed by ctid.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub lxc_configs: BTreeMap<String, TargetConfig>,
}

impl Catalog {
    pub fn parse(json: &str) -> Result<Self, ProvisionError> {
        serde_json::from_str(json).map_err(|e| invalid("lxc_configs", &e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ProvisionError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Resolve one target's configuration out of the catalog.
    pub fn resolve(&self, ctid: u32) -> Result<TargetConfig, ProvisionError> {
        let block = self
            .lxc_configs
            .get(&ctid.to_string())
            .ok_or_else(|| invalid("ctid", &format!("no catalog entry for {ctid}")))?;
        finish_resolution(block.clone(), ctid)
    }
}

/// Resolve a single target's JSON configuration block (the form the clone
/// workflow receives as an argument).
pub fn resolve_block(json: &str, ctid: u32) -> Result<TargetConfig, ProvisionError> {
    let block: TargetConfig =
        serde_json::from_str(json).map_err(|e| invalid("config", &e.to_string()))?;
    finish_resolution(block, ctid)
}

fn finish_resolution(mut config: TargetConfig, ctid: u32) -> Result<TargetConfig, ProvisionError> {
    if config.ctid == 0 {
        config.ctid = ctid;
    } else if config.ctid != ctid {
        return Err(invalid(
            "ctid",
            &format!("config names {} but the target is {}", config.ctid, ctid),
        ));
    }
    config.validate()?;
    Ok(config)
}

fn invalid(field: &str, reason: &str) -> ProvisionError {
    ProvisionError::ConfigInvalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
