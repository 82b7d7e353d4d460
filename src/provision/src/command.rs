//! Pure builders translating a resolved configuration into runtime
//! operation parameters.
//!
//! Network fields are deliberately excluded from `CloneSpec`: the clone
//! operation copies the template's config verbatim and produces unreliable
//! adapter results, so network settings are applied by a dedicated
//! `set_property` step after the clone succeeds.

use crate::config::{SourceRef, TargetConfig};

/// Parameters for the clone-and-apply-settings action. No side effects here;
/// the runtime client turns this into concrete invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneSpec {
    pub source_ctid: u32,
    pub target_ctid: u32,
    pub snapshot_name: String,
    pub hostname: String,
    pub memory_mb: u64,
    pub cores: u32,
    /// Storage target: the pool, or "pool:sizeGB" when a size is requested.
    pub storage: String,
    /// Feature flags in catalog order.
    pub features: Vec<String>,
    /// The runtime's boolean representation: 1 unprivileged, 0 privileged.
    pub unprivileged: u8,
}

/// A single property assignment applied after the clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub ctid: u32,
    pub key: String,
    pub value: String,
}

/// Build the clone parameters for `target` from `source`. Deterministic:
/// identical inputs produce an identical spec.
pub fn build_clone_spec(target: &TargetConfig, source: &SourceRef) -> CloneSpec {
    let storage = match target.storage_size_gb {
        Some(size_gb) => format!("{}:{}", target.storage_pool, size_gb),
        None => target.storage_pool.clone(),
    };
    CloneSpec {
        source_ctid: source.source_ctid,
        target_ctid: target.ctid,
        snapshot_name: source.snapshot_name.clone(),
        hostname: target.name.clone(),
        memory_mb: target.memory_mb,
        cores: target.cores,
        storage,
        features: target.features.clone(),
        unprivileged: u8::from(target.unprivileged),
    }
}

/// Build the post-clone network assignment, or `None` when the target has no
/// network block. The interface string follows the runtime's
/// `name=<if>,bridge=<bridge>,ip=<cidr>,gw=<gw>[,hwaddr=<mac>]` form.
pub fn build_network_spec(target: &TargetConfig) -> Option<NetworkSpec> {
    let network = target.network.as_ref()?;
    let mut value = format!(
        "name={},bridge={},ip={},gw={}",
        network.if_name, network.bridge, network.ip, network.gateway
    );
    if let Some(mac) = &target.mac_address {
        value.push_str(",hwaddr=");
        value.push_str(mac);
    }
    Some(NetworkSpec {
        ctid: target.ctid,
        key: "net0".to_string(),
        value,
    })
}
