// ── Network domain types ──

use serde::{Deserialize, Serialize};

use super::common::Cidr;

/// Network purpose (controller taxonomy).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkPurpose {
    #[default]
    Corporate,
    Guest,
    VlanOnly,
}

/// DHCP server configuration for a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DhcpConfig {
    #[serde(default = "super::defaults::enabled")]
    pub enabled: bool,

    /// First address of the lease pool.
    #[serde(default)]
    pub range_start: Option<String>,

    /// Last address of the lease pool.
    #[serde(default)]
    pub range_stop: Option<String>,

    /// DNS servers handed out to clients, in order.
    #[serde(default)]
    pub dns_servers: Vec<String>,

    #[serde(default)]
    pub lease_time_secs: Option<u64>,
}

/// A network (VLAN / subnet). The logical name is the document map key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Network {
    /// VLAN id, 1-4094, unique across all networks. `None` = untagged.
    #[serde(default)]
    pub vlan: Option<u16>,

    #[serde(default)]
    pub subnet: Option<Cidr>,

    #[serde(default)]
    pub purpose: NetworkPurpose,

    #[serde(default)]
    pub dhcp: Option<DhcpConfig>,

    /// Layer-2 isolation from other networks.
    #[serde(default)]
    pub isolated: bool,

    /// Forward mDNS across network boundaries.
    #[serde(default)]
    pub mdns: bool,

    #[serde(default = "super::defaults::enabled")]
    pub internet_access: bool,
}
