// ── Firewall domain types ──

use serde::{Deserialize, Serialize};

/// Policy verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirewallAction {
    Allow,
    Block,
    Reject,
}

/// Transport protocol matched by a policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Protocol {
    #[default]
    All,
    Tcp,
    Udp,
    TcpUdp,
    Icmp,
}

/// Firewall zone -- a container for networks; policies operate between
/// zones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FirewallZone {
    /// Logical names of member networks.
    #[serde(default)]
    pub networks: Vec<String>,
}

/// Address or port set referenced by policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FirewallGroupType {
    Address,
    Ipv6Address,
    Port,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FirewallGroup {
    #[serde(rename = "type")]
    pub group_type: FirewallGroupType,

    /// Addresses, CIDRs, or port numbers depending on the group type.
    pub members: Vec<String>,
}

/// One side of a policy: a zone, optionally narrowed to a network, a
/// group, or literal addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyEndpoint {
    /// Logical name of the zone.
    pub zone: String,

    /// Narrow to a single network within the zone.
    #[serde(default)]
    pub network: Option<String>,

    /// Narrow to a firewall group.
    #[serde(default)]
    pub group: Option<String>,

    /// Narrow to literal IP addresses.
    #[serde(default)]
    pub ips: Vec<String>,
}

/// A rule between two zones. `index` orders evaluation -- lower index
/// wins -- and must be unique across all policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FirewallPolicy {
    pub action: FirewallAction,

    pub index: u32,

    pub source: PolicyEndpoint,

    pub destination: PolicyEndpoint,

    #[serde(default)]
    pub protocol: Protocol,

    /// Destination port or range (`"443"`, `"8000-8080"`).
    #[serde(default)]
    pub ports: Option<String>,

    #[serde(default)]
    pub logging: bool,

    #[serde(default = "super::defaults::enabled")]
    pub enabled: bool,
}
