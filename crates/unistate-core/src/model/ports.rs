// ── Switch port, port forward, and DHCP reservation types ──

use serde::{Deserialize, Serialize};

use super::common::{Cidr, MacAddress};

/// Which networks a switch port carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForwardingMode {
    /// Native network untagged plus every other network tagged.
    #[default]
    All,
    /// Native network only.
    Native,
    /// Native network plus an explicit tagged list.
    Custom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PoeMode {
    #[default]
    Auto,
    Off,
    Passive24v,
}

/// Per-port storm control thresholds (percent of link rate).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StormControl {
    #[serde(default = "super::defaults::enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub broadcast_pct: Option<u8>,

    #[serde(default)]
    pub multicast_pct: Option<u8>,

    #[serde(default)]
    pub unknown_unicast_pct: Option<u8>,
}

/// A switch port profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PortProfile {
    #[serde(default)]
    pub forwarding: ForwardingMode,

    /// Logical name of the untagged network.
    #[serde(default)]
    pub native_network: Option<String>,

    /// Logical names of tagged networks (`custom` forwarding only).
    #[serde(default)]
    pub tagged_networks: Vec<String>,

    #[serde(default)]
    pub poe_mode: PoeMode,

    #[serde(default)]
    pub storm_control: Option<StormControl>,

    /// Port isolation within the same switch.
    #[serde(default)]
    pub isolation: bool,
}

/// Protocols a port forward can carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForwardProtocol {
    Tcp,
    Udp,
    #[default]
    TcpUdp,
}

/// A WAN port forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PortForward {
    #[serde(default)]
    pub protocol: ForwardProtocol,

    pub wan_port: u16,

    /// Internal destination address.
    pub forward_ip: String,

    pub forward_port: u16,

    /// Restrict to a source CIDR. Absent = any source.
    #[serde(default)]
    pub source: Option<Cidr>,

    #[serde(default = "super::defaults::enabled")]
    pub enabled: bool,
}

/// A fixed DHCP lease (MAC -> IP on a given network).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DhcpReservation {
    pub mac: MacAddress,

    pub ip: String,

    /// Logical name of the network the reservation lives on.
    pub network: String,

    #[serde(default)]
    pub hostname: Option<String>,
}
