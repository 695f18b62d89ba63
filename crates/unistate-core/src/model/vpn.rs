// ── VPN domain types ──
//
// Two kinds of entity share the vpn collection: WireGuard servers and
// IPsec site-to-site tunnels. Logical names must be unique across both
// -- the Validator enforces the shared namespace.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::common::Cidr;
use super::secret::SecretRef;

/// A WireGuard peer, keyed by name in the server's peer map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WireguardPeer {
    /// Base64-encoded Curve25519 public key.
    pub public_key: String,

    /// CIDRs routed to this peer. Must not be empty.
    pub allowed_ips: Vec<Cidr>,

    /// Optional preshared key for post-quantum hardening.
    #[serde(default)]
    pub preshared_key: Option<SecretRef>,
}

/// A WireGuard server interface with its peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WireguardServer {
    #[serde(default = "super::defaults::wireguard_port")]
    pub port: u16,

    /// Tunnel subnet the server allocates peer addresses from.
    pub subnet: Cidr,

    pub private_key: SecretRef,

    #[serde(default)]
    pub peers: IndexMap<String, WireguardPeer>,

    #[serde(default = "super::defaults::enabled")]
    pub enabled: bool,
}

/// IKE (phase 1) proposal parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IkeProposal {
    /// IKE protocol version (1 or 2).
    #[serde(default = "default_ike_version")]
    pub version: u8,

    #[serde(default = "default_encryption")]
    pub encryption: String,

    #[serde(default = "default_hash")]
    pub hash: String,

    #[serde(default = "default_dh_group")]
    pub dh_group: u16,

    #[serde(default = "default_ike_lifetime")]
    pub lifetime_secs: u32,
}

/// ESP (phase 2) proposal parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EspProposal {
    #[serde(default = "default_encryption")]
    pub encryption: String,

    #[serde(default = "default_hash")]
    pub hash: String,

    #[serde(default = "default_esp_lifetime")]
    pub lifetime_secs: u32,
}

fn default_ike_version() -> u8 {
    2
}
fn default_encryption() -> String {
    "aes256".into()
}
fn default_hash() -> String {
    "sha256".into()
}
fn default_dh_group() -> u16 {
    14
}
fn default_ike_lifetime() -> u32 {
    28800
}
fn default_esp_lifetime() -> u32 {
    3600
}

/// An IPsec site-to-site tunnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IpsecTunnel {
    /// Remote gateway hostname or address.
    pub remote_host: String,

    /// CIDRs reachable through the tunnel. Must not be empty.
    pub remote_subnets: Vec<Cidr>,

    /// Local CIDRs announced to the remote side. Must not be empty.
    pub local_subnets: Vec<Cidr>,

    pub preshared_key: SecretRef,

    #[serde(default)]
    pub ike: Option<IkeProposal>,

    #[serde(default)]
    pub esp: Option<EspProposal>,

    #[serde(default = "super::defaults::enabled")]
    pub enabled: bool,
}
