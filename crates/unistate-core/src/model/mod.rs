// ── Canonical domain model ──
//
// The typed desired-state entities. Every entity is identified within
// its collection by a user-chosen logical name (the map key in the
// document), never by a device-assigned id. Reference fields hold the
// logical name of the target entity.

pub mod common;
pub(crate) mod defaults;
pub mod firewall;
pub mod generic;
pub mod network;
pub mod ports;
pub mod radius;
pub mod secret;
pub mod traffic;
pub mod vpn;
pub mod wifi;

pub use common::{Cidr, Collection, MacAddress};
pub use firewall::{
    FirewallAction, FirewallGroup, FirewallGroupType, FirewallPolicy, FirewallZone,
    PolicyEndpoint, Protocol,
};
pub use generic::SchemaBackedEntity;
pub use network::{DhcpConfig, Network, NetworkPurpose};
pub use ports::{
    DhcpReservation, ForwardProtocol, ForwardingMode, PoeMode, PortForward, PortProfile,
    StormControl,
};
pub use radius::{RadiusProfile, RadiusServer};
pub use secret::SecretRef;
pub use traffic::{BandwidthLimit, MatchTarget, TrafficAction, TrafficRule};
pub use vpn::{EspProposal, IkeProposal, IpsecTunnel, WireguardPeer, WireguardServer};
pub use wifi::{WifiBand, WifiNetwork, WifiSecurity, Wpa3Settings};
