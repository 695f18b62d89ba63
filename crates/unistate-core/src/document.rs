// ── Desired-state document ──
//
// The normalized input produced by the external configuration
// evaluator. Map keys are logical names; IndexMap preserves declaration
// order, which fixes the create order inside each collection. The core
// never parses the authoring language -- this struct IS the boundary.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{
    DhcpReservation, FirewallGroup, FirewallPolicy, FirewallZone, IpsecTunnel, Network,
    PortForward, PortProfile, RadiusProfile, TrafficRule, WifiNetwork, WireguardServer,
};

/// Firewall section: zones, groups, and policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FirewallSection {
    #[serde(default)]
    pub zones: IndexMap<String, FirewallZone>,

    #[serde(default)]
    pub groups: IndexMap<String, FirewallGroup>,

    #[serde(default)]
    pub policies: IndexMap<String, FirewallPolicy>,
}

/// VPN section: WireGuard servers and site-to-site tunnels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VpnSection {
    #[serde(default)]
    pub wireguard: IndexMap<String, WireguardServer>,

    #[serde(default)]
    pub site_to_site: IndexMap<String, IpsecTunnel>,
}

/// The complete desired state for one site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DesiredConfig {
    /// Pin the schema version ("latest" when absent).
    #[serde(default)]
    pub schema_version: Option<String>,

    #[serde(default)]
    pub networks: IndexMap<String, Network>,

    #[serde(default)]
    pub wifi: IndexMap<String, WifiNetwork>,

    #[serde(default)]
    pub firewall: FirewallSection,

    #[serde(default)]
    pub traffic_rules: IndexMap<String, TrafficRule>,

    #[serde(default)]
    pub radius_profiles: IndexMap<String, RadiusProfile>,

    #[serde(default)]
    pub port_profiles: IndexMap<String, PortProfile>,

    #[serde(default)]
    pub vpn: VpnSection,

    #[serde(default)]
    pub port_forwards: IndexMap<String, PortForward>,

    #[serde(default)]
    pub dhcp_reservations: IndexMap<String, DhcpReservation>,

    /// Schema-backed collections: collection name -> logical name ->
    /// wire field map. Validated against the registry's descriptors.
    #[serde(default)]
    pub collections: IndexMap<String, IndexMap<String, Map<String, Value>>>,
}

impl DesiredConfig {
    /// Parse a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Total number of declared entities across all collections.
    pub fn entity_count(&self) -> usize {
        self.networks.len()
            + self.wifi.len()
            + self.firewall.zones.len()
            + self.firewall.groups.len()
            + self.firewall.policies.len()
            + self.traffic_rules.len()
            + self.radius_profiles.len()
            + self.port_profiles.len()
            + self.vpn.wireguard.len()
            + self.vpn.site_to_site.len()
            + self.port_forwards.len()
            + self.dhcp_reservations.len()
            + self.collections.values().map(IndexMap::len).sum::<usize>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let doc = DesiredConfig::from_json_str("{}").unwrap();
        assert_eq!(doc.entity_count(), 0);
    }

    #[test]
    fn preserves_declaration_order() {
        let raw = r#"{
            "networks": {
                "Default": {},
                "IoT": { "vlan": 10 },
                "Guest": { "vlan": 20, "purpose": "guest" }
            }
        }"#;
        let doc = DesiredConfig::from_json_str(raw).unwrap();
        let names: Vec<&str> = doc.networks.keys().map(String::as_str).collect();
        assert_eq!(names, ["Default", "IoT", "Guest"]);
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let raw = r#"{ "netwroks": {} }"#;
        assert!(DesiredConfig::from_json_str(raw).is_err());
    }

    #[test]
    fn parses_full_sections() {
        let raw = r#"{
            "schemaVersion": "9.3.45",
            "networks": { "IoT": { "vlan": 10, "subnet": "10.0.10.0/24", "isolated": true } },
            "wifi": {
                "iot": {
                    "network": "IoT",
                    "security": "wpa2",
                    "passphrase": { "secret": "env:IOT_PSK" },
                    "bands": ["2g", "5g"]
                }
            },
            "firewall": {
                "zones": { "lan": { "networks": ["IoT"] } },
                "policies": {
                    "block-iot": {
                        "action": "block",
                        "index": 10000,
                        "source": { "zone": "lan" },
                        "destination": { "zone": "lan" }
                    }
                }
            },
            "collections": {
                "dnsrecord": {
                    "nas": { "record_type": "A", "value": "10.0.10.5" }
                }
            }
        }"#;
        let doc = DesiredConfig::from_json_str(raw).unwrap();
        assert_eq!(doc.entity_count(), 5);
        assert_eq!(doc.schema_version.as_deref(), Some("9.3.45"));
        assert!(doc.wifi["iot"].passphrase.as_ref().unwrap().is_reference());
    }
}
