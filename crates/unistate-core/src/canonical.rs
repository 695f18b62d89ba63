// ── Canonicalization ──
//
// Converts typed document entities into canonical wire-format field
// maps. A canonical entity carries three things the rest of the
// pipeline needs:
//   - `fields`: the wire document (serde_json::Map keeps keys sorted,
//     so identical inputs always canonicalize identically),
//   - `refs`: which fields hold logical names of other entities, so
//     the Apply Engine can rewrite them to device ids,
//   - `secrets`: where secret values land once resolved.
//
// Reference fields hold the *logical name* of their target until the
// moment of the API call. Absent optional fields are omitted entirely,
// so a field-level diff never fights over fields the user left unset.

use serde_json::{Map, Value, json};

use crate::document::DesiredConfig;
use crate::model::{
    Collection, DhcpReservation, FirewallGroup, FirewallGroupType, FirewallPolicy, FirewallZone,
    ForwardProtocol, ForwardingMode, IpsecTunnel, MatchTarget, Network, NetworkPurpose, PoeMode,
    PolicyEndpoint, PortForward, PortProfile, Protocol, RadiusProfile, SchemaBackedEntity,
    SecretRef, TrafficAction, TrafficRule, WifiBand, WifiNetwork, WifiSecurity, WireguardServer,
};

/// Field written into every document this tool creates. Live entities
/// carrying it are managed (eligible for update/delete); entities
/// without it are foreign and never deleted.
pub const MANAGED_BY_FIELD: &str = "x_managed_by";

/// The marker value.
pub const MANAGED_BY_VALUE: &str = "unistate";

/// A field whose value is the logical name of another entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    /// Top-level wire field holding the name (string or string array).
    pub field: String,
    /// Collection the target lives in.
    pub collection: Collection,
    /// Logical name of the target.
    pub target: String,
}

/// A secret slot inside a canonical entity, filled in by the resolver.
#[derive(Debug, Clone)]
pub struct SecretField {
    /// JSON pointer to the object holding the secret ("" = top level).
    pub parent: String,
    /// Field name within that object.
    pub field: String,
    pub secret: SecretRef,
    /// Value-dependent length constraints, checked after resolution.
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
}

/// One entity in canonical wire form.
#[derive(Debug, Clone)]
pub struct CanonicalEntity {
    pub collection: Collection,
    pub name: String,
    pub fields: Map<String, Value>,
    pub refs: Vec<FieldRef>,
    pub secrets: Vec<SecretField>,
}

static NETWORK_REF: [(&str, Collection); 1] = [("networkconf_id", Collection::Network)];
static ZONE_REFS: [(&str, Collection); 1] = [("network_ids", Collection::Network)];
static POLICY_REFS: [(&str, Collection); 6] = [
    ("src_zone_id", Collection::FirewallZone),
    ("dst_zone_id", Collection::FirewallZone),
    ("src_network_id", Collection::Network),
    ("dst_network_id", Collection::Network),
    ("src_group_id", Collection::FirewallGroup),
    ("dst_group_id", Collection::FirewallGroup),
];
static PORT_PROFILE_REFS: [(&str, Collection); 2] = [
    ("native_networkconf_id", Collection::Network),
    ("tagged_networkconf_ids", Collection::Network),
];

/// Reference fields per built-in collection: (wire field, target
/// collection). Used both to collect refs at canonicalization and to
/// map live ids back to logical names.
pub fn reference_fields(collection: &Collection) -> &'static [(&'static str, Collection)] {
    match collection {
        Collection::WifiNetwork | Collection::TrafficRule | Collection::DhcpReservation => {
            &NETWORK_REF
        }
        Collection::FirewallZone => &ZONE_REFS,
        Collection::FirewallPolicy => &POLICY_REFS,
        Collection::PortProfile => &PORT_PROFILE_REFS,
        _ => &[],
    }
}

/// Canonicalize the whole document, collections in dependency order,
/// declaration order within each collection.
pub fn canonicalize(doc: &DesiredConfig) -> Vec<CanonicalEntity> {
    let mut entities = Vec::with_capacity(doc.entity_count());

    for (name, network) in &doc.networks {
        entities.push(network_entity(name, network));
    }
    for (name, zone) in &doc.firewall.zones {
        entities.push(zone_entity(name, zone));
    }
    for (name, group) in &doc.firewall.groups {
        entities.push(group_entity(name, group));
    }
    for (name, profile) in &doc.radius_profiles {
        entities.push(radius_entity(name, profile));
    }
    for (ssid, wifi) in &doc.wifi {
        entities.push(wifi_entity(ssid, wifi));
    }
    for (name, profile) in &doc.port_profiles {
        entities.push(port_profile_entity(name, profile));
    }
    for (name, rule) in &doc.traffic_rules {
        entities.push(traffic_rule_entity(name, rule));
    }
    for (name, policy) in &doc.firewall.policies {
        entities.push(policy_entity(name, policy));
    }
    for (name, server) in &doc.vpn.wireguard {
        entities.push(wireguard_entity(name, server));
    }
    for (name, tunnel) in &doc.vpn.site_to_site {
        entities.push(ipsec_entity(name, tunnel));
    }
    for (name, forward) in &doc.port_forwards {
        entities.push(port_forward_entity(name, forward));
    }
    for (name, reservation) in &doc.dhcp_reservations {
        entities.push(reservation_entity(name, reservation));
    }

    // Custom collections after all built-ins, sorted by collection name
    // for a deterministic changeset.
    let mut custom: Vec<&String> = doc.collections.keys().collect();
    custom.sort();
    for collection in custom {
        for (name, fields) in &doc.collections[collection] {
            let raw = SchemaBackedEntity {
                collection: collection.clone(),
                fields: fields.clone(),
            };
            entities.push(custom_entity(name, &raw));
        }
    }

    entities
}

// ── Builders ────────────────────────────────────────────────────────

fn base_fields(name: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("name".into(), json!(name));
    fields.insert(MANAGED_BY_FIELD.into(), json!(MANAGED_BY_VALUE));
    fields
}

fn network_entity(name: &str, network: &Network) -> CanonicalEntity {
    let mut fields = base_fields(name);
    fields.insert("purpose".into(), json!(purpose_str(network.purpose)));
    if let Some(vlan) = network.vlan {
        fields.insert("vlan".into(), json!(vlan));
    }
    if let Some(ref subnet) = network.subnet {
        fields.insert("ip_subnet".into(), json!(subnet.as_str()));
    }
    if let Some(ref dhcp) = network.dhcp {
        fields.insert("dhcpd_enabled".into(), json!(dhcp.enabled));
        if let Some(ref start) = dhcp.range_start {
            fields.insert("dhcpd_start".into(), json!(start));
        }
        if let Some(ref stop) = dhcp.range_stop {
            fields.insert("dhcpd_stop".into(), json!(stop));
        }
        if !dhcp.dns_servers.is_empty() {
            // Client resolver order matters -- preserved as declared.
            fields.insert("dhcpd_dns".into(), json!(dhcp.dns_servers));
        }
        if let Some(lease) = dhcp.lease_time_secs {
            fields.insert("dhcpd_leasetime".into(), json!(lease));
        }
    }
    fields.insert("isolation_enabled".into(), json!(network.isolated));
    fields.insert("mdns_enabled".into(), json!(network.mdns));
    fields.insert(
        "internet_access_enabled".into(),
        json!(network.internet_access),
    );

    CanonicalEntity {
        collection: Collection::Network,
        name: name.to_owned(),
        fields,
        refs: vec![],
        secrets: vec![],
    }
}

fn zone_entity(name: &str, zone: &FirewallZone) -> CanonicalEntity {
    let mut fields = base_fields(name);
    fields.insert("network_ids".into(), json!(zone.networks));

    let refs = zone
        .networks
        .iter()
        .map(|target| FieldRef {
            field: "network_ids".into(),
            collection: Collection::Network,
            target: target.clone(),
        })
        .collect();

    CanonicalEntity {
        collection: Collection::FirewallZone,
        name: name.to_owned(),
        fields,
        refs,
        secrets: vec![],
    }
}

fn group_entity(name: &str, group: &FirewallGroup) -> CanonicalEntity {
    let mut fields = base_fields(name);
    let group_type = match group.group_type {
        FirewallGroupType::Address => "address-group",
        FirewallGroupType::Ipv6Address => "ipv6-address-group",
        FirewallGroupType::Port => "port-group",
    };
    fields.insert("group_type".into(), json!(group_type));
    // Membership is a set -- sorted so equal sets canonicalize equally.
    let mut members = group.members.clone();
    members.sort();
    fields.insert("group_members".into(), json!(members));

    CanonicalEntity {
        collection: Collection::FirewallGroup,
        name: name.to_owned(),
        fields,
        refs: vec![],
        secrets: vec![],
    }
}

fn radius_entity(name: &str, profile: &RadiusProfile) -> CanonicalEntity {
    let mut fields = base_fields(name);
    let mut secrets = Vec::new();

    for (key, servers) in [
        ("auth_servers", &profile.auth_servers),
        ("acct_servers", &profile.acct_servers),
    ] {
        if servers.is_empty() && key == "acct_servers" {
            continue;
        }
        let entries: Vec<Value> = servers
            .iter()
            .enumerate()
            .map(|(i, server)| {
                secrets.push(SecretField {
                    parent: format!("/{key}/{i}"),
                    field: "x_secret".into(),
                    secret: server.secret.clone(),
                    min_len: Some(1),
                    max_len: None,
                });
                json!({ "host": server.host, "port": server.port })
            })
            .collect();
        fields.insert(key.into(), Value::Array(entries));
    }

    CanonicalEntity {
        collection: Collection::RadiusProfile,
        name: name.to_owned(),
        fields,
        refs: vec![],
        secrets,
    }
}

fn wifi_entity(ssid: &str, wifi: &WifiNetwork) -> CanonicalEntity {
    let mut fields = base_fields(ssid);
    let mut secrets = Vec::new();

    let security = match wifi.security {
        WifiSecurity::Open => "open",
        WifiSecurity::Wpa2 => "wpa2",
        WifiSecurity::Wpa3 => "wpa3",
        WifiSecurity::Wpa3Transition => "wpa3-transition",
    };
    fields.insert("security".into(), json!(security));
    fields.insert("networkconf_id".into(), json!(wifi.network));

    if let Some(ref passphrase) = wifi.passphrase {
        secrets.push(SecretField {
            parent: String::new(),
            field: "x_passphrase".into(),
            secret: passphrase.clone(),
            min_len: wifi.security.requires_passphrase().then_some(8),
            max_len: Some(63),
        });
    }

    if !wifi.bands.is_empty() {
        let mut bands: Vec<&str> = wifi
            .bands
            .iter()
            .map(|band| match band {
                WifiBand::Band2G => "2g",
                WifiBand::Band5G => "5g",
                WifiBand::Band6G => "6g",
            })
            .collect();
        bands.sort_unstable();
        bands.dedup();
        fields.insert("wlan_bands".into(), json!(bands));
    }

    if let Some(ref wpa3) = wifi.wpa3 {
        let pmf = if wpa3.pmf_required { "required" } else { "optional" };
        fields.insert("pmf_mode".into(), json!(pmf));
        fields.insert("fast_roaming_enabled".into(), json!(wpa3.fast_roaming));
    }

    fields.insert("l2_isolation".into(), json!(wifi.client_isolation));
    fields.insert("is_guest".into(), json!(wifi.guest));
    fields.insert("hide_ssid".into(), json!(wifi.hidden));
    fields.insert("enabled".into(), json!(wifi.enabled));

    CanonicalEntity {
        collection: Collection::WifiNetwork,
        name: ssid.to_owned(),
        fields,
        refs: vec![FieldRef {
            field: "networkconf_id".into(),
            collection: Collection::Network,
            target: wifi.network.clone(),
        }],
        secrets,
    }
}

fn port_profile_entity(name: &str, profile: &PortProfile) -> CanonicalEntity {
    let mut fields = base_fields(name);
    let mut refs = Vec::new();

    let forward = match profile.forwarding {
        ForwardingMode::All => "all",
        ForwardingMode::Native => "native",
        ForwardingMode::Custom => "custom",
    };
    fields.insert("forward".into(), json!(forward));

    if let Some(ref native) = profile.native_network {
        fields.insert("native_networkconf_id".into(), json!(native));
        refs.push(FieldRef {
            field: "native_networkconf_id".into(),
            collection: Collection::Network,
            target: native.clone(),
        });
    }

    if !profile.tagged_networks.is_empty() {
        // Tag membership is a set -- sorted for canonical equality.
        let mut tagged = profile.tagged_networks.clone();
        tagged.sort();
        tagged.dedup();
        for target in &tagged {
            refs.push(FieldRef {
                field: "tagged_networkconf_ids".into(),
                collection: Collection::Network,
                target: target.clone(),
            });
        }
        fields.insert("tagged_networkconf_ids".into(), json!(tagged));
    }

    let poe = match profile.poe_mode {
        PoeMode::Auto => "auto",
        PoeMode::Off => "off",
        PoeMode::Passive24v => "passive24v",
    };
    fields.insert("poe_mode".into(), json!(poe));

    if let Some(ref storm) = profile.storm_control {
        fields.insert("storm_ctrl_enabled".into(), json!(storm.enabled));
        if let Some(pct) = storm.broadcast_pct {
            fields.insert("storm_ctrl_broadcast_pct".into(), json!(pct));
        }
        if let Some(pct) = storm.multicast_pct {
            fields.insert("storm_ctrl_multicast_pct".into(), json!(pct));
        }
        if let Some(pct) = storm.unknown_unicast_pct {
            fields.insert("storm_ctrl_unknown_unicast_pct".into(), json!(pct));
        }
    }

    fields.insert("isolation".into(), json!(profile.isolation));

    CanonicalEntity {
        collection: Collection::PortProfile,
        name: name.to_owned(),
        fields,
        refs,
        secrets: vec![],
    }
}

fn traffic_rule_entity(name: &str, rule: &TrafficRule) -> CanonicalEntity {
    let mut fields = base_fields(name);
    let mut refs = Vec::new();

    let action = match rule.action {
        TrafficAction::Allow => "allow",
        TrafficAction::Block => "block",
        TrafficAction::RateLimit => "rate-limit",
    };
    fields.insert("action".into(), json!(action));
    fields.insert("index".into(), json!(rule.index));

    let (match_type, match_value) = match &rule.target {
        MatchTarget::App { app } => ("app", app.clone()),
        MatchTarget::Domain { domain } => ("domain", domain.clone()),
        MatchTarget::Ip { cidr } => ("ip", cidr.as_str().to_owned()),
    };
    fields.insert("match_type".into(), json!(match_type));
    fields.insert("match_value".into(), json!(match_value));

    if let Some(ref network) = rule.network {
        fields.insert("networkconf_id".into(), json!(network));
        refs.push(FieldRef {
            field: "networkconf_id".into(),
            collection: Collection::Network,
            target: network.clone(),
        });
    }

    if let Some(ref bandwidth) = rule.bandwidth {
        if let Some(down) = bandwidth.down_kbps {
            fields.insert("download_limit_kbps".into(), json!(down));
        }
        if let Some(up) = bandwidth.up_kbps {
            fields.insert("upload_limit_kbps".into(), json!(up));
        }
    }

    fields.insert("enabled".into(), json!(rule.enabled));

    CanonicalEntity {
        collection: Collection::TrafficRule,
        name: name.to_owned(),
        fields,
        refs,
        secrets: vec![],
    }
}

fn policy_entity(name: &str, policy: &FirewallPolicy) -> CanonicalEntity {
    let mut fields = base_fields(name);
    let mut refs = Vec::new();

    let action = match policy.action {
        crate::model::FirewallAction::Allow => "allow",
        crate::model::FirewallAction::Block => "block",
        crate::model::FirewallAction::Reject => "reject",
    };
    fields.insert("action".into(), json!(action));
    fields.insert("index".into(), json!(policy.index));

    endpoint_fields(&mut fields, &mut refs, "src", &policy.source);
    endpoint_fields(&mut fields, &mut refs, "dst", &policy.destination);

    let protocol = match policy.protocol {
        Protocol::All => "all",
        Protocol::Tcp => "tcp",
        Protocol::Udp => "udp",
        Protocol::TcpUdp => "tcp_udp",
        Protocol::Icmp => "icmp",
    };
    fields.insert("protocol".into(), json!(protocol));

    if let Some(ref ports) = policy.ports {
        fields.insert("dst_ports".into(), json!(ports));
    }
    fields.insert("logging".into(), json!(policy.logging));
    fields.insert("enabled".into(), json!(policy.enabled));

    CanonicalEntity {
        collection: Collection::FirewallPolicy,
        name: name.to_owned(),
        fields,
        refs,
        secrets: vec![],
    }
}

fn endpoint_fields(
    fields: &mut Map<String, Value>,
    refs: &mut Vec<FieldRef>,
    side: &str,
    endpoint: &PolicyEndpoint,
) {
    fields.insert(format!("{side}_zone_id"), json!(endpoint.zone));
    refs.push(FieldRef {
        field: format!("{side}_zone_id"),
        collection: Collection::FirewallZone,
        target: endpoint.zone.clone(),
    });

    if let Some(ref network) = endpoint.network {
        fields.insert(format!("{side}_network_id"), json!(network));
        refs.push(FieldRef {
            field: format!("{side}_network_id"),
            collection: Collection::Network,
            target: network.clone(),
        });
    }
    if let Some(ref group) = endpoint.group {
        fields.insert(format!("{side}_group_id"), json!(group));
        refs.push(FieldRef {
            field: format!("{side}_group_id"),
            collection: Collection::FirewallGroup,
            target: group.clone(),
        });
    }
    if !endpoint.ips.is_empty() {
        let mut ips = endpoint.ips.clone();
        ips.sort();
        fields.insert(format!("{side}_ips"), json!(ips));
    }
}

fn wireguard_entity(name: &str, server: &WireguardServer) -> CanonicalEntity {
    let mut fields = base_fields(name);
    let mut secrets = vec![SecretField {
        parent: String::new(),
        field: "x_private_key".into(),
        secret: server.private_key.clone(),
        min_len: Some(1),
        max_len: None,
    }];

    fields.insert("vpn_type".into(), json!("wireguard-server"));
    fields.insert("port".into(), json!(server.port));
    fields.insert("subnet".into(), json!(server.subnet.as_str()));

    let peers: Vec<Value> = server
        .peers
        .iter()
        .enumerate()
        .map(|(i, (peer_name, peer))| {
            if let Some(ref psk) = peer.preshared_key {
                secrets.push(SecretField {
                    parent: format!("/peers/{i}"),
                    field: "x_preshared_key".into(),
                    secret: psk.clone(),
                    min_len: Some(1),
                    max_len: None,
                });
            }
            json!({
                "name": peer_name,
                "public_key": peer.public_key,
                "allowed_ips": peer.allowed_ips.iter().map(crate::model::Cidr::as_str).collect::<Vec<_>>(),
            })
        })
        .collect();
    fields.insert("peers".into(), Value::Array(peers));
    fields.insert("enabled".into(), json!(server.enabled));

    CanonicalEntity {
        collection: Collection::VpnConfig,
        name: name.to_owned(),
        fields,
        refs: vec![],
        secrets,
    }
}

fn ipsec_entity(name: &str, tunnel: &IpsecTunnel) -> CanonicalEntity {
    let mut fields = base_fields(name);
    let secrets = vec![SecretField {
        parent: String::new(),
        field: "x_preshared_key".into(),
        secret: tunnel.preshared_key.clone(),
        min_len: Some(1),
        max_len: None,
    }];

    fields.insert("vpn_type".into(), json!("site-to-site"));
    fields.insert("remote_host".into(), json!(tunnel.remote_host));
    fields.insert(
        "remote_subnets".into(),
        json!(sorted_cidrs(&tunnel.remote_subnets)),
    );
    fields.insert(
        "local_subnets".into(),
        json!(sorted_cidrs(&tunnel.local_subnets)),
    );

    if let Some(ref ike) = tunnel.ike {
        fields.insert(
            "ike".into(),
            json!({
                "version": ike.version,
                "encryption": ike.encryption,
                "hash": ike.hash,
                "dh_group": ike.dh_group,
                "lifetime_secs": ike.lifetime_secs,
            }),
        );
    }
    if let Some(ref esp) = tunnel.esp {
        fields.insert(
            "esp".into(),
            json!({
                "encryption": esp.encryption,
                "hash": esp.hash,
                "lifetime_secs": esp.lifetime_secs,
            }),
        );
    }
    fields.insert("enabled".into(), json!(tunnel.enabled));

    CanonicalEntity {
        collection: Collection::VpnConfig,
        name: name.to_owned(),
        fields,
        refs: vec![],
        secrets,
    }
}

fn sorted_cidrs(cidrs: &[crate::model::Cidr]) -> Vec<&str> {
    let mut out: Vec<&str> = cidrs.iter().map(crate::model::Cidr::as_str).collect();
    out.sort_unstable();
    out
}

fn port_forward_entity(name: &str, forward: &PortForward) -> CanonicalEntity {
    let mut fields = base_fields(name);

    let protocol = match forward.protocol {
        ForwardProtocol::Tcp => "tcp",
        ForwardProtocol::Udp => "udp",
        ForwardProtocol::TcpUdp => "tcp_udp",
    };
    fields.insert("protocol".into(), json!(protocol));
    fields.insert("wan_port".into(), json!(forward.wan_port));
    fields.insert("forward_ip".into(), json!(forward.forward_ip));
    fields.insert("forward_port".into(), json!(forward.forward_port));
    if let Some(ref source) = forward.source {
        fields.insert("src_cidr".into(), json!(source.as_str()));
    }
    fields.insert("enabled".into(), json!(forward.enabled));

    CanonicalEntity {
        collection: Collection::PortForward,
        name: name.to_owned(),
        fields,
        refs: vec![],
        secrets: vec![],
    }
}

fn reservation_entity(name: &str, reservation: &DhcpReservation) -> CanonicalEntity {
    let mut fields = base_fields(name);

    fields.insert("mac".into(), json!(reservation.mac.as_str()));
    fields.insert("fixed_ip".into(), json!(reservation.ip));
    fields.insert("networkconf_id".into(), json!(reservation.network));
    if let Some(ref hostname) = reservation.hostname {
        fields.insert("hostname".into(), json!(hostname));
    }

    CanonicalEntity {
        collection: Collection::DhcpReservation,
        name: name.to_owned(),
        fields,
        refs: vec![FieldRef {
            field: "networkconf_id".into(),
            collection: Collection::Network,
            target: reservation.network.clone(),
        }],
        secrets: vec![],
    }
}

fn custom_entity(name: &str, raw: &SchemaBackedEntity) -> CanonicalEntity {
    let mut fields = raw.fields.clone();
    // The map key is authoritative for the logical name.
    fields.insert("name".into(), json!(name));
    fields.insert(MANAGED_BY_FIELD.into(), json!(MANAGED_BY_VALUE));

    CanonicalEntity {
        collection: Collection::Custom(raw.collection.clone()),
        name: name.to_owned(),
        fields,
        refs: vec![],
        secrets: vec![],
    }
}

fn purpose_str(purpose: NetworkPurpose) -> &'static str {
    match purpose {
        NetworkPurpose::Corporate => "corporate",
        NetworkPurpose::Guest => "guest",
        NetworkPurpose::VlanOnly => "vlan-only",
    }
}
