// ── Validator ──
//
// Checks the desired-state document against schema constraints and
// cross-entity invariants. Never fails fast: every violation is
// accumulated and returned together, so one run surfaces all problems.
// Each issue carries collection, logical name, and field -- enough to
// locate the cause without external logs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde_json::{Map, Value};

use crate::canonical::{CanonicalEntity, MANAGED_BY_FIELD, canonicalize};
use crate::document::DesiredConfig;
use crate::model::{Collection, TrafficAction, WifiSecurity};
use crate::schema::{CollectionSchema, FieldType, SchemaDescriptor};

// ── Issue types ─────────────────────────────────────────────────────

/// A single validation violation, located by collection/name/field.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub collection: Collection,
    pub name: String,
    pub field: Option<String>,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    /// A required field is missing or empty.
    MissingField,
    /// A numeric value is outside its inclusive bounds.
    OutOfRange { value: i64, min: i64, max: i64 },
    /// A malformed or semantically invalid value.
    Invalid { value: String, reason: String },
    /// A value outside the descriptor's discovered enum set.
    EnumViolation { value: String, allowed: Vec<String> },
    /// A value of the wrong JSON type for its descriptor.
    TypeMismatch { expected: FieldType },
    /// A reference field naming an entity absent from the desired state.
    DanglingReference {
        target_collection: Collection,
        target: String,
    },
    /// Two networks share a VLAN id.
    DuplicateVlan { vlan: u16, other: String },
    /// Two policies/rules share an evaluation index.
    DuplicateIndex { index: u32, other: String },
    /// Two entities share a logical name within one collection.
    DuplicateName,
    /// A schema-backed collection the registry does not know.
    UnknownCollection { available: Vec<String> },
    /// A field the collection's descriptor does not know.
    UnknownField,
    /// A resolved secret violating a length constraint.
    SecretLength {
        actual: usize,
        min: usize,
        max: usize,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.name)?;
        if let Some(ref field) = self.field {
            write!(f, " field '{field}'")?;
        }
        write!(f, ": ")?;
        match &self.kind {
            IssueKind::MissingField => write!(f, "required but missing"),
            IssueKind::OutOfRange { value, min, max } => {
                write!(f, "value {value} out of range {min}..={max}")
            }
            IssueKind::Invalid { value, reason } => write!(f, "invalid value '{value}': {reason}"),
            IssueKind::EnumViolation { value, allowed } => {
                write!(f, "'{value}' not one of [{}]", allowed.join(", "))
            }
            IssueKind::TypeMismatch { expected } => write!(f, "expected a {expected} value"),
            IssueKind::DanglingReference {
                target_collection,
                target,
            } => write!(f, "references unknown {target_collection} '{target}'"),
            IssueKind::DuplicateVlan { vlan, other } => {
                write!(f, "VLAN {vlan} already used by network '{other}'")
            }
            IssueKind::DuplicateIndex { index, other } => {
                write!(f, "index {index} already used by '{other}'")
            }
            IssueKind::DuplicateName => write!(f, "logical name declared more than once"),
            IssueKind::UnknownCollection { available } => {
                write!(f, "unknown collection (schema knows: {})", available.join(", "))
            }
            IssueKind::UnknownField => write!(f, "not a field of this collection"),
            IssueKind::SecretLength { actual, min, max } => {
                if *max == usize::MAX {
                    write!(f, "resolved secret length {actual} below minimum {min}")
                } else {
                    write!(f, "resolved secret length {actual} outside {min}..={max}")
                }
            }
        }
    }
}

/// The validated, canonicalized desired state. References are still by
/// logical name -- mapping to device ids happens at apply time.
#[derive(Debug, Clone)]
pub struct ValidState {
    pub entities: Vec<CanonicalEntity>,
}

impl ValidState {
    /// Logical names present per collection.
    pub fn names(&self) -> HashMap<&Collection, HashSet<&str>> {
        let mut map: HashMap<&Collection, HashSet<&str>> = HashMap::new();
        for entity in &self.entities {
            map.entry(&entity.collection)
                .or_default()
                .insert(entity.name.as_str());
        }
        map
    }
}

// ── Entry point ─────────────────────────────────────────────────────

/// Validate a desired-state document against a schema descriptor.
///
/// Returns the canonical `ValidState` on success, or every accumulated
/// violation on failure. No network is touched either way.
pub fn validate(
    doc: &DesiredConfig,
    schema: &SchemaDescriptor,
) -> Result<ValidState, Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    let entities = canonicalize(doc);

    check_networks(doc, &mut issues);
    check_wifi(doc, &mut issues);
    check_firewall(doc, &mut issues);
    check_traffic_rules(doc, &mut issues);
    check_radius(doc, &mut issues);
    check_port_profiles(doc, &mut issues);
    check_vpn(doc, &mut issues);
    check_port_forwards(doc, &mut issues);
    check_reservations(doc, &mut issues);
    check_custom_collections(doc, schema, &mut issues);
    check_references(&entities, &mut issues);

    if issues.is_empty() {
        Ok(ValidState { entities })
    } else {
        Err(issues)
    }
}

fn issue(
    collection: Collection,
    name: &str,
    field: Option<&str>,
    kind: IssueKind,
) -> ValidationIssue {
    ValidationIssue {
        collection,
        name: name.to_owned(),
        field: field.map(str::to_owned),
        kind,
    }
}

// ── Per-collection checks ───────────────────────────────────────────

fn check_networks(doc: &DesiredConfig, issues: &mut Vec<ValidationIssue>) {
    let mut vlan_owner: HashMap<u16, &str> = HashMap::new();

    for (name, network) in &doc.networks {
        if let Some(vlan) = network.vlan {
            if !(1..=4094).contains(&vlan) {
                issues.push(issue(
                    Collection::Network,
                    name,
                    Some("vlan"),
                    IssueKind::OutOfRange {
                        value: i64::from(vlan),
                        min: 1,
                        max: 4094,
                    },
                ));
            } else if let Some(other) = vlan_owner.insert(vlan, name) {
                issues.push(issue(
                    Collection::Network,
                    name,
                    Some("vlan"),
                    IssueKind::DuplicateVlan {
                        vlan,
                        other: other.to_owned(),
                    },
                ));
            }
        }

        if let Some(ref subnet) = network.subnet {
            if let Err(reason) = subnet.parse() {
                issues.push(issue(
                    Collection::Network,
                    name,
                    Some("subnet"),
                    IssueKind::Invalid {
                        value: subnet.as_str().to_owned(),
                        reason,
                    },
                ));
            }
        }

        if let Some(ref dhcp) = network.dhcp {
            for (field, addr) in [
                ("dhcp.rangeStart", &dhcp.range_start),
                ("dhcp.rangeStop", &dhcp.range_stop),
            ] {
                if let Some(addr) = addr {
                    check_ipv4(Collection::Network, name, field, addr, issues);
                }
            }
            for dns in &dhcp.dns_servers {
                check_ip(Collection::Network, name, "dhcp.dnsServers", dns, issues);
            }
        }
    }
}

fn check_wifi(doc: &DesiredConfig, issues: &mut Vec<ValidationIssue>) {
    for (ssid, wifi) in &doc.wifi {
        if ssid.is_empty() || ssid.len() > 32 {
            issues.push(issue(
                Collection::WifiNetwork,
                ssid,
                None,
                IssueKind::Invalid {
                    value: ssid.clone(),
                    reason: "SSID must be 1-32 bytes".into(),
                },
            ));
        }

        if wifi.security.requires_passphrase() && wifi.passphrase.is_none() {
            issues.push(issue(
                Collection::WifiNetwork,
                ssid,
                Some("passphrase"),
                IssueKind::MissingField,
            ));
        }
        if wifi.security == WifiSecurity::Open && wifi.passphrase.is_some() {
            issues.push(issue(
                Collection::WifiNetwork,
                ssid,
                Some("passphrase"),
                IssueKind::Invalid {
                    value: "<secret>".into(),
                    reason: "open networks take no passphrase".into(),
                },
            ));
        }
        if wifi.wpa3.is_some() && !wifi.security.is_wpa3() {
            issues.push(issue(
                Collection::WifiNetwork,
                ssid,
                Some("wpa3"),
                IssueKind::Invalid {
                    value: format!("{:?}", wifi.security),
                    reason: "wpa3 settings require a wpa3 security mode".into(),
                },
            ));
        }
        if wifi.bands.is_empty() {
            issues.push(issue(
                Collection::WifiNetwork,
                ssid,
                Some("bands"),
                IssueKind::MissingField,
            ));
        }
    }
}

fn check_firewall(doc: &DesiredConfig, issues: &mut Vec<ValidationIssue>) {
    for (name, group) in &doc.firewall.groups {
        if group.members.is_empty() {
            issues.push(issue(
                Collection::FirewallGroup,
                name,
                Some("members"),
                IssueKind::MissingField,
            ));
        }
    }

    let mut index_owner: HashMap<u32, &str> = HashMap::new();
    for (name, policy) in &doc.firewall.policies {
        if let Some(other) = index_owner.insert(policy.index, name) {
            issues.push(issue(
                Collection::FirewallPolicy,
                name,
                Some("index"),
                IssueKind::DuplicateIndex {
                    index: policy.index,
                    other: other.to_owned(),
                },
            ));
        }

        for (field, endpoint) in [("source", &policy.source), ("destination", &policy.destination)]
        {
            for ip in &endpoint.ips {
                check_ip(Collection::FirewallPolicy, name, field, ip, issues);
            }
        }

        if let Some(ref ports) = policy.ports {
            if let Err(reason) = parse_port_spec(ports) {
                issues.push(issue(
                    Collection::FirewallPolicy,
                    name,
                    Some("ports"),
                    IssueKind::Invalid {
                        value: ports.clone(),
                        reason,
                    },
                ));
            }
        }
    }
}

fn check_traffic_rules(doc: &DesiredConfig, issues: &mut Vec<ValidationIssue>) {
    let mut index_owner: HashMap<u32, &str> = HashMap::new();

    for (name, rule) in &doc.traffic_rules {
        if let Some(other) = index_owner.insert(rule.index, name) {
            issues.push(issue(
                Collection::TrafficRule,
                name,
                Some("index"),
                IssueKind::DuplicateIndex {
                    index: rule.index,
                    other: other.to_owned(),
                },
            ));
        }

        if let crate::model::MatchTarget::Ip { ref cidr } = rule.target {
            if let Err(reason) = cidr.parse() {
                issues.push(issue(
                    Collection::TrafficRule,
                    name,
                    Some("target.cidr"),
                    IssueKind::Invalid {
                        value: cidr.as_str().to_owned(),
                        reason,
                    },
                ));
            }
        }

        match (&rule.action, &rule.bandwidth) {
            (TrafficAction::RateLimit, None) => {
                issues.push(issue(
                    Collection::TrafficRule,
                    name,
                    Some("bandwidth"),
                    IssueKind::MissingField,
                ));
            }
            (TrafficAction::RateLimit, Some(bw)) => {
                for (field, limit) in [("bandwidth.downKbps", bw.down_kbps), ("bandwidth.upKbps", bw.up_kbps)] {
                    if limit == Some(0) {
                        issues.push(issue(
                            Collection::TrafficRule,
                            name,
                            Some(field),
                            IssueKind::OutOfRange {
                                value: 0,
                                min: 1,
                                max: i64::MAX,
                            },
                        ));
                    }
                }
                if bw.down_kbps.is_none() && bw.up_kbps.is_none() {
                    issues.push(issue(
                        Collection::TrafficRule,
                        name,
                        Some("bandwidth"),
                        IssueKind::MissingField,
                    ));
                }
            }
            _ => {}
        }
    }
}

fn check_radius(doc: &DesiredConfig, issues: &mut Vec<ValidationIssue>) {
    for (name, profile) in &doc.radius_profiles {
        if profile.auth_servers.is_empty() {
            issues.push(issue(
                Collection::RadiusProfile,
                name,
                Some("authServers"),
                IssueKind::MissingField,
            ));
        }
        for server in profile.auth_servers.iter().chain(&profile.acct_servers) {
            if server.host.is_empty() {
                issues.push(issue(
                    Collection::RadiusProfile,
                    name,
                    Some("host"),
                    IssueKind::MissingField,
                ));
            }
            if server.port == 0 {
                issues.push(issue(
                    Collection::RadiusProfile,
                    name,
                    Some("port"),
                    IssueKind::OutOfRange {
                        value: 0,
                        min: 1,
                        max: 65535,
                    },
                ));
            }
        }
    }
}

fn check_port_profiles(doc: &DesiredConfig, issues: &mut Vec<ValidationIssue>) {
    for (name, profile) in &doc.port_profiles {
        if profile.forwarding == crate::model::ForwardingMode::Custom
            && profile.tagged_networks.is_empty()
        {
            issues.push(issue(
                Collection::PortProfile,
                name,
                Some("taggedNetworks"),
                IssueKind::MissingField,
            ));
        }

        if let Some(ref storm) = profile.storm_control {
            for (field, pct) in [
                ("stormControl.broadcastPct", storm.broadcast_pct),
                ("stormControl.multicastPct", storm.multicast_pct),
                ("stormControl.unknownUnicastPct", storm.unknown_unicast_pct),
            ] {
                if let Some(pct) = pct {
                    if pct > 100 {
                        issues.push(issue(
                            Collection::PortProfile,
                            name,
                            Some(field),
                            IssueKind::OutOfRange {
                                value: i64::from(pct),
                                min: 0,
                                max: 100,
                            },
                        ));
                    }
                }
            }
        }
    }
}

fn check_vpn(doc: &DesiredConfig, issues: &mut Vec<ValidationIssue>) {
    // WireGuard servers and site-to-site tunnels share the vpn
    // collection's namespace.
    for name in doc.vpn.wireguard.keys() {
        if doc.vpn.site_to_site.contains_key(name) {
            issues.push(issue(
                Collection::VpnConfig,
                name,
                None,
                IssueKind::DuplicateName,
            ));
        }
    }

    for (name, server) in &doc.vpn.wireguard {
        if let Err(reason) = server.subnet.parse() {
            issues.push(issue(
                Collection::VpnConfig,
                name,
                Some("subnet"),
                IssueKind::Invalid {
                    value: server.subnet.as_str().to_owned(),
                    reason,
                },
            ));
        }
        for (peer_name, peer) in &server.peers {
            let key_field = format!("peers.{peer_name}.publicKey");
            let ips_field = format!("peers.{peer_name}.allowedIps");
            if peer.public_key.is_empty() {
                issues.push(issue(
                    Collection::VpnConfig,
                    name,
                    Some(&key_field),
                    IssueKind::MissingField,
                ));
            }
            if peer.allowed_ips.is_empty() {
                issues.push(issue(
                    Collection::VpnConfig,
                    name,
                    Some(&ips_field),
                    IssueKind::MissingField,
                ));
            }
            for cidr in &peer.allowed_ips {
                if let Err(reason) = cidr.parse() {
                    issues.push(issue(
                        Collection::VpnConfig,
                        name,
                        Some(&ips_field),
                        IssueKind::Invalid {
                            value: cidr.as_str().to_owned(),
                            reason,
                        },
                    ));
                }
            }
        }
    }

    for (name, tunnel) in &doc.vpn.site_to_site {
        if tunnel.remote_host.is_empty() {
            issues.push(issue(
                Collection::VpnConfig,
                name,
                Some("remoteHost"),
                IssueKind::MissingField,
            ));
        }
        for (field, subnets) in [
            ("remoteSubnets", &tunnel.remote_subnets),
            ("localSubnets", &tunnel.local_subnets),
        ] {
            if subnets.is_empty() {
                issues.push(issue(
                    Collection::VpnConfig,
                    name,
                    Some(field),
                    IssueKind::MissingField,
                ));
            }
            for cidr in subnets {
                if let Err(reason) = cidr.parse() {
                    issues.push(issue(
                        Collection::VpnConfig,
                        name,
                        Some(field),
                        IssueKind::Invalid {
                            value: cidr.as_str().to_owned(),
                            reason,
                        },
                    ));
                }
            }
        }
        if let Some(ref ike) = tunnel.ike {
            if !(1..=2).contains(&ike.version) {
                issues.push(issue(
                    Collection::VpnConfig,
                    name,
                    Some("ike.version"),
                    IssueKind::OutOfRange {
                        value: i64::from(ike.version),
                        min: 1,
                        max: 2,
                    },
                ));
            }
        }
    }
}

fn check_port_forwards(doc: &DesiredConfig, issues: &mut Vec<ValidationIssue>) {
    for (name, forward) in &doc.port_forwards {
        for (field, port) in [("wanPort", forward.wan_port), ("forwardPort", forward.forward_port)] {
            if port == 0 {
                issues.push(issue(
                    Collection::PortForward,
                    name,
                    Some(field),
                    IssueKind::OutOfRange {
                        value: 0,
                        min: 1,
                        max: 65535,
                    },
                ));
            }
        }
        check_ipv4(
            Collection::PortForward,
            name,
            "forwardIp",
            &forward.forward_ip,
            issues,
        );
        if let Some(ref source) = forward.source {
            if let Err(reason) = source.parse() {
                issues.push(issue(
                    Collection::PortForward,
                    name,
                    Some("source"),
                    IssueKind::Invalid {
                        value: source.as_str().to_owned(),
                        reason,
                    },
                ));
            }
        }
    }
}

fn check_reservations(doc: &DesiredConfig, issues: &mut Vec<ValidationIssue>) {
    let mut mac_owner: HashMap<&str, &str> = HashMap::new();

    for (name, reservation) in &doc.dhcp_reservations {
        if !reservation.mac.is_valid() {
            issues.push(issue(
                Collection::DhcpReservation,
                name,
                Some("mac"),
                IssueKind::Invalid {
                    value: reservation.mac.as_str().to_owned(),
                    reason: "not a valid MAC address".into(),
                },
            ));
        } else if let Some(other) = mac_owner.insert(reservation.mac.as_str(), name) {
            issues.push(issue(
                Collection::DhcpReservation,
                name,
                Some("mac"),
                IssueKind::Invalid {
                    value: reservation.mac.as_str().to_owned(),
                    reason: format!("MAC already reserved by '{other}'"),
                },
            ));
        }
        check_ipv4(
            Collection::DhcpReservation,
            name,
            "ip",
            &reservation.ip,
            issues,
        );
    }
}

fn check_custom_collections(
    doc: &DesiredConfig,
    schema: &SchemaDescriptor,
    issues: &mut Vec<ValidationIssue>,
) {
    for (collection_name, entries) in &doc.collections {
        let collection = Collection::Custom(collection_name.clone());

        let Some(descriptor) = schema.collection(collection_name) else {
            let available: Vec<String> =
                schema.collection_names().map(str::to_owned).collect();
            for name in entries.keys() {
                issues.push(issue(
                    collection.clone(),
                    name,
                    None,
                    IssueKind::UnknownCollection {
                        available: available.clone(),
                    },
                ));
            }
            continue;
        };

        for (name, fields) in entries {
            check_generic_entity(&collection, name, fields, descriptor, issues);
        }
    }
}

/// Structural validation of one schema-backed entity against its
/// collection descriptor.
fn check_generic_entity(
    collection: &Collection,
    name: &str,
    fields: &Map<String, Value>,
    descriptor: &CollectionSchema,
    issues: &mut Vec<ValidationIssue>,
) {
    // Required fields. `name` is injected from the map key, so it never
    // counts as missing.
    for (field, desc) in &descriptor.fields {
        if desc.required && field != "name" && !fields.contains_key(field) {
            issues.push(issue(
                collection.clone(),
                name,
                Some(field),
                IssueKind::MissingField,
            ));
        }
    }

    for (field, value) in fields {
        if field == "name" || field == MANAGED_BY_FIELD {
            continue;
        }
        let Some(desc) = descriptor.fields.get(field) else {
            issues.push(issue(
                collection.clone(),
                name,
                Some(field),
                IssueKind::UnknownField,
            ));
            continue;
        };

        if !desc.field_type.matches(value) {
            issues.push(issue(
                collection.clone(),
                name,
                Some(field),
                IssueKind::TypeMismatch {
                    expected: desc.field_type,
                },
            ));
            continue;
        }

        if let Some(ref allowed) = desc.values {
            if let Some(s) = value.as_str() {
                if !allowed.iter().any(|v| v == s) {
                    issues.push(issue(
                        collection.clone(),
                        name,
                        Some(field),
                        IssueKind::EnumViolation {
                            value: s.to_owned(),
                            allowed: allowed.clone(),
                        },
                    ));
                }
            }
        }

        if let Some(n) = value.as_i64() {
            let min = desc.min.unwrap_or(i64::MIN);
            let max = desc.max.unwrap_or(i64::MAX);
            if n < min || n > max {
                issues.push(issue(
                    collection.clone(),
                    name,
                    Some(field),
                    IssueKind::OutOfRange { value: n, min, max },
                ));
            }
        }
    }
}

/// Every reference field must resolve to an entity of the referenced
/// kind present in the same desired state. Fail-closed otherwise.
fn check_references(entities: &[CanonicalEntity], issues: &mut Vec<ValidationIssue>) {
    let mut names: HashMap<&Collection, BTreeSet<&str>> = HashMap::new();
    for entity in entities {
        names
            .entry(&entity.collection)
            .or_default()
            .insert(entity.name.as_str());
    }

    for entity in entities {
        for field_ref in &entity.refs {
            let known = names
                .get(&field_ref.collection)
                .is_some_and(|set| set.contains(field_ref.target.as_str()));
            if !known {
                issues.push(ValidationIssue {
                    collection: entity.collection.clone(),
                    name: entity.name.clone(),
                    field: Some(field_ref.field.clone()),
                    kind: IssueKind::DanglingReference {
                        target_collection: field_ref.collection.clone(),
                        target: field_ref.target.clone(),
                    },
                });
            }
        }
    }
}

// ── Value helpers ───────────────────────────────────────────────────

fn check_ipv4(
    collection: Collection,
    name: &str,
    field: &str,
    value: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    if value.parse::<std::net::Ipv4Addr>().is_err() {
        issues.push(issue(
            collection,
            name,
            Some(field),
            IssueKind::Invalid {
                value: value.to_owned(),
                reason: "not a valid IPv4 address".into(),
            },
        ));
    }
}

fn check_ip(
    collection: Collection,
    name: &str,
    field: &str,
    value: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    if value.parse::<std::net::IpAddr>().is_err() {
        issues.push(issue(
            collection,
            name,
            Some(field),
            IssueKind::Invalid {
                value: value.to_owned(),
                reason: "not a valid IP address".into(),
            },
        ));
    }
}

/// Accept `"443"` or `"8000-8080"` with both ends nonzero and ordered.
fn parse_port_spec(spec: &str) -> Result<(), String> {
    let parse_one = |s: &str| -> Result<u16, String> {
        let port: u16 = s
            .parse()
            .map_err(|_| format!("'{s}' is not a port number"))?;
        if port == 0 {
            return Err("port 0 is not addressable".into());
        }
        Ok(port)
    };

    match spec.split_once('-') {
        None => parse_one(spec).map(|_| ()),
        Some((lo, hi)) => {
            let (lo, hi) = (parse_one(lo)?, parse_one(hi)?);
            if lo > hi {
                return Err(format!("range {lo}-{hi} is inverted"));
            }
            Ok(())
        }
    }
}
