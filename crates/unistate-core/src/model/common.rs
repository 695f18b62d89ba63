// ── Core identity and value types ──
//
// Collection, Cidr, and MacAddress form the foundation of every domain
// type. Cidr and MacAddress deliberately accept any string at
// deserialization time -- the Validator checks well-formedness and
// accumulates violations, so a single run reports every malformed
// value instead of dying on the first parse error.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Collection ──────────────────────────────────────────────────────

/// A configuration collection on the controller.
///
/// The built-in variants carry a fixed dependency order (reference
/// targets before referrers); `Custom` covers vendor collections known
/// only through the schema registry.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Collection {
    Network,
    FirewallZone,
    FirewallGroup,
    RadiusProfile,
    #[strum(serialize = "wifi")]
    WifiNetwork,
    PortProfile,
    TrafficRule,
    FirewallPolicy,
    #[strum(serialize = "vpn")]
    VpnConfig,
    PortForward,
    DhcpReservation,
    #[serde(untagged)]
    #[strum(to_string = "{0}")]
    Custom(String),
}

static DEPENDENCY_ORDER: [Collection; 11] = [
    Collection::Network,
    Collection::FirewallZone,
    Collection::FirewallGroup,
    Collection::RadiusProfile,
    Collection::WifiNetwork,
    Collection::PortProfile,
    Collection::TrafficRule,
    Collection::FirewallPolicy,
    Collection::VpnConfig,
    Collection::PortForward,
    Collection::DhcpReservation,
];

impl Collection {
    /// Built-in collections in dependency order: a collection appears
    /// after every collection it may reference. Creates walk this order
    /// forward; deletes walk it backward.
    pub fn dependency_order() -> &'static [Collection] {
        &DEPENDENCY_ORDER
    }

    /// The REST collection path on the controller.
    pub fn rest_path(&self) -> &str {
        match self {
            Self::Network => "networkconf",
            Self::FirewallZone => "firewallzone",
            Self::FirewallGroup => "firewallgroup",
            Self::RadiusProfile => "radiusprofile",
            Self::WifiNetwork => "wlanconf",
            Self::PortProfile => "portconf",
            Self::TrafficRule => "trafficrule",
            Self::FirewallPolicy => "firewallpolicy",
            Self::VpnConfig => "vpnconfig",
            Self::PortForward => "portforward",
            Self::DhcpReservation => "dhcpreservation",
            Self::Custom(name) => name,
        }
    }
}

// ── Cidr ────────────────────────────────────────────────────────────

/// A CIDR block (e.g. `192.168.10.0/24`), stored as written.
///
/// Well-formedness is a Validator concern; `parse()` exposes the check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cidr(String);

impl Cidr {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse into address + prefix length, checking that the prefix is
    /// valid for the address family.
    pub fn parse(&self) -> Result<(IpAddr, u8), String> {
        let (addr, prefix) = self
            .0
            .split_once('/')
            .ok_or_else(|| format!("'{}' is not CIDR notation (missing '/')", self.0))?;

        let addr: IpAddr = addr
            .parse()
            .map_err(|_| format!("'{addr}' is not a valid IP address"))?;

        let prefix: u8 = prefix
            .parse()
            .map_err(|_| format!("'{prefix}' is not a valid prefix length"))?;

        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix > max {
            return Err(format!("prefix /{prefix} exceeds /{max} for {addr}"));
        }

        Ok((addr, prefix))
    }

    pub fn is_valid(&self) -> bool {
        self.parse().is_ok()
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cidr {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for Cidr {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated form
/// (aa:bb:cc:dd:ee:ff). Accepts colon- or dash-separated input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddress(String);

impl MacAddress {
    /// Create a normalized MAC address from any common format.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw.as_ref().to_lowercase().replace('-', ":");
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check for exactly six colon-separated hex octets.
    pub fn is_valid(&self) -> bool {
        let octets: Vec<&str> = self.0.split(':').collect();
        octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for MacAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cidr_parses_ipv4() {
        let cidr = Cidr::new("192.168.10.0/24");
        let (addr, prefix) = cidr.parse().unwrap();
        assert_eq!(addr.to_string(), "192.168.10.0");
        assert_eq!(prefix, 24);
    }

    #[test]
    fn cidr_parses_ipv6() {
        let cidr = Cidr::new("fd00::/64");
        assert!(cidr.is_valid());
    }

    #[test]
    fn cidr_rejects_bad_prefix() {
        assert!(!Cidr::new("10.0.0.0/33").is_valid());
        assert!(!Cidr::new("10.0.0.0").is_valid());
        assert!(!Cidr::new("not-a-cidr/24").is_valid());
    }

    #[test]
    fn mac_normalizes_dashes_and_case() {
        let mac = MacAddress::new("AA-BB-CC-DD-EE-FF");
        assert_eq!(mac.as_str(), "aa:bb:cc:dd:ee:ff");
        assert!(mac.is_valid());
    }

    #[test]
    fn mac_rejects_malformed() {
        assert!(!MacAddress::new("aa:bb:cc:dd:ee").is_valid());
        assert!(!MacAddress::new("zz:bb:cc:dd:ee:ff").is_valid());
        assert!(!MacAddress::new("aabbccddeeff").is_valid());
    }

    #[test]
    fn dependency_order_puts_networks_first() {
        let order = Collection::dependency_order();
        assert_eq!(order[0], Collection::Network);
        let net = order.iter().position(|c| *c == Collection::Network).unwrap();
        let wifi = order
            .iter()
            .position(|c| *c == Collection::WifiNetwork)
            .unwrap();
        assert!(net < wifi);
    }

    #[test]
    fn custom_collection_rest_path_is_its_name() {
        let c = Collection::Custom("dnsrecord".into());
        assert_eq!(c.rest_path(), "dnsrecord");
        assert_eq!(c.to_string(), "dnsrecord");
    }
}
