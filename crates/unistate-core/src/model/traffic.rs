// ── Traffic rule (QoS) domain types ──

use serde::{Deserialize, Serialize};

use super::common::Cidr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrafficAction {
    Allow,
    Block,
    RateLimit,
}

/// What traffic the rule matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MatchTarget {
    /// A DPI-identified application (e.g. `"netflix"`).
    App { app: String },
    /// A domain name and its subdomains.
    Domain { domain: String },
    /// A destination CIDR block.
    Ip { cidr: Cidr },
}

/// Bandwidth ceiling for `rate-limit` rules, in kbps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BandwidthLimit {
    #[serde(default)]
    pub down_kbps: Option<u64>,

    #[serde(default)]
    pub up_kbps: Option<u64>,
}

/// A traffic management rule. `index` orders evaluation and must be
/// unique across all traffic rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrafficRule {
    pub action: TrafficAction,

    pub index: u32,

    pub target: MatchTarget,

    /// Logical name of the network this rule applies to.
    /// Absent = applies to all networks.
    #[serde(default)]
    pub network: Option<String>,

    /// Required when `action` is `rate-limit`.
    #[serde(default)]
    pub bandwidth: Option<BandwidthLimit>,

    #[serde(default = "super::defaults::enabled")]
    pub enabled: bool,
}
