// ── RADIUS domain types ──

use serde::{Deserialize, Serialize};

use super::secret::SecretRef;

/// A single RADIUS server endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RadiusServer {
    pub host: String,

    #[serde(default = "super::defaults::radius_auth_port")]
    pub port: u16,

    pub secret: SecretRef,
}

/// A RADIUS profile: auth servers plus optional accounting servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RadiusProfile {
    /// Authentication servers, in failover order. Must not be empty.
    pub auth_servers: Vec<RadiusServer>,

    /// Accounting servers, in failover order.
    #[serde(default)]
    pub acct_servers: Vec<RadiusServer>,
}
