// ── WiFi domain types ──

use serde::{Deserialize, Serialize};

use super::secret::SecretRef;

/// WiFi security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WifiSecurity {
    Open,
    Wpa2,
    Wpa3,
    /// WPA2/WPA3 mixed mode for legacy client compatibility.
    Wpa3Transition,
}

impl WifiSecurity {
    /// Whether this mode requires a passphrase.
    pub fn requires_passphrase(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Whether WPA3 settings apply to this mode.
    pub fn is_wpa3(&self) -> bool {
        matches!(self, Self::Wpa3 | Self::Wpa3Transition)
    }
}

/// Radio band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WifiBand {
    #[serde(rename = "2g")]
    Band2G,
    #[serde(rename = "5g")]
    Band5G,
    #[serde(rename = "6g")]
    Band6G,
}

/// WPA3-specific settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Wpa3Settings {
    /// Require protected management frames (802.11w).
    #[serde(default)]
    pub pmf_required: bool,

    /// 802.11r fast transition.
    #[serde(default)]
    pub fast_roaming: bool,
}

/// A broadcast SSID. The logical name (document map key) is the SSID.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WifiNetwork {
    /// Required for every mode except `open`.
    #[serde(default)]
    pub passphrase: Option<SecretRef>,

    /// Logical name of the network this SSID bridges onto.
    pub network: String,

    pub security: WifiSecurity,

    #[serde(default)]
    pub wpa3: Option<Wpa3Settings>,

    /// Bands to broadcast on. Must not be empty.
    #[serde(default)]
    pub bands: Vec<WifiBand>,

    /// Client-to-client isolation on this SSID.
    #[serde(default)]
    pub client_isolation: bool,

    #[serde(default)]
    pub guest: bool,

    /// Hide the SSID from beacon frames.
    #[serde(default)]
    pub hidden: bool,

    #[serde(default = "super::defaults::enabled")]
    pub enabled: bool,
}
