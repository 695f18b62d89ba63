// ── Secret indirection ──
//
// A secret-bearing field is either an inline literal or a reference to
// an external secret store. References resolve in one batched pass
// before any value-dependent constraint runs; literals resolve
// trivially. Resolved values live in `SecretString` so they never leak
// through Debug output.

use secrecy::{ExposeSecret, SecretString};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A secret value or a reference to one.
///
/// Document forms:
/// - `"hunter2"` -- inline literal
/// - `{ "secret": "env:WIFI_PSK" }` -- reference into a secret store
#[derive(Debug, Clone)]
pub enum SecretRef {
    Literal(SecretString),
    Reference(String),
}

impl SecretRef {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(SecretString::from(value.into()))
    }

    pub fn reference(path: impl Into<String>) -> Self {
        Self::Reference(path.into())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference(_))
    }

    /// The store path, if this is a reference.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Reference(path) => Some(path),
            Self::Literal(_) => None,
        }
    }
}

impl<'de> Deserialize<'de> for SecretRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Literal(String),
            Reference { secret: String },
        }

        match Raw::deserialize(deserializer)? {
            Raw::Literal(value) => Ok(Self::Literal(SecretString::from(value))),
            Raw::Reference { secret } => {
                if secret.is_empty() {
                    return Err(de::Error::custom("secret reference path is empty"));
                }
                Ok(Self::Reference(secret))
            }
        }
    }
}

// Literals serialize redacted -- a desired-state document round-tripped
// through the tool must never spill inline secrets into logs or output.
impl Serialize for SecretRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(_) => serializer.serialize_str("<redacted>"),
            Self::Reference(path) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("secret", path)?;
                map.end()
            }
        }
    }
}

impl SecretRef {
    /// Expose the literal value. Returns `None` for references -- those
    /// must go through the resolver.
    pub(crate) fn literal_value(&self) -> Option<&str> {
        match self {
            Self::Literal(value) => Some(value.expose_secret()),
            Self::Reference(_) => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_literal_from_string() {
        let secret: SecretRef = serde_json::from_str(r#""hunter2""#).unwrap();
        assert!(!secret.is_reference());
        assert_eq!(secret.literal_value(), Some("hunter2"));
    }

    #[test]
    fn deserializes_reference_from_map() {
        let secret: SecretRef = serde_json::from_str(r#"{"secret": "env:WIFI_PSK"}"#).unwrap();
        assert!(secret.is_reference());
        assert_eq!(secret.path(), Some("env:WIFI_PSK"));
    }

    #[test]
    fn rejects_empty_reference_path() {
        let result: Result<SecretRef, _> = serde_json::from_str(r#"{"secret": ""}"#);
        assert!(result.is_err());
    }

    #[test]
    fn literal_serializes_redacted() {
        let secret = SecretRef::literal("hunter2");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, r#""<redacted>""#);
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn reference_serializes_as_map() {
        let secret = SecretRef::reference("vault:wifi/psk");
        let json = serde_json::to_string(&secret).unwrap();
        assert_eq!(json, r#"{"secret":"vault:wifi/psk"}"#);
    }
}
