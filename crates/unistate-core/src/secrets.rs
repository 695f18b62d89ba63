// ── Secret resolver ──
//
// Resolves every SecretRef occurrence in a ValidState in one batched
// pass. Any unresolved reference aborts the whole run -- no partial
// resolution -- and only after resolution do value-dependent
// constraints (passphrase length) run. In dry-run diffing the resolver
// runs leniently: unresolved references drop their field from
// comparison and are surfaced as notes instead of errors.

use std::collections::BTreeSet;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::canonical::{CanonicalEntity, SecretField};
use crate::error::CoreError;
use crate::model::SecretRef;
use crate::validate::{IssueKind, ValidState, ValidationIssue};

/// Backend capable of turning a secret path into its value.
pub trait SecretStore {
    fn resolve(&self, path: &str) -> Result<SecretString, SecretError>;
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("secret backend error for '{path}': {message}")]
    Backend { path: String, message: String },
}

/// How strictly to treat unresolvable references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretMode {
    /// Every reference must resolve. Required before apply.
    Strict,
    /// Unresolved references drop their field and become notes.
    /// Acceptable for dry-run diffing only.
    Lenient,
}

/// Desired state with secrets inlined into the canonical field maps,
/// ready for the diff engine.
#[derive(Debug, Clone)]
pub struct ResolvedState {
    pub entities: Vec<CanonicalEntity>,
    /// Lenient-mode notes about fields left out of comparison.
    pub notes: Vec<String>,
}

/// Resolve every secret in the state.
///
/// Batched: all references are resolved (and all failures collected)
/// before anything else happens, so the error lists every missing path
/// at once. Length constraints run against the resolved values and
/// report as accumulated validation issues.
pub fn resolve_secrets(
    state: ValidState,
    store: &dyn SecretStore,
    mode: SecretMode,
) -> Result<ResolvedState, CoreError> {
    let mut missing: BTreeSet<String> = BTreeSet::new();
    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut notes: Vec<String> = Vec::new();
    let mut entities = Vec::with_capacity(state.entities.len());

    // Pass 1: resolve every reference, collecting all failures.
    let mut resolved: Vec<Vec<Option<SecretString>>> = Vec::with_capacity(state.entities.len());
    for entity in &state.entities {
        let mut values = Vec::with_capacity(entity.secrets.len());
        for slot in &entity.secrets {
            match &slot.secret {
                SecretRef::Literal(value) => values.push(Some(value.clone())),
                SecretRef::Reference(path) => match store.resolve(path) {
                    Ok(value) => values.push(Some(value)),
                    Err(err) => {
                        debug!(path, error = %err, "secret resolution failed");
                        missing.insert(path.clone());
                        values.push(None);
                    }
                },
            }
        }
        resolved.push(values);
    }

    if !missing.is_empty() && mode == SecretMode::Strict {
        return Err(CoreError::SecretResolution {
            missing: missing.into_iter().collect(),
        });
    }

    // Pass 2: inline values and check value-dependent constraints.
    for (entity, values) in state.entities.into_iter().zip(resolved) {
        let mut entity = entity;
        let slots = std::mem::take(&mut entity.secrets);

        for (slot, value) in slots.iter().zip(values) {
            let Some(value) = value else {
                notes.push(format!(
                    "{}/{}: '{}' left out of comparison (unresolved reference)",
                    entity.collection, entity.name, slot.field
                ));
                continue;
            };

            check_length(&entity, slot, value.expose_secret(), &mut issues);
            insert_secret(&mut entity, slot, value.expose_secret());
        }

        entities.push(entity);
    }

    if !issues.is_empty() {
        return Err(CoreError::Validation { issues });
    }

    Ok(ResolvedState { entities, notes })
}

fn check_length(
    entity: &CanonicalEntity,
    slot: &SecretField,
    value: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let len = value.len();
    let min = slot.min_len.unwrap_or(0);
    let max = slot.max_len.unwrap_or(usize::MAX);
    if len < min || len > max {
        issues.push(ValidationIssue {
            collection: entity.collection.clone(),
            name: entity.name.clone(),
            field: Some(slot.field.clone()),
            kind: IssueKind::SecretLength {
                actual: len,
                min,
                max,
            },
        });
    }
}

/// Place a resolved value at the slot's parent pointer + field name.
fn insert_secret(entity: &mut CanonicalEntity, slot: &SecretField, value: &str) {
    if slot.parent.is_empty() {
        entity
            .fields
            .insert(slot.field.clone(), Value::String(value.to_owned()));
        return;
    }

    // Nested slot (e.g. a RADIUS server inside a list): navigate the
    // JSON pointer, then insert into the object found there.
    let mut root = Value::Object(std::mem::take(&mut entity.fields));
    if let Some(Value::Object(parent)) = root.pointer_mut(&slot.parent) {
        parent.insert(slot.field.clone(), Value::String(value.to_owned()));
    }
    if let Value::Object(fields) = root {
        entity.fields = fields;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::document::DesiredConfig;
    use crate::schema::{SchemaRegistry, SchemaVersion};
    use crate::validate::validate;
    use std::collections::HashMap;

    struct MapStore(HashMap<String, String>);

    impl SecretStore for MapStore {
        fn resolve(&self, path: &str) -> Result<SecretString, SecretError> {
            self.0
                .get(path)
                .map(|v| SecretString::from(v.clone()))
                .ok_or_else(|| SecretError::NotFound(path.to_owned()))
        }
    }

    fn valid_state(raw: &str) -> ValidState {
        let schema = SchemaRegistry::builtin();
        let descriptor = schema.resolve(&SchemaVersion::Latest).unwrap();
        validate(&DesiredConfig::from_json_str(raw).unwrap(), descriptor).unwrap()
    }

    const WIFI_DOC: &str = r#"{
        "networks": { "IoT": { "vlan": 10 } },
        "wifi": {
            "iot": {
                "network": "IoT",
                "security": "wpa2",
                "passphrase": { "secret": "env:IOT_PSK" },
                "bands": ["2g"]
            }
        }
    }"#;

    #[test]
    fn literal_secrets_resolve_without_a_store() {
        let state = valid_state(r#"{
            "networks": { "N": {} },
            "wifi": {
                "x": { "network": "N", "security": "wpa2",
                       "passphrase": "longenough", "bands": ["2g"] }
            }
        }"#);
        let resolved =
            resolve_secrets(state, &MapStore(HashMap::new()), SecretMode::Strict).unwrap();

        let wifi = resolved.entities.iter().find(|e| e.name == "x").unwrap();
        assert_eq!(wifi.fields["x_passphrase"], Value::String("longenough".into()));
        assert!(resolved.notes.is_empty());
    }

    #[test]
    fn unresolved_reference_aborts_strict_mode_listing_all_paths() {
        let state = valid_state(r#"{
            "networks": { "N": {} },
            "wifi": {
                "a": { "network": "N", "security": "wpa2",
                       "passphrase": { "secret": "env:A" }, "bands": ["2g"] },
                "b": { "network": "N", "security": "wpa2",
                       "passphrase": { "secret": "env:B" }, "bands": ["2g"] }
            }
        }"#);
        let err =
            resolve_secrets(state, &MapStore(HashMap::new()), SecretMode::Strict).unwrap_err();
        match err {
            CoreError::SecretResolution { missing } => {
                assert_eq!(missing, vec!["env:A".to_owned(), "env:B".to_owned()]);
            }
            other => panic!("expected SecretResolution, got {other:?}"),
        }
    }

    #[test]
    fn lenient_mode_drops_field_and_notes_it() {
        let state = valid_state(WIFI_DOC);
        let resolved =
            resolve_secrets(state, &MapStore(HashMap::new()), SecretMode::Lenient).unwrap();

        let wifi = resolved.entities.iter().find(|e| e.name == "iot").unwrap();
        assert!(!wifi.fields.contains_key("x_passphrase"));
        assert_eq!(resolved.notes.len(), 1);
        assert!(resolved.notes[0].contains("x_passphrase"));
    }

    #[test]
    fn resolved_reference_is_inlined() {
        let state = valid_state(WIFI_DOC);
        let mut secrets = HashMap::new();
        secrets.insert("env:IOT_PSK".to_owned(), "supersecret42".to_owned());

        let resolved =
            resolve_secrets(state, &MapStore(secrets), SecretMode::Strict).unwrap();
        let wifi = resolved.entities.iter().find(|e| e.name == "iot").unwrap();
        assert_eq!(
            wifi.fields["x_passphrase"],
            Value::String("supersecret42".into())
        );
    }

    #[test]
    fn short_passphrase_fails_after_resolution() {
        let state = valid_state(WIFI_DOC);
        let mut secrets = HashMap::new();
        secrets.insert("env:IOT_PSK".to_owned(), "short".to_owned());

        let err = resolve_secrets(state, &MapStore(secrets), SecretMode::Strict).unwrap_err();
        match err {
            CoreError::Validation { issues } => {
                assert_eq!(issues.len(), 1);
                assert!(matches!(
                    issues[0].kind,
                    IssueKind::SecretLength { actual: 5, min: 8, .. }
                ));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn nested_radius_secret_lands_in_server_entry() {
        let state = valid_state(r#"{
            "radiusProfiles": {
                "corp": { "authServers": [ { "host": "10.0.0.5", "secret": "radsecret" } ] }
            }
        }"#);
        let resolved =
            resolve_secrets(state, &MapStore(HashMap::new()), SecretMode::Strict).unwrap();

        let profile = resolved.entities.iter().find(|e| e.name == "corp").unwrap();
        assert_eq!(
            profile.fields["auth_servers"][0]["x_secret"],
            Value::String("radsecret".into())
        );
    }
}
