// ── Live state ──
//
// The controller's current configuration, fetched fresh at the start
// of every run. Nothing here persists across runs: the mapping from
// logical name to device-assigned id is always rebuilt from the live
// controller, so diff results can never drift from on-device truth.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::canonical::{MANAGED_BY_FIELD, MANAGED_BY_VALUE, reference_fields};
use crate::error::CoreError;
use crate::model::Collection;

/// One live document, normalized to the same conventions as canonical
/// desired entities: keyed by logical name, reference fields holding
/// logical names (not device ids).
#[derive(Debug, Clone)]
pub struct LiveEntity {
    pub name: String,
    /// Device-assigned identifier, needed for update/delete calls.
    pub id: String,
    pub fields: Map<String, Value>,
    /// Whether this entity carries the management marker. Unmanaged
    /// entities are never proposed for deletion.
    pub managed: bool,
}

/// The complete live view for one run.
#[derive(Debug, Clone, Default)]
pub struct LiveSnapshot {
    collections: BTreeMap<Collection, Vec<LiveEntity>>,
}

impl LiveSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: Collection, entities: Vec<LiveEntity>) {
        self.collections.insert(collection, entities);
    }

    pub fn get(&self, collection: &Collection) -> &[LiveEntity] {
        self.collections
            .get(collection)
            .map_or(&[], Vec::as_slice)
    }

    /// Collections present in the snapshot.
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.collections.keys()
    }

    /// Seed for the apply engine's in-run identity cache:
    /// (collection, logical name) -> device id.
    pub fn identity_map(&self) -> HashMap<(Collection, String), String> {
        let mut map = HashMap::new();
        for (collection, entities) in &self.collections {
            for entity in entities {
                map.insert(
                    (collection.clone(), entity.name.clone()),
                    entity.id.clone(),
                );
            }
        }
        map
    }
}

/// Fetches the live state of a set of collections.
///
/// Implementations return a fully normalized snapshot: entities keyed
/// by logical name with reference fields mapped back from device ids.
pub trait LiveStateFetcher {
    fn snapshot(
        &self,
        collections: &[Collection],
    ) -> impl Future<Output = Result<LiveSnapshot, CoreError>> + Send;
}

/// Mutating operations against the live controller.
pub trait LiveApi {
    /// Create a document; returns the device-assigned id.
    fn create(
        &self,
        collection: &Collection,
        fields: &Map<String, Value>,
    ) -> impl Future<Output = Result<String, CoreError>> + Send;

    fn update(
        &self,
        collection: &Collection,
        id: &str,
        fields: &Map<String, Value>,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn delete(
        &self,
        collection: &Collection,
        id: &str,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

// ── Raw-document normalization ──────────────────────────────────────

/// Normalize raw wire documents into `LiveEntity`s.
///
/// `id_to_name` maps device ids to logical names across every fetched
/// collection; reference fields are rewritten through it so live and
/// desired entities compare in the same namespace. Documents without a
/// usable name are skipped -- they can never match a desired entity.
pub fn normalize_live(
    collection: &Collection,
    raw_docs: Vec<Map<String, Value>>,
    id_to_name: &HashMap<(Collection, String), String>,
) -> Result<Vec<LiveEntity>, CoreError> {
    let mut entities = Vec::with_capacity(raw_docs.len());

    for mut fields in raw_docs {
        let Some(id) = fields.get("_id").and_then(Value::as_str).map(str::to_owned) else {
            return Err(CoreError::MalformedLive {
                collection: collection.clone(),
                message: "document has no _id".into(),
            });
        };
        fields.remove("_id");
        fields.remove("site_id");

        let Some(name) = fields.get("name").and_then(Value::as_str).map(str::to_owned) else {
            tracing::debug!(%collection, id, "skipping unnamed live document");
            continue;
        };

        let managed = fields.get(MANAGED_BY_FIELD).and_then(Value::as_str)
            == Some(MANAGED_BY_VALUE);

        // Rewrite reference fields: device id -> logical name. Ids with
        // no known name (e.g. referencing an entity we did not fetch)
        // are left as-is; they will simply never compare equal.
        for (field, target_collection) in reference_fields(collection) {
            let Some(value) = fields.get_mut(*field) else {
                continue;
            };
            match value {
                Value::String(id) => {
                    if let Some(name) =
                        id_to_name.get(&(target_collection.clone(), id.clone()))
                    {
                        *value = Value::String(name.clone());
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Value::String(id) = item {
                            if let Some(name) =
                                id_to_name.get(&(target_collection.clone(), id.clone()))
                            {
                                *item = Value::String(name.clone());
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        entities.push(LiveEntity {
            name,
            id,
            fields,
            managed,
        });
    }

    Ok(entities)
}

/// Extract (collection, id) -> name for every raw document that has
/// both. First pass of live normalization.
pub fn collect_id_names(
    collection: &Collection,
    raw_docs: &[Map<String, Value>],
) -> impl Iterator<Item = ((Collection, String), String)> {
    raw_docs.iter().filter_map(|doc| {
        let id = doc.get("_id")?.as_str()?;
        let name = doc.get("name")?.as_str()?;
        Some((
            (collection.clone(), id.to_owned()),
            name.to_owned(),
        ))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn normalize_detects_marker_and_strips_bookkeeping() {
        let docs = vec![
            raw(json!({ "_id": "a1", "name": "IoT", "vlan": 10, "x_managed_by": "unistate" })),
            raw(json!({ "_id": "a2", "name": "legacy", "vlan": 20 })),
        ];
        let entities =
            normalize_live(&Collection::Network, docs, &HashMap::new()).unwrap();

        assert_eq!(entities.len(), 2);
        assert!(entities[0].managed);
        assert!(!entities[1].managed);
        assert_eq!(entities[0].id, "a1");
        assert!(!entities[0].fields.contains_key("_id"));
    }

    #[test]
    fn normalize_maps_reference_ids_to_names() {
        let mut id_to_name = HashMap::new();
        id_to_name.insert(
            (Collection::Network, "net-1".to_owned()),
            "IoT".to_owned(),
        );

        let docs = vec![raw(json!({
            "_id": "w1", "name": "iot-ssid", "networkconf_id": "net-1"
        }))];
        let entities =
            normalize_live(&Collection::WifiNetwork, docs, &id_to_name).unwrap();

        assert_eq!(entities[0].fields["networkconf_id"], json!("IoT"));
    }

    #[test]
    fn normalize_rejects_documents_without_id() {
        let docs = vec![raw(json!({ "name": "orphan" }))];
        let err = normalize_live(&Collection::Network, docs, &HashMap::new()).unwrap_err();
        assert!(matches!(err, CoreError::MalformedLive { .. }));
    }

    #[test]
    fn unnamed_documents_are_skipped() {
        let docs = vec![raw(json!({ "_id": "x", "vlan": 1 }))];
        let entities =
            normalize_live(&Collection::Network, docs, &HashMap::new()).unwrap();
        assert!(entities.is_empty());
    }

    #[test]
    fn identity_map_covers_all_collections() {
        let mut snapshot = LiveSnapshot::new();
        snapshot.insert(
            Collection::Network,
            vec![LiveEntity {
                name: "IoT".into(),
                id: "n1".into(),
                fields: Map::new(),
                managed: true,
            }],
        );

        let ids = snapshot.identity_map();
        assert_eq!(
            ids.get(&(Collection::Network, "IoT".into())),
            Some(&"n1".to_owned())
        );
    }
}
