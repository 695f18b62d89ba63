// ── Diff engine ──
//
// Compares validated desired state to a live snapshot and produces the
// ordered changeset that converges the controller. Pure function of
// its two inputs: identical inputs always yield the identical ordered
// changeset, and applying the changeset makes the next diff empty.
//
// Ordering rules:
//   - collections in fixed dependency order, creates/updates first,
//   - within a collection, creates/updates follow declaration order,
//   - deletes come after every create/update, in *reverse* collection
//     order (dependents before dependencies), name-sorted within a
//     collection (live state has no declaration order).
//
// Non-destructiveness: a live entity without the management marker is
// never emitted as a DELETE, regardless of its absence from the
// desired state. Hand-configured objects stay untouched.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::canonical::{CanonicalEntity, FieldRef};
use crate::live::{LiveEntity, LiveSnapshot};
use crate::model::Collection;
use crate::secrets::ResolvedState;

/// What an operation does to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    Create,
    Update { id: String },
    Delete { id: String },
}

impl OpKind {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// One step of the changeset.
#[derive(Debug, Clone)]
pub struct Operation {
    pub collection: Collection,
    pub kind: OpKind,
    pub name: String,
    /// Create: the full canonical document. Update: only the fields
    /// that differ. Delete: empty.
    pub fields: Map<String, Value>,
    /// Reference fields that must be rewritten to device ids at apply.
    pub refs: Vec<FieldRef>,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind.verb(), self.collection, self.name)
    }
}

/// The ordered list of operations converging live state to desired.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    pub operations: Vec<Operation>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    fn count(&self, verb: &str) -> usize {
        self.operations
            .iter()
            .filter(|op| op.kind.verb() == verb)
            .count()
    }

    /// "3 to create, 1 to update, 2 to delete"
    pub fn summary(&self) -> String {
        format!(
            "{} to create, {} to update, {} to delete",
            self.count("create"),
            self.count("update"),
            self.count("delete")
        )
    }
}

/// The collections a run must fetch live state for: every built-in,
/// plus the custom collections the desired state names. (Custom
/// collections nobody declares cannot hold managed entities we would
/// act on, so they are not fetched.)
pub fn fetch_collections(desired: &ResolvedState) -> Vec<Collection> {
    let mut collections: Vec<Collection> = Collection::dependency_order().to_vec();
    let custom: BTreeSet<&Collection> = desired
        .entities
        .iter()
        .filter(|e| matches!(e.collection, Collection::Custom(_)))
        .map(|e| &e.collection)
        .collect();
    collections.extend(custom.into_iter().cloned());
    collections
}

/// Compute the changeset for one run.
pub fn diff(desired: &ResolvedState, live: &LiveSnapshot) -> Changeset {
    let mut operations = Vec::new();
    // One block per collection, in forward order; emitted reversed so
    // dependents delete before their dependencies.
    let mut delete_blocks: Vec<Vec<Operation>> = Vec::new();

    let order = collection_order(desired, live);

    for collection in &order {
        let desired_entities: Vec<&CanonicalEntity> = desired
            .entities
            .iter()
            .filter(|e| e.collection == *collection)
            .collect();
        let live_entities = live.get(collection);

        let live_by_name: HashMap<&str, &LiveEntity> = live_entities
            .iter()
            .map(|e| (e.name.as_str(), e))
            .collect();
        let desired_names: BTreeSet<&str> = desired_entities
            .iter()
            .map(|e| e.name.as_str())
            .collect();

        // Creates and updates, in declaration order.
        for entity in &desired_entities {
            match live_by_name.get(entity.name.as_str()) {
                None => {
                    debug!(collection = %collection, name = %entity.name, "create");
                    operations.push(Operation {
                        collection: collection.clone(),
                        kind: OpKind::Create,
                        name: entity.name.clone(),
                        fields: entity.fields.clone(),
                        refs: entity.refs.clone(),
                    });
                }
                Some(live_entity) => {
                    let changed = changed_fields(&entity.fields, &live_entity.fields);
                    if changed.is_empty() {
                        continue;
                    }
                    debug!(
                        collection = %collection,
                        name = %entity.name,
                        fields = ?changed.keys().collect::<Vec<_>>(),
                        "update"
                    );
                    // Only refs whose field actually changed need
                    // rewriting on the wire.
                    let refs = entity
                        .refs
                        .iter()
                        .filter(|r| changed.contains_key(&r.field))
                        .cloned()
                        .collect();
                    operations.push(Operation {
                        collection: collection.clone(),
                        kind: OpKind::Update {
                            id: live_entity.id.clone(),
                        },
                        name: entity.name.clone(),
                        fields: changed,
                        refs,
                    });
                }
            }
        }

        // Deletes: live-only names carrying the management marker.
        // Unmarked entities are foreign and never touched.
        let mut collection_deletes: Vec<&LiveEntity> = live_entities
            .iter()
            .filter(|e| e.managed && !desired_names.contains(e.name.as_str()))
            .collect();
        collection_deletes.sort_by(|a, b| a.name.cmp(&b.name));

        let block: Vec<Operation> = collection_deletes
            .into_iter()
            .map(|entity| {
                debug!(collection = %collection, name = %entity.name, "delete");
                Operation {
                    collection: collection.clone(),
                    kind: OpKind::Delete {
                        id: entity.id.clone(),
                    },
                    name: entity.name.clone(),
                    fields: Map::new(),
                    refs: Vec::new(),
                }
            })
            .collect();
        if !block.is_empty() {
            delete_blocks.push(block);
        }
    }

    // Deletes run dependents-first: reverse collection order, keeping
    // the name-sorted order within each collection.
    for block in delete_blocks.into_iter().rev() {
        operations.extend(block);
    }

    Changeset { operations }
}

/// Full processing order: built-in dependency order, then any custom
/// collections present on either side, sorted by name.
fn collection_order(desired: &ResolvedState, live: &LiveSnapshot) -> Vec<Collection> {
    let mut order: Vec<Collection> = Collection::dependency_order().to_vec();

    let mut custom: BTreeSet<&Collection> = BTreeSet::new();
    for entity in &desired.entities {
        if matches!(entity.collection, Collection::Custom(_)) {
            custom.insert(&entity.collection);
        }
    }
    for collection in live.collections() {
        if matches!(collection, Collection::Custom(_)) {
            custom.insert(collection);
        }
    }
    order.extend(custom.into_iter().cloned());

    order
}

/// Fields where desired disagrees with live. Compared only over the
/// fields desired specifies -- live-only extras (device bookkeeping,
/// defaulted fields) are ignored.
fn changed_fields(
    desired: &Map<String, Value>,
    live: &Map<String, Value>,
) -> Map<String, Value> {
    let mut changed = Map::new();
    for (key, value) in desired {
        if live.get(key) != Some(value) {
            changed.insert(key.clone(), value.clone());
        }
    }
    changed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(collection: Collection, name: &str, fields: Value) -> CanonicalEntity {
        CanonicalEntity {
            collection,
            name: name.into(),
            fields: fields.as_object().unwrap().clone(),
            refs: vec![],
            secrets: vec![],
        }
    }

    fn live_entity(name: &str, id: &str, fields: Value, managed: bool) -> LiveEntity {
        LiveEntity {
            name: name.into(),
            id: id.into(),
            fields: fields.as_object().unwrap().clone(),
            managed,
        }
    }

    fn resolved(entities: Vec<CanonicalEntity>) -> ResolvedState {
        ResolvedState {
            entities,
            notes: vec![],
        }
    }

    #[test]
    fn equal_states_diff_empty() {
        let desired = resolved(vec![entity(
            Collection::Network,
            "IoT",
            json!({ "name": "IoT", "vlan": 10 }),
        )]);
        let mut live = LiveSnapshot::new();
        live.insert(
            Collection::Network,
            vec![live_entity("IoT", "n1", json!({ "name": "IoT", "vlan": 10 }), true)],
        );

        assert!(diff(&desired, &live).is_empty());
    }

    #[test]
    fn live_extras_do_not_trigger_updates() {
        let desired = resolved(vec![entity(
            Collection::Network,
            "IoT",
            json!({ "name": "IoT", "vlan": 10 }),
        )]);
        let mut live = LiveSnapshot::new();
        live.insert(
            Collection::Network,
            vec![live_entity(
                "IoT",
                "n1",
                json!({ "name": "IoT", "vlan": 10, "attr_hidden_id": "x", "up": true }),
                true,
            )],
        );

        assert!(diff(&desired, &live).is_empty());
    }

    #[test]
    fn update_carries_only_changed_fields() {
        let desired = resolved(vec![entity(
            Collection::Network,
            "IoT",
            json!({ "name": "IoT", "vlan": 20, "isolation_enabled": true }),
        )]);
        let mut live = LiveSnapshot::new();
        live.insert(
            Collection::Network,
            vec![live_entity(
                "IoT",
                "n1",
                json!({ "name": "IoT", "vlan": 10, "isolation_enabled": true }),
                true,
            )],
        );

        let changeset = diff(&desired, &live);
        assert_eq!(changeset.len(), 1);
        let op = &changeset.operations[0];
        assert_eq!(op.kind, OpKind::Update { id: "n1".into() });
        assert_eq!(op.fields.len(), 1);
        assert_eq!(op.fields["vlan"], json!(20));
    }

    #[test]
    fn unmanaged_live_entities_are_never_deleted() {
        let desired = resolved(vec![]);
        let mut live = LiveSnapshot::new();
        live.insert(
            Collection::FirewallPolicy,
            vec![
                live_entity("legacy-rule", "p1", json!({ "name": "legacy-rule" }), false),
                live_entity("old-managed", "p2", json!({ "name": "old-managed" }), true),
            ],
        );

        let changeset = diff(&desired, &live);
        assert_eq!(changeset.len(), 1);
        assert_eq!(changeset.operations[0].name, "old-managed");
        assert!(matches!(changeset.operations[0].kind, OpKind::Delete { .. }));
    }

    #[test]
    fn creates_precede_dependent_creates_and_deletes_reverse() {
        // Desired: new network + new wifi. Live: a stale managed wifi
        // and a stale managed network it references.
        let desired = resolved(vec![
            entity(Collection::Network, "IoT", json!({ "name": "IoT" })),
            entity(Collection::WifiNetwork, "iot", json!({ "name": "iot" })),
        ]);
        let mut live = LiveSnapshot::new();
        live.insert(
            Collection::Network,
            vec![live_entity("OldNet", "n9", json!({ "name": "OldNet" }), true)],
        );
        live.insert(
            Collection::WifiNetwork,
            vec![live_entity("old-ssid", "w9", json!({ "name": "old-ssid" }), true)],
        );

        let changeset = diff(&desired, &live);
        let ops: Vec<String> = changeset
            .operations
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            ops,
            vec![
                "create network/IoT",
                "create wifi/iot",
                "delete wifi/old-ssid",
                "delete network/OldNet",
            ]
        );
    }

    #[test]
    fn diff_is_deterministic() {
        let desired = resolved(vec![
            entity(Collection::Network, "B", json!({ "name": "B", "vlan": 3 })),
            entity(Collection::Network, "A", json!({ "name": "A", "vlan": 2 })),
        ]);
        let mut live = LiveSnapshot::new();
        live.insert(
            Collection::Network,
            vec![
                live_entity("Z", "z1", json!({ "name": "Z" }), true),
                live_entity("Y", "y1", json!({ "name": "Y" }), true),
            ],
        );

        let a: Vec<String> = diff(&desired, &live)
            .operations
            .iter()
            .map(ToString::to_string)
            .collect();
        let b: Vec<String> = diff(&desired, &live)
            .operations
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(a, b);
        // Creates keep declaration order; deletes are name-sorted then
        // reversed per-collection ordering (single collection here, so
        // the sort shows through).
        assert_eq!(
            a,
            vec![
                "create network/B",
                "create network/A",
                "delete network/Y",
                "delete network/Z",
            ]
        );
    }

    #[test]
    fn update_keeps_refs_only_for_changed_fields() {
        let mut desired_entity = entity(
            Collection::WifiNetwork,
            "iot",
            json!({ "name": "iot", "networkconf_id": "IoT", "enabled": false }),
        );
        desired_entity.refs = vec![FieldRef {
            field: "networkconf_id".into(),
            collection: Collection::Network,
            target: "IoT".into(),
        }];
        let desired = resolved(vec![desired_entity]);

        let mut live = LiveSnapshot::new();
        live.insert(
            Collection::WifiNetwork,
            vec![live_entity(
                "iot",
                "w1",
                json!({ "name": "iot", "networkconf_id": "IoT", "enabled": true }),
                true,
            )],
        );

        let changeset = diff(&desired, &live);
        let op = &changeset.operations[0];
        assert_eq!(op.fields.len(), 1);
        assert!(op.fields.contains_key("enabled"));
        // networkconf_id did not change, so no ref needs rewriting.
        assert!(op.refs.is_empty());
    }

    #[test]
    fn custom_collections_diff_after_builtins() {
        let desired = resolved(vec![
            entity(
                Collection::Custom("dnsrecord".into()),
                "nas",
                json!({ "name": "nas", "value": "10.0.0.5" }),
            ),
            entity(Collection::Network, "IoT", json!({ "name": "IoT" })),
        ]);
        let live = LiveSnapshot::new();

        let changeset = diff(&desired, &live);
        let ops: Vec<String> = changeset
            .operations
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(ops, vec!["create network/IoT", "create dnsrecord/nas"]);
    }
}
