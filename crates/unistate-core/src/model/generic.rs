// ── Schema-backed generic entities ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An entity in a collection exposed only through the schema registry.
///
/// Vendor collections are an open set discovered at schema-extraction
/// time; modeling each as a static type would explode combinatorially.
/// Instead these carry a raw field map and are validated structurally
/// against the registry's field/enum descriptors, with the same diff
/// and apply guarantees as the named entity types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaBackedEntity {
    /// Collection name as the registry knows it.
    pub collection: String,

    /// Wire-format field map.
    pub fields: Map<String, Value>,
}
