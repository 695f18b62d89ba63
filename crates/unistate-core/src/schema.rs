// ── Schema registry ──
//
// Per-version collection/field/enum descriptors, extracted out-of-band
// from a running controller and loaded here as JSON. The Validator uses
// descriptors to check schema-backed collections structurally and to
// surface discovered enum value sets in error messages.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// A schema version selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaVersion {
    /// Highest available version.
    Latest,
    /// An exact extracted version. Missing descriptor = hard error.
    Pinned(String),
}

impl FromStr for SchemaVersion {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "latest" => Self::Latest,
            other => Self::Pinned(other.to_owned()),
        })
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Pinned(v) => write!(f, "{v}"),
        }
    }
}

/// The value type of a described field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    List,
    Object,
}

impl FieldType {
    /// Whether a JSON value matches this type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Object => "object",
        };
        write!(f, "{name}")
    }
}

/// One field of a collection, as discovered by extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub required: bool,

    /// Inclusive numeric bounds (integer fields).
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,

    /// Discovered enum value set (string fields).
    #[serde(default)]
    pub values: Option<Vec<String>>,
}

/// All fields of one collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub fields: BTreeMap<String, FieldDescriptor>,
}

/// The full descriptor set for one controller version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub version: String,
    pub collections: BTreeMap<String, CollectionSchema>,
}

impl SchemaDescriptor {
    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    /// Collection names this descriptor knows about.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }
}

/// Resolves a version selector to an extracted descriptor.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    descriptors: BTreeMap<String, SchemaDescriptor>,
}

/// The descriptor extracted from the controller version this release
/// was developed against. Always available, even with no schema dir.
const BUILTIN_DESCRIPTOR: &str = include_str!("../schemas/v9.3.45.json");

impl SchemaRegistry {
    /// A registry containing only the built-in descriptor.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        // The embedded asset is validated by the test suite; a parse
        // failure here is a broken build, not a runtime condition.
        if let Ok(descriptor) = serde_json::from_str::<SchemaDescriptor>(BUILTIN_DESCRIPTOR) {
            registry.insert(descriptor);
        }
        registry
    }

    /// Load every `*.json` descriptor from a directory, on top of the
    /// built-in one. Files that fail to parse are skipped with a warning.
    pub fn from_dir(dir: &Path) -> Result<Self, CoreError> {
        let mut registry = Self::builtin();

        let entries = std::fs::read_dir(dir)
            .map_err(|e| CoreError::Internal(format!("cannot read schema dir {dir:?}: {e}")))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| CoreError::Internal(format!("cannot read {path:?}: {e}")))?;
            match serde_json::from_str::<SchemaDescriptor>(&raw) {
                Ok(descriptor) => registry.insert(descriptor),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping malformed schema descriptor");
                }
            }
        }

        Ok(registry)
    }

    pub fn insert(&mut self, descriptor: SchemaDescriptor) {
        self.descriptors
            .insert(descriptor.version.clone(), descriptor);
    }

    /// Every known version, ascending.
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.descriptors.keys().cloned().collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }

    /// Resolve a selector to a descriptor.
    ///
    /// `Latest` picks the highest version; `Pinned` fails with
    /// `SchemaNotFound` when the exact version has no descriptor.
    pub fn resolve(&self, version: &SchemaVersion) -> Result<&SchemaDescriptor, CoreError> {
        match version {
            SchemaVersion::Latest => self
                .descriptors
                .values()
                .max_by(|a, b| compare_versions(&a.version, &b.version))
                .ok_or_else(|| CoreError::SchemaNotFound {
                    version: "latest".into(),
                    available: vec![],
                }),
            SchemaVersion::Pinned(v) => {
                self.descriptors
                    .get(v)
                    .ok_or_else(|| CoreError::SchemaNotFound {
                        version: v.clone(),
                        available: self.versions(),
                    })
            }
        }
    }
}

/// Compare dotted numeric versions ("9.3.45" < "10.0.1"); non-numeric
/// segments fall back to lexicographic order.
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|seg| seg.parse::<u64>().unwrap_or(0))
            .collect()
    };
    let (va, vb) = (parse(a), parse(b));
    va.cmp(&vb).then_with(|| a.cmp(b))
}
