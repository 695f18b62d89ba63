// ── Core error types ──
//
// User-facing errors from unistate-core. These are NOT transport-specific --
// consumers never see raw HTTP failures without the collection context
// that locates the cause. Validation problems are carried as a list:
// one run surfaces every violation, not just the first.

use thiserror::Error;

use crate::model::Collection;
use crate::validate::ValidationIssue;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Pre-flight errors (no network call has happened) ─────────────
    /// The desired state failed validation. Carries every accumulated
    /// violation so a single run reports all problems at once.
    #[error("Validation failed with {} issue(s)", issues.len())]
    Validation { issues: Vec<ValidationIssue> },

    /// One or more secret references could not be resolved. The whole
    /// run aborts -- there is no partial resolution.
    #[error("Unresolved secret reference(s): {}", missing.join(", "))]
    SecretResolution { missing: Vec<String> },

    /// A pinned schema version has no extracted descriptor.
    #[error("Schema version '{version}' not found (available: {})", available.join(", "))]
    SchemaNotFound {
        version: String,
        available: Vec<String>,
    },

    // ── Live-state errors ────────────────────────────────────────────
    /// Fetching a collection's live state failed.
    #[error("Failed to fetch live state for '{collection}': {source}")]
    Fetch {
        collection: Collection,
        #[source]
        source: unistate_api::Error,
    },

    /// A live document is missing a field the reconciler requires
    /// (e.g. its device-assigned id).
    #[error("Malformed live document in '{collection}': {message}")]
    MalformedLive {
        collection: Collection,
        message: String,
    },

    // ── Apply errors ─────────────────────────────────────────────────
    /// An operation was skipped because an entity it references failed.
    /// Reported in the run's outcome, never retried automatically.
    #[error("'{collection}/{name}' skipped: dependency failed ({cause})")]
    DependencyFailed {
        collection: Collection,
        name: String,
        cause: String,
    },

    /// An API call failed (wrapped; retryability comes from the source).
    #[error("API error: {0}")]
    Api(#[from] unistate_api::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if the underlying failure is transient and the
    /// operation may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            Self::Fetch { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}
