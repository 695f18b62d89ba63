// unistate-core: the reconciliation engine.
//
// Data flow: desired-state document -> Validator (using the Schema
// Registry) -> Secret Resolver -> canonical desired state -> Diff
// Engine (against a live-state snapshot) -> changeset -> Apply Engine
// -> report. Everything up to the diff is pure and synchronous; only
// fetching live state and applying the changeset touch the network.

pub mod apply;
pub mod canonical;
pub mod controller;
pub mod diff;
pub mod document;
pub mod error;
pub mod live;
pub mod model;
pub mod report;
pub mod schema;
pub mod secrets;
pub mod validate;

pub use apply::{ApplyMode, ApplyOptions, RetryPolicy, apply};
pub use canonical::{CanonicalEntity, FieldRef, MANAGED_BY_FIELD, MANAGED_BY_VALUE};
pub use controller::Controller;
pub use diff::{Changeset, OpKind, Operation, diff, fetch_collections};
pub use document::DesiredConfig;
pub use error::CoreError;
pub use live::{LiveApi, LiveEntity, LiveSnapshot, LiveStateFetcher};
pub use model::Collection;
pub use report::{Action, OperationOutcome, OperationReport, Report};
pub use schema::{SchemaDescriptor, SchemaRegistry, SchemaVersion};
pub use secrets::{ResolvedState, SecretError, SecretMode, SecretStore, resolve_secrets};
pub use validate::{ValidState, ValidationIssue, validate};
