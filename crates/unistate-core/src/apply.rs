// ── Apply engine ──
//
// Executes a changeset against the live controller, or simulates it.
// A run is single-flow across dependency stages: a stage never starts
// until the previous stage's operations have resolved. Within a stage,
// operations that reference nothing created earlier in the same run
// are dispatched concurrently (bounded, controller round-trips
// dominate wall-clock); operations with in-run dependencies follow
// sequentially.
//
// Failure policy: when an operation fails, every operation that
// references that entity is skipped; independent branches continue.
// Transient failures retry with bounded exponential backoff; terminal
// rejections surface immediately. Once cancellation fires, in-flight
// operations finish but nothing new starts.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::diff::{Changeset, OpKind, Operation};
use crate::error::CoreError;
use crate::live::{LiveApi, LiveSnapshot};
use crate::model::Collection;
use crate::report::{Action, OperationOutcome, OperationReport, Report};

/// Real mutation or simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    Real,
    DryRun,
}

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): base * 2^attempt.
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Caller-tunable apply behavior.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    pub mode: ApplyMode,
    /// Concurrent in-flight operations per stage. Keep small -- an
    /// embedded controller saturates quickly.
    pub concurrency: usize,
    pub cancel: CancellationToken,
    pub retry: RetryPolicy,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            mode: ApplyMode::Real,
            concurrency: 4,
            cancel: CancellationToken::new(),
            retry: RetryPolicy::default(),
        }
    }
}

type EntityKey = (Collection, String);

/// Execute (or simulate) a changeset. Always returns a report -- apply
/// failures are per-operation outcomes, not errors.
pub async fn apply<A: LiveApi + Sync>(
    changeset: &Changeset,
    api: &A,
    live: &LiveSnapshot,
    options: &ApplyOptions,
) -> Report {
    let started_at = Utc::now();
    let run_id = uuid::Uuid::new_v4();

    if options.mode == ApplyMode::DryRun {
        let operations = changeset
            .operations
            .iter()
            .map(|op| OperationReport {
                collection: op.collection.clone(),
                name: op.name.clone(),
                action: Action::from(&op.kind),
                outcome: OperationOutcome::Planned,
            })
            .collect();
        return Report {
            run_id,
            operations,
            started_at,
            finished_at: Utc::now(),
            dry_run: true,
        };
    }

    info!(%run_id, operations = changeset.len(), "starting apply run");

    let mut run = Run {
        api,
        options,
        identity: live.identity_map(),
        created_this_run: HashSet::new(),
        failed: HashMap::new(),
        outcomes: vec![None; changeset.operations.len()],
    };

    for stage in stages(changeset) {
        run.execute_stage(changeset, &stage).await;
    }

    let operations = changeset
        .operations
        .iter()
        .zip(run.outcomes)
        .map(|(op, outcome)| OperationReport {
            collection: op.collection.clone(),
            name: op.name.clone(),
            action: Action::from(&op.kind),
            // Every index is filled by execute_stage; None cannot
            // survive a completed run.
            outcome: outcome.unwrap_or(OperationOutcome::Cancelled),
        })
        .collect();

    let report = Report {
        run_id,
        operations,
        started_at,
        finished_at: Utc::now(),
        dry_run: false,
    };
    info!(%run_id, summary = %report.summary(), "apply finished");
    report
}

/// Contiguous runs of the same collection form the dependency stages.
/// (The diff engine orders the changeset so that creates/updates of a
/// collection are contiguous, as are its deletes.)
fn stages(changeset: &Changeset) -> Vec<Vec<usize>> {
    let mut stages: Vec<Vec<usize>> = Vec::new();
    let mut last: Option<&Collection> = None;

    for (idx, op) in changeset.operations.iter().enumerate() {
        if last != Some(&op.collection) {
            stages.push(Vec::new());
            last = Some(&op.collection);
        }
        if let Some(stage) = stages.last_mut() {
            stage.push(idx);
        }
    }
    stages
}

struct Run<'a, A> {
    api: &'a A,
    options: &'a ApplyOptions,
    /// Logical name -> device id, seeded from the live snapshot and
    /// extended by every create. Scoped to this run only.
    identity: HashMap<EntityKey, String>,
    created_this_run: HashSet<EntityKey>,
    /// Failed entities and their cause, for dependent skipping.
    failed: HashMap<EntityKey, String>,
    outcomes: Vec<Option<OperationOutcome>>,
}

impl<A: LiveApi + Sync> Run<'_, A> {
    async fn execute_stage(&mut self, changeset: &Changeset, stage: &[usize]) {
        // Operations referencing an entity created earlier in this run
        // must wait for the concurrent batch (their reference ids are
        // fresh); everything else fans out to the worker pool.
        let (independent, dependent): (Vec<usize>, Vec<usize>) =
            stage.iter().copied().partition(|&idx| {
                !changeset.operations[idx]
                    .refs
                    .iter()
                    .any(|r| self.created_this_run.contains(&(r.collection.clone(), r.target.clone())))
            });

        let mut batch: FuturesUnordered<_> = FuturesUnordered::new();
        let mut pending = independent.into_iter();
        let mut results: Vec<(usize, OpResult)> = Vec::new();

        // Prime up to `concurrency` operations, then keep the window
        // full as results come back.
        for _ in 0..self.options.concurrency.max(1) {
            if let Some(idx) = pending.next() {
                batch.push(self.run_op(idx, &changeset.operations[idx]));
            }
        }
        while let Some(result) = batch.next().await {
            results.push(result);
            if let Some(idx) = pending.next() {
                batch.push(self.run_op(idx, &changeset.operations[idx]));
            }
        }
        drop(batch);

        for (idx, result) in results {
            self.record(&changeset.operations[idx], idx, result);
        }

        // In-run-dependent operations execute sequentially.
        for idx in dependent {
            let result = self.run_op(idx, &changeset.operations[idx]).await.1;
            self.record(&changeset.operations[idx], idx, result);
        }
    }

    /// Execute one operation: cancellation check, dependency check,
    /// reference rewrite, API call with bounded retries.
    async fn run_op(&self, idx: usize, op: &Operation) -> (usize, OpResult) {
        if self.options.cancel.is_cancelled() {
            return (idx, OpResult::Cancelled);
        }

        // Skip when a referenced entity already failed this run.
        for field_ref in &op.refs {
            let key = (field_ref.collection.clone(), field_ref.target.clone());
            if let Some(cause) = self.failed.get(&key) {
                let reason = CoreError::DependencyFailed {
                    collection: field_ref.collection.clone(),
                    name: field_ref.target.clone(),
                    cause: cause.clone(),
                };
                warn!(op = %op, "skipping: {reason}");
                return (idx, OpResult::Skipped(reason.to_string()));
            }
        }

        let fields = match rewrite_refs(op, &self.identity) {
            Ok(fields) => fields,
            Err(cause) => return (idx, OpResult::Failed(cause)),
        };

        let mut attempt = 0;
        loop {
            let result = self.call(op, &fields).await;
            match result {
                Ok(id) => return (idx, OpResult::Succeeded(id)),
                Err(err) if err.is_retryable() && attempt + 1 < self.options.retry.max_attempts => {
                    let delay = self.options.retry.delay(attempt);
                    debug!(op = %op, attempt, ?delay, error = %err, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                    if self.options.cancel.is_cancelled() {
                        return (idx, OpResult::Cancelled);
                    }
                    attempt += 1;
                }
                Err(err) => return (idx, OpResult::Failed(err.to_string())),
            }
        }
    }

    async fn call(
        &self,
        op: &Operation,
        fields: &Map<String, Value>,
    ) -> Result<Option<String>, CoreError> {
        match &op.kind {
            OpKind::Create => {
                let id = self.api.create(&op.collection, fields).await?;
                Ok(Some(id))
            }
            OpKind::Update { id } => {
                self.api.update(&op.collection, id, fields).await?;
                Ok(None)
            }
            OpKind::Delete { id } => {
                self.api.delete(&op.collection, id).await?;
                Ok(None)
            }
        }
    }

    /// Fold one result into run state and the report.
    fn record(&mut self, op: &Operation, idx: usize, result: OpResult) {
        let key = (op.collection.clone(), op.name.clone());
        let outcome = match result {
            OpResult::Succeeded(id) => {
                if let Some(ref id) = id {
                    self.identity.insert(key.clone(), id.clone());
                    self.created_this_run.insert(key);
                }
                OperationOutcome::Succeeded { id }
            }
            OpResult::Failed(cause) => {
                warn!(op = %op, cause, "operation failed");
                self.failed.insert(key, cause.clone());
                OperationOutcome::Failed { cause }
            }
            OpResult::Skipped(cause) => {
                // A skipped create also blocks its own dependents.
                self.failed.insert(key, cause.clone());
                OperationOutcome::Skipped { cause }
            }
            OpResult::Cancelled => OperationOutcome::Cancelled,
        };
        if let Some(slot) = self.outcomes.get_mut(idx) {
            *slot = Some(outcome);
        }
    }
}

enum OpResult {
    Succeeded(Option<String>),
    Failed(String),
    Skipped(String),
    Cancelled,
}

/// Swap logical names for device ids in every reference field.
fn rewrite_refs(
    op: &Operation,
    identity: &HashMap<EntityKey, String>,
) -> Result<Map<String, Value>, String> {
    let mut fields = op.fields.clone();

    for field_ref in &op.refs {
        let key = (field_ref.collection.clone(), field_ref.target.clone());
        let Some(id) = identity.get(&key) else {
            return Err(format!(
                "no device id for {}/{}",
                field_ref.collection, field_ref.target
            ));
        };

        match fields.get_mut(&field_ref.field) {
            Some(Value::String(value)) => {
                if *value == field_ref.target {
                    *value = id.clone();
                }
            }
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if item.as_str() == Some(field_ref.target.as_str()) {
                        *item = Value::String(id.clone());
                    }
                }
            }
            _ => {}
        }
    }

    Ok(fields)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::canonical::FieldRef;
    use crate::live::LiveEntity;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// In-memory controller double. Fails configured names; counts calls.
    #[derive(Default)]
    struct FakeApi {
        fail_names: Vec<String>,
        transient_failures: AtomicU32,
        calls: Mutex<Vec<String>>,
        next_id: AtomicU32,
    }

    impl FakeApi {
        fn log(&self, entry: String) {
            self.calls.lock().unwrap().push(entry);
        }
    }

    impl LiveApi for FakeApi {
        async fn create(
            &self,
            collection: &Collection,
            fields: &Map<String, Value>,
        ) -> Result<String, CoreError> {
            let name = fields
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            self.log(format!("create {collection}/{name}"));

            if self.transient_failures.load(Ordering::SeqCst) > 0 {
                self.transient_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(CoreError::Api(unistate_api::Error::Api {
                    status: 503,
                    message: "flaky".into(),
                }));
            }
            if self.fail_names.contains(&name) {
                return Err(CoreError::Api(unistate_api::Error::Api {
                    status: 400,
                    message: "api.err.Invalid".into(),
                }));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(format!("id-{id}"))
        }

        async fn update(
            &self,
            collection: &Collection,
            id: &str,
            _fields: &Map<String, Value>,
        ) -> Result<(), CoreError> {
            self.log(format!("update {collection}/{id}"));
            Ok(())
        }

        async fn delete(
            &self,
            collection: &Collection,
            id: &str,
        ) -> Result<(), CoreError> {
            self.log(format!("delete {collection}/{id}"));
            Ok(())
        }
    }

    fn create_op(collection: Collection, name: &str, refs: Vec<FieldRef>) -> Operation {
        let mut fields = Map::new();
        fields.insert("name".into(), json!(name));
        for r in &refs {
            fields.insert(r.field.clone(), json!(r.target));
        }
        Operation {
            collection,
            kind: OpKind::Create,
            name: name.into(),
            fields,
            refs,
        }
    }

    fn net_ref(target: &str) -> FieldRef {
        FieldRef {
            field: "networkconf_id".into(),
            collection: Collection::Network,
            target: target.into(),
        }
    }

    #[tokio::test]
    async fn dry_run_makes_no_calls() {
        let api = FakeApi::default();
        let changeset = Changeset {
            operations: vec![create_op(Collection::Network, "IoT", vec![])],
        };
        let options = ApplyOptions {
            mode: ApplyMode::DryRun,
            ..ApplyOptions::default()
        };

        let report = apply(&changeset, &api, &LiveSnapshot::new(), &options).await;

        assert!(api.calls.lock().unwrap().is_empty());
        assert!(report.dry_run);
        assert!(report.is_clean());
        assert!(matches!(
            report.operations[0].outcome,
            OperationOutcome::Planned
        ));
    }

    #[tokio::test]
    async fn create_id_feeds_later_reference() {
        let api = FakeApi::default();
        let changeset = Changeset {
            operations: vec![
                create_op(Collection::Network, "IoT", vec![]),
                create_op(Collection::WifiNetwork, "iot", vec![net_ref("IoT")]),
            ],
        };

        let report = apply(
            &changeset,
            &api,
            &LiveSnapshot::new(),
            &ApplyOptions::default(),
        )
        .await;

        assert!(report.is_clean(), "{}", report.summary());
        let calls = api.calls.lock().unwrap();
        assert_eq!(calls[0], "create network/IoT");
        assert_eq!(calls[1], "create wifi/iot");
    }

    #[tokio::test]
    async fn failed_dependency_skips_dependents_but_not_independents() {
        let api = FakeApi {
            fail_names: vec!["IoT".into()],
            ..FakeApi::default()
        };
        let changeset = Changeset {
            operations: vec![
                create_op(Collection::Network, "IoT", vec![]),
                create_op(Collection::Network, "Guest", vec![]),
                create_op(Collection::WifiNetwork, "iot", vec![net_ref("IoT")]),
                create_op(Collection::WifiNetwork, "guest", vec![net_ref("Guest")]),
            ],
        };

        let report = apply(
            &changeset,
            &api,
            &LiveSnapshot::new(),
            &ApplyOptions::default(),
        )
        .await;

        assert!(matches!(
            report.operations[0].outcome,
            OperationOutcome::Failed { .. }
        ));
        assert!(matches!(
            report.operations[1].outcome,
            OperationOutcome::Succeeded { .. }
        ));
        assert!(matches!(
            report.operations[2].outcome,
            OperationOutcome::Skipped { ref cause } if cause.contains("IoT")
        ));
        assert!(matches!(
            report.operations[3].outcome,
            OperationOutcome::Succeeded { .. }
        ));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let api = FakeApi {
            transient_failures: AtomicU32::new(2),
            ..FakeApi::default()
        };
        let changeset = Changeset {
            operations: vec![create_op(Collection::Network, "IoT", vec![])],
        };
        let options = ApplyOptions {
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
            },
            ..ApplyOptions::default()
        };

        let report = apply(&changeset, &api, &LiveSnapshot::new(), &options).await;

        assert!(report.is_clean(), "{}", report.summary());
        // Two transient failures plus the final success.
        assert_eq!(api.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn terminal_failures_are_not_retried() {
        let api = FakeApi {
            fail_names: vec!["IoT".into()],
            ..FakeApi::default()
        };
        let changeset = Changeset {
            operations: vec![create_op(Collection::Network, "IoT", vec![])],
        };

        let report = apply(
            &changeset,
            &api,
            &LiveSnapshot::new(),
            &ApplyOptions::default(),
        )
        .await;

        assert!(!report.is_clean());
        assert_eq!(api.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_new_operations() {
        let api = FakeApi::default();
        let changeset = Changeset {
            operations: vec![
                create_op(Collection::Network, "A", vec![]),
                create_op(Collection::Network, "B", vec![]),
            ],
        };
        let options = ApplyOptions::default();
        options.cancel.cancel();

        let report = apply(&changeset, &api, &LiveSnapshot::new(), &options).await;

        assert!(api.calls.lock().unwrap().is_empty());
        assert!(report
            .operations
            .iter()
            .all(|op| op.outcome == OperationOutcome::Cancelled));
    }

    #[tokio::test]
    async fn update_uses_live_id() {
        let api = FakeApi::default();
        let mut live = LiveSnapshot::new();
        live.insert(
            Collection::Network,
            vec![LiveEntity {
                name: "IoT".into(),
                id: "n42".into(),
                fields: Map::new(),
                managed: true,
            }],
        );
        let mut fields = Map::new();
        fields.insert("vlan".into(), json!(20));
        let changeset = Changeset {
            operations: vec![Operation {
                collection: Collection::Network,
                kind: OpKind::Update { id: "n42".into() },
                name: "IoT".into(),
                fields,
                refs: vec![],
            }],
        };

        let report = apply(&changeset, &api, &live, &ApplyOptions::default()).await;

        assert!(report.is_clean());
        assert_eq!(api.calls.lock().unwrap()[0], "update network/n42");
    }

    #[tokio::test]
    async fn reference_fields_are_rewritten_to_ids() {
        let api = FakeApi::default();
        let mut live = LiveSnapshot::new();
        live.insert(
            Collection::Network,
            vec![LiveEntity {
                name: "IoT".into(),
                id: "n42".into(),
                fields: Map::new(),
                managed: true,
            }],
        );

        let op = create_op(Collection::WifiNetwork, "iot", vec![net_ref("IoT")]);
        let rewritten = rewrite_refs(&op, &live.identity_map()).unwrap();
        assert_eq!(rewritten["networkconf_id"], json!("n42"));
    }
}
