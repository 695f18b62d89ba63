// ── Apply report ──

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::diff::OpKind;
use crate::model::Collection;

/// What an operation did (stripped of ids for reporting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl From<&OpKind> for Action {
    fn from(kind: &OpKind) -> Self {
        match kind {
            OpKind::Create => Self::Create,
            OpKind::Update { .. } => Self::Update,
            OpKind::Delete { .. } => Self::Delete,
        }
    }
}

/// Terminal state of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum OperationOutcome {
    /// Executed; creates carry the device-assigned id.
    Succeeded { id: Option<String> },
    /// The API rejected it, or retries ran out.
    Failed { cause: String },
    /// A dependency of this entity failed earlier in the run.
    Skipped { cause: String },
    /// Dry-run: would have executed.
    Planned,
    /// Cancellation fired before this operation started.
    Cancelled,
}

/// One line of the report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReport {
    pub collection: Collection,
    pub name: String,
    pub action: Action,
    #[serde(flatten)]
    pub outcome: OperationOutcome,
}

/// The full result of one apply run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Correlates this run's report with its log lines.
    pub run_id: Uuid,
    pub operations: Vec<OperationReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
}

impl Report {
    /// No failed, skipped, or cancelled operations.
    pub fn is_clean(&self) -> bool {
        self.operations.iter().all(|op| {
            matches!(
                op.outcome,
                OperationOutcome::Succeeded { .. } | OperationOutcome::Planned
            )
        })
    }

    pub fn count(&self, predicate: impl Fn(&OperationOutcome) -> bool) -> usize {
        self.operations
            .iter()
            .filter(|op| predicate(&op.outcome))
            .count()
    }

    /// "4 succeeded, 1 failed, 2 skipped"
    pub fn summary(&self) -> String {
        if self.dry_run {
            return format!(
                "{} planned",
                self.count(|o| matches!(o, OperationOutcome::Planned))
            );
        }
        let mut parts = vec![format!(
            "{} succeeded",
            self.count(|o| matches!(o, OperationOutcome::Succeeded { .. }))
        )];
        let failed = self.count(|o| matches!(o, OperationOutcome::Failed { .. }));
        if failed > 0 {
            parts.push(format!("{failed} failed"));
        }
        let skipped = self.count(|o| matches!(o, OperationOutcome::Skipped { .. }));
        if skipped > 0 {
            parts.push(format!("{skipped} skipped"));
        }
        let cancelled = self.count(|o| matches!(o, OperationOutcome::Cancelled));
        if cancelled > 0 {
            parts.push(format!("{cancelled} cancelled"));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<OperationOutcome>) -> Report {
        let now = Utc::now();
        Report {
            run_id: Uuid::new_v4(),
            operations: outcomes
                .into_iter()
                .map(|outcome| OperationReport {
                    collection: Collection::Network,
                    name: "n".into(),
                    action: Action::Create,
                    outcome,
                })
                .collect(),
            started_at: now,
            finished_at: now,
            dry_run: false,
        }
    }

    #[test]
    fn clean_report() {
        let r = report(vec![OperationOutcome::Succeeded { id: Some("x".into()) }]);
        assert!(r.is_clean());
    }

    #[test]
    fn skipped_is_not_clean() {
        let r = report(vec![
            OperationOutcome::Succeeded { id: None },
            OperationOutcome::Skipped {
                cause: "dependency failed".into(),
            },
        ]);
        assert!(!r.is_clean());
        assert_eq!(r.summary(), "1 succeeded, 1 skipped");
    }

    #[test]
    fn cancelled_is_not_clean() {
        let r = report(vec![OperationOutcome::Cancelled]);
        assert!(!r.is_clean());
    }
}
