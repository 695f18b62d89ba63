//! Output rendering: changesets and apply reports.
//!
//! Text mode prints terraform-style +/~/- lines; JSON mode serializes
//! the structures for scripting.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde_json::json;

use unistate_core::{Action, Changeset, OpKind, OperationOutcome, Report};

use crate::cli::{ColorMode, OutputFormat};

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Changeset rendering ─────────────────────────────────────────────

pub fn render_changeset(changeset: &Changeset, format: &OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Json => {
            let ops: Vec<_> = changeset
                .operations
                .iter()
                .map(|op| {
                    json!({
                        "collection": op.collection,
                        "kind": op.kind.verb(),
                        "name": op.name,
                        "fields": op.fields,
                    })
                })
                .collect();
            serde_json::to_string_pretty(&ops).unwrap_or_default()
        }
        OutputFormat::Text => {
            if changeset.is_empty() {
                return "No changes. Live state matches the desired state.".into();
            }
            let mut lines = Vec::with_capacity(changeset.len() + 2);
            for op in &changeset.operations {
                let line = match &op.kind {
                    OpKind::Create => format!("  + {} {}", op.collection, op.name),
                    OpKind::Update { .. } => {
                        let fields: Vec<&str> =
                            op.fields.keys().map(String::as_str).collect();
                        format!(
                            "  ~ {} {} ({})",
                            op.collection,
                            op.name,
                            fields.join(", ")
                        )
                    }
                    OpKind::Delete { .. } => format!("  - {} {}", op.collection, op.name),
                };
                lines.push(if color {
                    match &op.kind {
                        OpKind::Create => line.green().to_string(),
                        OpKind::Update { .. } => line.yellow().to_string(),
                        OpKind::Delete { .. } => line.red().to_string(),
                    }
                } else {
                    line
                });
            }
            lines.push(String::new());
            lines.push(format!("Plan: {}", changeset.summary()));
            lines.join("\n")
        }
    }
}

// ── Report rendering ────────────────────────────────────────────────

pub fn render_report(report: &Report, format: &OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
        OutputFormat::Text => {
            let mut lines = Vec::with_capacity(report.operations.len() + 2);
            for op in &report.operations {
                let (mark, detail) = match &op.outcome {
                    OperationOutcome::Succeeded { id } => (
                        "ok",
                        id.as_ref().map(|id| format!(" ({id})")).unwrap_or_default(),
                    ),
                    OperationOutcome::Failed { cause } => ("failed", format!(": {cause}")),
                    OperationOutcome::Skipped { cause } => ("skipped", format!(": {cause}")),
                    OperationOutcome::Planned => ("planned", String::new()),
                    OperationOutcome::Cancelled => ("cancelled", String::new()),
                };
                let action = match op.action {
                    Action::Create => "create",
                    Action::Update => "update",
                    Action::Delete => "delete",
                };
                let line = format!(
                    "  [{mark}] {action} {} {}{detail}",
                    op.collection, op.name
                );
                lines.push(if color {
                    match &op.outcome {
                        OperationOutcome::Succeeded { .. } => line.green().to_string(),
                        OperationOutcome::Planned => line.cyan().to_string(),
                        OperationOutcome::Failed { .. } => line.red().to_string(),
                        OperationOutcome::Skipped { .. } | OperationOutcome::Cancelled => {
                            line.yellow().to_string()
                        }
                    }
                } else {
                    line
                });
            }
            lines.push(String::new());
            lines.push(format!("Result: {}", report.summary()));
            lines.join("\n")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::Map;
    use unistate_core::{Collection, Operation};

    fn changeset() -> Changeset {
        Changeset {
            operations: vec![
                Operation {
                    collection: Collection::Network,
                    kind: OpKind::Create,
                    name: "IoT".into(),
                    fields: Map::new(),
                    refs: vec![],
                },
                Operation {
                    collection: Collection::WifiNetwork,
                    kind: OpKind::Delete { id: "w1".into() },
                    name: "old".into(),
                    fields: Map::new(),
                    refs: vec![],
                },
            ],
        }
    }

    #[test]
    fn text_changeset_shows_plan_lines() {
        let out = render_changeset(&changeset(), &OutputFormat::Text, false);
        assert!(out.contains("+ network IoT"));
        assert!(out.contains("- wifi old"));
        assert!(out.contains("1 to create, 0 to update, 1 to delete"));
    }

    #[test]
    fn empty_changeset_says_no_changes() {
        let out = render_changeset(&Changeset::default(), &OutputFormat::Text, false);
        assert!(out.contains("No changes"));
    }

    #[test]
    fn json_changeset_is_parseable() {
        let out = render_changeset(&changeset(), &OutputFormat::Json, false);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["kind"], "create");
    }
}
