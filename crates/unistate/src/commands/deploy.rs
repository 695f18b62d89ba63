//! `unistate deploy` -- validate, resolve secrets, diff, and apply.
//!
//! Secrets resolve strictly before any mutating call; validation or
//! resolution failure leaves the controller untouched. Ctrl-C cancels:
//! in-flight operations finish, nothing new starts.

use std::io::IsTerminal;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use unistate_core::{
    ApplyMode, ApplyOptions, LiveStateFetcher, OpKind, SecretMode, apply, diff,
    fetch_collections,
};

use crate::cli::{DeployArgs, GlobalOpts};
use crate::commands::{
    connect, load_document, load_registry, resolve_document_secrets, validate_document,
};
use crate::config::resolve_connection;
use crate::error::{CliError, exit_code};
use crate::output::{print_output, render_changeset, render_report, should_color};

pub async fn handle(args: &DeployArgs, global: &GlobalOpts) -> Result<i32, CliError> {
    let settings = resolve_connection(global)?;
    let color = should_color(&global.color);

    let doc = load_document(&args.config)?;
    let registry = load_registry(settings.schema_dir.as_deref())?;
    let state = validate_document(&doc, &registry)?;

    // Dry runs may diff with unresolved references; a real deploy
    // requires every secret before anything mutates.
    let mode = if args.dry_run {
        SecretMode::Lenient
    } else {
        SecretMode::Strict
    };
    let resolved = resolve_document_secrets(state, &settings, mode)?;

    let controller = connect(&settings).await?;
    let live = controller.snapshot(&fetch_collections(&resolved)).await?;

    let changeset = diff(&resolved, &live);
    if changeset.is_empty() {
        print_output(
            "No changes. Live state matches the desired state.",
            global.quiet,
        );
        return Ok(exit_code::SUCCESS);
    }

    print_output(
        &render_changeset(&changeset, &global.output, color),
        global.quiet,
    );

    let has_deletes = changeset
        .operations
        .iter()
        .any(|op| matches!(op.kind, OpKind::Delete { .. }));
    if !args.dry_run && has_deletes && !global.yes {
        confirm_deletes(&changeset.summary())?;
    }

    // Ctrl-C lets in-flight operations finish, then stops the rest.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested -- finishing in-flight operations");
            signal_cancel.cancel();
        }
    });

    let options = ApplyOptions {
        mode: if args.dry_run {
            ApplyMode::DryRun
        } else {
            ApplyMode::Real
        },
        concurrency: args.concurrency,
        cancel,
        retry: unistate_core::RetryPolicy::default(),
    };

    debug!(operations = changeset.len(), dry_run = args.dry_run, "applying changeset");
    let report = apply(&changeset, &controller, &live, &options).await;

    print_output(&render_report(&report, &global.output, color), global.quiet);

    if report.is_clean() {
        Ok(exit_code::SUCCESS)
    } else {
        Err(CliError::ApplyFailed {
            summary: report.summary(),
        })
    }
}

/// Deletions are destructive: prompt unless --yes.
fn confirm_deletes(summary: &str) -> Result<(), CliError> {
    if !std::io::stdin().is_terminal() {
        return Err(CliError::Validation {
            field: "--yes".into(),
            reason: format!(
                "changeset deletes entities ({summary}); non-interactive runs need --yes"
            ),
        });
    }

    let confirmed = dialoguer::Confirm::new()
        .with_prompt(format!("Plan: {summary}. Apply?"))
        .default(false)
        .interact()
        .map_err(|_| CliError::Aborted)?;

    if confirmed { Ok(()) } else { Err(CliError::Aborted) }
}
