//! `unistate diff` -- print the changeset that would converge the
//! controller. Exit 0 when live state already matches; exit 8
//! (changes pending) otherwise, for scripting.

use unistate_core::{LiveStateFetcher, SecretMode, diff, fetch_collections};

use crate::cli::{DiffArgs, GlobalOpts};
use crate::commands::{
    connect, load_document, load_registry, resolve_document_secrets, validate_document,
};
use crate::config::resolve_connection;
use crate::error::{CliError, exit_code};
use crate::output::{print_output, render_changeset, should_color};

pub async fn handle(args: &DiffArgs, global: &GlobalOpts) -> Result<i32, CliError> {
    let settings = resolve_connection(global)?;

    let doc = load_document(&args.config)?;
    let registry = load_registry(settings.schema_dir.as_deref())?;
    let state = validate_document(&doc, &registry)?;

    // Diffing tolerates unresolved secret references; the affected
    // fields are left out of comparison and noted below.
    let resolved = resolve_document_secrets(state, &settings, SecretMode::Lenient)?;

    let controller = connect(&settings).await?;
    let live = controller.snapshot(&fetch_collections(&resolved)).await?;

    let changeset = diff(&resolved, &live);

    for note in &resolved.notes {
        eprintln!("  note: {note}");
    }
    print_output(
        &render_changeset(&changeset, &global.output, should_color(&global.color)),
        global.quiet,
    );

    if changeset.is_empty() {
        Ok(exit_code::SUCCESS)
    } else {
        Ok(exit_code::CHANGES_PENDING)
    }
}
