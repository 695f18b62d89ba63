//! `unistate validate` -- schema and cross-entity validation only.
//! Never contacts the controller.

use unistate_core::SchemaVersion;

use crate::cli::{GlobalOpts, ValidateArgs};
use crate::commands::{load_document, load_registry, schema_version, validate_document};
use crate::config::resolve_paths;
use crate::error::{CliError, exit_code};
use crate::output::print_output;

pub fn handle(args: &ValidateArgs, global: &GlobalOpts) -> Result<i32, CliError> {
    let (_, schema_dir) = resolve_paths(global)?;

    let doc = load_document(&args.config)?;
    let registry = load_registry(schema_dir.as_deref())?;

    let state = validate_document(&doc, &registry)?;

    let version = match schema_version(&doc) {
        SchemaVersion::Latest => "latest".to_owned(),
        SchemaVersion::Pinned(v) => v,
    };
    print_output(
        &format!(
            "OK: {} entities valid against schema {version}",
            state.entities.len()
        ),
        global.quiet,
    );
    Ok(exit_code::SUCCESS)
}
