//! `unistate schema` -- inspect extracted schema descriptors.

use unistate_core::SchemaVersion;

use crate::cli::{GlobalOpts, SchemaArgs, SchemaCommand};
use crate::commands::load_registry;
use crate::config::resolve_paths;
use crate::error::{CliError, exit_code};
use crate::output::print_output;

pub fn handle(args: &SchemaArgs, global: &GlobalOpts) -> Result<i32, CliError> {
    let (_, schema_dir) = resolve_paths(global)?;
    let registry = load_registry(schema_dir.as_deref())?;

    match &args.command {
        SchemaCommand::List => {
            let versions = registry.versions();
            print_output(&versions.join("\n"), global.quiet);
        }
        SchemaCommand::Show { version } => {
            let selector = version
                .as_deref()
                .map_or(SchemaVersion::Latest, |v| {
                    v.parse().unwrap_or(SchemaVersion::Latest)
                });
            let descriptor = registry.resolve(&selector)?;

            let mut lines = vec![format!("schema {}", descriptor.version)];
            for (collection, schema) in &descriptor.collections {
                lines.push(format!("\n{collection}:"));
                for (field, desc) in &schema.fields {
                    let mut parts = vec![desc.field_type.to_string()];
                    if desc.required {
                        parts.push("required".into());
                    }
                    if let (Some(min), Some(max)) = (desc.min, desc.max) {
                        parts.push(format!("{min}..={max}"));
                    }
                    if let Some(ref values) = desc.values {
                        parts.push(format!("one of [{}]", values.join(", ")));
                    }
                    lines.push(format!("  {field}: {}", parts.join(", ")));
                }
            }
            print_output(&lines.join("\n"), global.quiet);
        }
    }

    Ok(exit_code::SUCCESS)
}
