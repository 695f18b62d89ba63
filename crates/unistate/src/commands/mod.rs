//! Command implementations and the shared pipeline helpers they build on.

pub mod deploy;
pub mod diff_cmd;
pub mod schema_cmd;
pub mod validate_cmd;

use std::path::Path;

use tracing::debug;

use unistate_api::RestClient;
use unistate_core::{
    Controller, CoreError, DesiredConfig, ResolvedState, SchemaRegistry, SchemaVersion,
    SecretMode, ValidState, resolve_secrets, validate,
};

use crate::config::ConnectionSettings;
use crate::error::CliError;
use crate::secrets::ChainSecretStore;

/// Load a desired-state document from disk (JSON or YAML by extension).
pub(crate) fn load_document(path: &Path) -> Result<DesiredConfig, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::DocumentRead {
        path: path.display().to_string(),
        source,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let parsed = if is_yaml {
        serde_yaml::from_str(&raw).map_err(|e| e.to_string())
    } else {
        DesiredConfig::from_json_str(&raw).map_err(|e| e.to_string())
    };

    parsed.map_err(|detail| CliError::DocumentParse {
        path: path.display().to_string(),
        detail,
    })
}

/// Build the schema registry: built-in descriptor plus any extracted
/// descriptors in the configured directory.
pub(crate) fn load_registry(schema_dir: Option<&Path>) -> Result<SchemaRegistry, CliError> {
    match schema_dir {
        Some(dir) => Ok(SchemaRegistry::from_dir(dir)?),
        None => Ok(SchemaRegistry::builtin()),
    }
}

/// The version the document pins, or latest.
pub(crate) fn schema_version(doc: &DesiredConfig) -> SchemaVersion {
    doc.schema_version
        .as_deref()
        .map_or(SchemaVersion::Latest, |v| {
            v.parse().unwrap_or(SchemaVersion::Latest)
        })
}

/// Validate, printing every accumulated issue to stderr on failure.
pub(crate) fn validate_document(
    doc: &DesiredConfig,
    registry: &SchemaRegistry,
) -> Result<ValidState, CliError> {
    let schema = registry.resolve(&schema_version(doc))?;
    match validate(doc, schema) {
        Ok(state) => Ok(state),
        Err(issues) => {
            for issue in &issues {
                eprintln!("  error: {issue}");
            }
            Err(CliError::ValidationFailed {
                count: issues.len(),
            })
        }
    }
}

/// Resolve secrets, printing length violations like validation issues.
pub(crate) fn resolve_document_secrets(
    state: ValidState,
    settings: &ConnectionSettings,
    mode: SecretMode,
) -> Result<ResolvedState, CliError> {
    let store = ChainSecretStore::standard(settings.secrets_file.as_deref()).map_err(|e| {
        CliError::Validation {
            field: "secrets-file".into(),
            reason: e.to_string(),
        }
    })?;

    match resolve_secrets(state, &store, mode) {
        Ok(resolved) => Ok(resolved),
        Err(CoreError::Validation { issues }) => {
            for issue in &issues {
                eprintln!("  error: {issue}");
            }
            Err(CliError::ValidationFailed {
                count: issues.len(),
            })
        }
        Err(err) => Err(err.into()),
    }
}

/// Connect and authenticate against the controller.
pub(crate) async fn connect(settings: &ConnectionSettings) -> Result<Controller, CliError> {
    debug!(url = %settings.url, site = %settings.site, "connecting");

    let client = RestClient::connect(
        settings.url.clone(),
        settings.site.clone(),
        &settings.credentials,
        &settings.transport,
    )
    .await
    .map_err(|err| {
        let is_connect = matches!(
            &err,
            unistate_api::Error::Transport(e) if e.is_connect() || e.is_timeout()
        );
        if is_connect {
            CliError::ConnectionFailed {
                url: settings.url.to_string(),
                source: err.into(),
            }
        } else {
            err.into()
        }
    })?;

    Ok(Controller::new(client))
}
