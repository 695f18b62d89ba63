//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable
//! help text, and carries the exit-code mapping for `main`.

use miette::Diagnostic;
use thiserror::Error;

use unistate_core::CoreError;

/// Exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const VALIDATION: i32 = 3;
    pub const SECRET: i32 = 4;
    pub const SCHEMA: i32 = 5;
    pub const CONNECTION: i32 = 6;
    pub const APPLY_FAILED: i32 = 7;
    /// `diff` found a non-empty changeset (not an error; scripting aid).
    pub const CHANGES_PENDING: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Document ─────────────────────────────────────────────────────
    #[error("Cannot read desired-state document at {path}")]
    #[diagnostic(
        code(unistate::document_io),
        help("Check that the file exists and is readable.")
    )]
    DocumentRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed desired-state document at {path}")]
    #[diagnostic(
        code(unistate::document_parse),
        help("The document must be the normalized JSON/YAML the evaluator emits:\n{detail}")
    )]
    DocumentParse { path: String, detail: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Desired state failed validation with {count} issue(s)")]
    #[diagnostic(
        code(unistate::validation),
        help("Every issue is listed above; fix them all and re-run.")
    )]
    ValidationFailed { count: usize },

    // ── Secrets ──────────────────────────────────────────────────────
    #[error("Unresolved secret reference(s): {}", missing.join(", "))]
    #[diagnostic(
        code(unistate::secrets),
        help(
            "Set the referenced environment variables, or point --secrets-file\n\
             at a key=value file that defines these paths."
        )
    )]
    SecretsUnresolved { missing: Vec<String> },

    // ── Schema ───────────────────────────────────────────────────────
    #[error("Schema version '{version}' has no extracted descriptor")]
    #[diagnostic(
        code(unistate::schema_not_found),
        help("Available versions: {available}\nRun: unistate schema list")
    )]
    SchemaNotFound { version: String, available: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to controller at {url}")]
    #[diagnostic(
        code(unistate::connection_failed),
        help(
            "Check that the controller is running and accessible.\n\
             Self-signed certificate? Use --insecure (-k)."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("No credentials configured")]
    #[diagnostic(
        code(unistate::no_credentials),
        help(
            "Provide --api-key (or UNISTATE_API_KEY), or --username with\n\
             UNISTATE_PASSWORD, or configure a profile in config.toml."
        )
    )]
    NoCredentials,

    #[error("Controller URL is not configured")]
    #[diagnostic(
        code(unistate::no_controller),
        help("Pass --controller (-c), set UNISTATE_CONTROLLER, or configure a profile.")
    )]
    NoController,

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(code(unistate::profile_not_found), help("Available profiles: {available}"))]
    ProfileNotFound { name: String, available: String },

    // ── API / apply ──────────────────────────────────────────────────
    #[error("Controller API error: {message}")]
    #[diagnostic(code(unistate::api_error))]
    ApiError { message: String },

    #[error("Deploy finished with problems: {summary}")]
    #[diagnostic(
        code(unistate::apply_failed),
        help("The report above lists every failed and skipped operation.")
    )]
    ApplyFailed { summary: String },

    #[error("Deploy aborted before any change")]
    #[diagnostic(code(unistate::aborted))]
    Aborted,

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(unistate::config))]
    Config(Box<figment::Error>),

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(unistate::invalid_flag))]
    Validation { field: String, reason: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ValidationFailed { .. } => exit_code::VALIDATION,
            Self::SecretsUnresolved { .. } => exit_code::SECRET,
            Self::SchemaNotFound { .. } => exit_code::SCHEMA,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::ApplyFailed { .. } => exit_code::APPLY_FAILED,
            Self::DocumentRead { .. }
            | Self::DocumentParse { .. }
            | Self::Validation { .. }
            | Self::NoCredentials
            | Self::NoController
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { issues } => CliError::ValidationFailed {
                count: issues.len(),
            },

            CoreError::SecretResolution { missing } => {
                CliError::SecretsUnresolved { missing }
            }

            CoreError::SchemaNotFound { version, available } => CliError::SchemaNotFound {
                version,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },

            CoreError::Fetch { collection, source } => match connect_failure_url(&source) {
                Some(url) => CliError::ConnectionFailed {
                    url,
                    source: source.into(),
                },
                None => CliError::ApiError {
                    message: format!("fetching '{collection}': {source}"),
                },
            },

            CoreError::Api(source) => match connect_failure_url(&source) {
                Some(url) => CliError::ConnectionFailed {
                    url,
                    source: source.into(),
                },
                None => CliError::ApiError {
                    message: source.to_string(),
                },
            },

            CoreError::MalformedLive { collection, message } => CliError::ApiError {
                message: format!("malformed live document in '{collection}': {message}"),
            },

            CoreError::DependencyFailed { .. } | CoreError::Internal(_) => CliError::ApiError {
                message: err.to_string(),
            },
        }
    }
}

impl From<unistate_api::Error> for CliError {
    fn from(err: unistate_api::Error) -> Self {
        CliError::from(CoreError::Api(err))
    }
}

/// The failing URL, when the error is a transport-level connect failure.
fn connect_failure_url(err: &unistate_api::Error) -> Option<String> {
    match err {
        unistate_api::Error::Transport(e) if e.is_connect() || e.is_timeout() => {
            Some(e.url().map(ToString::to_string).unwrap_or_default())
        }
        _ => None,
    }
}
