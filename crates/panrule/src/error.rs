//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use panrule_config::ConfigError;
use panrule_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const CANCELLED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not connect to appliance at {url}")]
    #[diagnostic(
        code(panrule::connection_failed),
        help(
            "Check that the management interface is reachable.\n\
             URL: {url}\n\
             Self-signed certificate? Try --insecure (-k) or set ca_cert in your profile."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(panrule::auth_failed),
        help(
            "Verify the API key or the administrator credentials of profile '{profile}'.\n\
             A key can be generated with: curl -d 'type=keygen&user=...&password=...' https://<host>/api/"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(panrule::no_credentials),
        help(
            "Set api_key_env or api_key in the profile, store a key in the system keyring\n\
             under service 'panrule' as '{profile}/api-key', or pass --api-key."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{what} not found")]
    #[diagnostic(code(panrule::not_found))]
    NotFound { what: String },

    #[error("cannot position group {position} \"{reference}\": reference not present")]
    #[diagnostic(
        code(panrule::reference_missing),
        help(
            "Recreate rule \"{reference}\", or clear position_keyword and position_reference\n\
             in the declaration to keep the group where it is."
        )
    )]
    ReferenceMissing { position: String, reference: String },

    #[error("No state at {path}")]
    #[diagnostic(
        code(panrule::no_state),
        help("Run `panrule group apply --state {path} --file <declaration>` first.")
    )]
    NoState { path: String },

    #[error("State file {path} holds a {found}, not a {expected}")]
    #[diagnostic(code(panrule::state_mismatch))]
    StateMismatch {
        path: String,
        found: String,
        expected: String,
    },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error{}: {message}", code.map(|c| format!(" ({c})")).unwrap_or_default())]
    #[diagnostic(code(panrule::api_error))]
    ApiError { code: Option<u16>, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(panrule::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid identity {id:?}: {reason}")]
    #[diagnostic(code(panrule::identity))]
    Identity { id: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(panrule::profile_not_found),
        help("Available profiles: {available}\nConfig file: {path}")
    )]
    ProfileNotFound {
        name: String,
        available: String,
        path: String,
    },

    #[error("No appliance configured")]
    #[diagnostic(
        code(panrule::no_config),
        help(
            "Pass --host and --api-key, or add a profile to {path}:\n\n\
             [profiles.default]\n\
             host = \"fw.example.com\"\n\
             api_key_env = \"PANOS_API_KEY\""
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(panrule::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(panrule::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout / cancellation ───────────────────────────────────────

    #[error("Operation timed out after {seconds}s")]
    #[diagnostic(
        code(panrule::timeout),
        help("Raise --operation-timeout or --timeout, or check appliance load (commit in progress?).")
    )]
    Timeout { seconds: u64 },

    #[error("Operation cancelled")]
    #[diagnostic(code(panrule::cancelled))]
    Cancelled,

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(panrule::json), help("Check the file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML: {0}")]
    #[diagnostic(code(panrule::yaml), help("Check the file contents and try again."))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(panrule::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::NoState { .. } => exit_code::NOT_FOUND,
            Self::ReferenceMissing { .. } | Self::StateMismatch { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Cancelled => exit_code::CANCELLED,
            Self::Validation { .. }
            | Self::Identity { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
                path: panrule_config::config_path().display().to_string(),
            },
            other => CliError::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { attribute, message } => CliError::Validation {
                field: attribute,
                reason: message,
            },
            CoreError::ReferenceMissing {
                position,
                reference,
            } => CliError::ReferenceMissing {
                position,
                reference,
            },
            CoreError::Identity { id, message } => CliError::Identity {
                id,
                reason: message,
            },
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Cancelled => CliError::Cancelled,
            CoreError::NotFound { what } => CliError::NotFound { what },
            CoreError::Api { message, code } => CliError::ApiError { code, message },
            CoreError::Config { message } => CliError::Validation {
                field: "state".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
