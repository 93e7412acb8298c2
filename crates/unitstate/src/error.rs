//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use unitstate_config::ConfigError;
use unitstate_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const UNIT_FAILED: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to systemd on the {bus} bus")]
    #[diagnostic(
        code(unitstate::connection_failed),
        help(
            "Check that D-Bus is running and reachable.\n\
             Use --user for the per-user manager or --address for a custom bus."
        )
    )]
    ConnectionFailed {
        bus: String,
        #[source]
        source: CoreError,
    },

    #[error("D-Bus request failed: {message}")]
    #[diagnostic(code(unitstate::bus))]
    Bus { message: String },

    // ── Units ────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(unitstate::not_found),
        help("Check the unit name; `systemctl list-units --all` shows what is loaded.")
    )]
    NotFound { message: String },

    #[error("Unit {unit} entered state {state}")]
    #[diagnostic(
        code(unitstate::unit_failed),
        help("Run: journalctl -u {unit}")
    )]
    UnitFailed { unit: String, state: String },

    #[error("Cannot read property: {message}")]
    #[diagnostic(code(unitstate::property))]
    Property { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(unitstate::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(unitstate::config),
        help("Inspect the file printed by: unitstate config path")
    )]
    Config(#[from] ConfigError),

    #[error("Configuration file already exists at {path}")]
    #[diagnostic(
        code(unitstate::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(unitstate::timeout),
        help("Increase the limit with --timeout, or --wait-timeout for --wait.")
    )]
    Timeout { seconds: u64 },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(unitstate::internal))]
    Internal { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(unitstate::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render TOML: {0}")]
    #[diagnostic(code(unitstate::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Bus { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::UnitFailed { .. } => exit_code::UNIT_FAILED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport {
                message,
                not_found: true,
            } => CliError::NotFound { message },

            CoreError::Transport { message, .. } => CliError::Bus { message },

            CoreError::Timeout { timeout } => CliError::Timeout {
                seconds: timeout.as_secs(),
            },

            CoreError::InvalidName { name, reason } => CliError::Validation {
                field: format!("unit name '{name}'"),
                reason,
            },

            err @ (CoreError::TypeMismatch { .. }
            | CoreError::UnknownKey { .. }
            | CoreError::DecodeFailure { .. }) => CliError::Property {
                message: err.to_string(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            other => CliError::Internal {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn missing_units_map_to_not_found() {
        let err = CliError::from(CoreError::Transport {
            message: "Unit nope.service not loaded.".into(),
            not_found: true,
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(err.to_string(), "Unit nope.service not loaded.");
    }

    #[test]
    fn timeouts_keep_their_duration() {
        let err = CliError::from(CoreError::Timeout {
            timeout: Duration::from_secs(25),
        });
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);
        assert_eq!(err.to_string(), "Request timed out after 25s");
    }

    #[test]
    fn bad_names_are_usage_errors() {
        let err = CliError::from(CoreError::InvalidName {
            name: String::new(),
            reason: "empty".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
