// ── Core error types ──
//
// User-facing errors from unitstate-core. Callers never match on zbus
// errors directly; the `From<unitstate_api::Error>` impl folds transport
// failures into the variants below.

use std::time::Duration;

use thiserror::Error;

use crate::value::ValueKind;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Transport ────────────────────────────────────────────────────
    /// A round trip to systemd failed. Never retried by the core.
    #[error("Bus request failed: {message}")]
    Transport {
        message: String,
        /// The failure concerns a missing object or property.
        not_found: bool,
    },

    #[error("Bus request timed out after {}ms", timeout.as_millis())]
    Timeout { timeout: Duration },

    // ── Property access ──────────────────────────────────────────────
    #[error("Property {key} is {found}, not {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Unknown property: {key}")]
    UnknownKey { key: String },

    #[error("Cannot decode property {key}: {reason}")]
    DecodeFailure { key: String, reason: String },

    // ── Dispatch ─────────────────────────────────────────────────────
    #[error("State listener failed: {message}")]
    ListenerFailure { message: String },

    // ── Registry ─────────────────────────────────────────────────────
    #[error("Invalid unit name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Unit manager has been dropped")]
    ManagerGone,

    #[error("Unexpected reply to {method}")]
    UnexpectedReply { method: &'static str },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` if the error came from the bus round trip itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<unitstate_api::Error> for CoreError {
    fn from(err: unitstate_api::Error) -> Self {
        match err {
            unitstate_api::Error::UnsupportedType(signature) => CoreError::DecodeFailure {
                key: String::new(),
                reason: format!("unsupported wire type '{signature}'"),
            },
            unitstate_api::Error::Malformed { reason } => CoreError::DecodeFailure {
                key: String::new(),
                reason,
            },
            unitstate_api::Error::InvalidPath { path, reason } => CoreError::InvalidName {
                name: path,
                reason,
            },
            other => CoreError::Transport {
                not_found: other.is_not_found(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_keep_not_found() {
        let err = CoreError::from(unitstate_api::Error::UnknownObject {
            path: "/org/freedesktop/systemd1/unit/x".into(),
        });
        assert!(matches!(err, CoreError::Transport { not_found: true, .. }));
        assert!(err.is_transport());
    }

    #[test]
    fn payload_errors_become_decode_failures() {
        let err = CoreError::from(unitstate_api::Error::UnsupportedType("h".into()));
        assert!(matches!(err, CoreError::DecodeFailure { .. }));
        assert!(!err.is_transport());
    }

    #[test]
    fn type_mismatch_names_both_kinds() {
        let err = CoreError::TypeMismatch {
            key: "ActiveState".into(),
            expected: ValueKind::Boolean,
            found: ValueKind::String,
        };
        assert_eq!(err.to_string(), "Property ActiveState is string, not boolean");
    }
}
