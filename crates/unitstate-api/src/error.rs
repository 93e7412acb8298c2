use thiserror::Error;

/// Top-level error type for the `unitstate-api` crate.
///
/// Covers every failure mode of the transport: bus connection and method
/// calls, object/property lookups, and payloads that cannot be represented
/// as a [`Variant`](crate::Variant). `unitstate-core` maps these into
/// user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── D-Bus ───────────────────────────────────────────────────────
    /// Connection, routing or marshalling failure reported by zbus.
    #[cfg(feature = "zbus")]
    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    /// Standard `org.freedesktop.DBus.Error.*` reply from the remote peer.
    #[cfg(feature = "zbus")]
    #[error("D-Bus call failed: {0}")]
    Fdo(#[from] zbus::fdo::Error),

    /// A manager method returned an error reply.
    #[error("{method} failed: {message}")]
    MethodFailed { method: &'static str, message: String },

    // ── Lookups ─────────────────────────────────────────────────────
    /// No object is exported at this path.
    #[error("Unknown object: {path}")]
    UnknownObject { path: String },

    /// The object exists but does not implement the interface.
    #[error("Object {path} has no interface {interface}")]
    UnknownInterface { path: String, interface: String },

    /// The interface does not expose this property.
    #[error("Unknown property {name} on {interface}")]
    UnknownProperty { interface: String, name: String },

    // ── Names ───────────────────────────────────────────────────────
    /// Not a syntactically valid D-Bus object path.
    #[error("Invalid object path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Not a syntactically valid D-Bus interface name.
    #[error("Invalid interface name '{interface}': {reason}")]
    InvalidInterface { interface: String, reason: String },

    // ── Payloads ────────────────────────────────────────────────────
    /// A value uses a wire type the binding does not model (e.g. unix fds).
    #[error("Unsupported wire type '{0}'")]
    UnsupportedType(String),

    /// A signal or reply body could not be decoded.
    #[error("Malformed message: {reason}")]
    Malformed { reason: String },

    // ── Streams ─────────────────────────────────────────────────────
    /// The signal consumer fell behind and missed notifications.
    #[error("Signal stream lagged, {missed} notifications lost")]
    Lagged { missed: u64 },

    /// The bus connection is gone.
    #[error("Bus connection closed")]
    Closed,
}

impl Error {
    /// Returns `true` if the failure concerns a missing object, interface
    /// or property rather than the transport itself.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::UnknownObject { .. }
            | Self::UnknownInterface { .. }
            | Self::UnknownProperty { .. } => true,
            #[cfg(feature = "zbus")]
            Self::Fdo(
                zbus::fdo::Error::UnknownObject(_)
                | zbus::fdo::Error::UnknownInterface(_)
                | zbus::fdo::Error::UnknownProperty(_),
            ) => true,
            _ => false,
        }
    }

    /// Returns `true` if retrying the same request later might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Lagged { .. } => true,
            #[cfg(feature = "zbus")]
            Self::Fdo(zbus::fdo::Error::NoReply(_) | zbus::fdo::Error::Timeout(_)) => true,
            #[cfg(feature = "zbus")]
            Self::Bus(zbus::Error::InputOutput(_)) => true,
            _ => false,
        }
    }

    /// Returns `true` if the payload, not the transport, was at fault.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::UnsupportedType(_) | Self::Malformed { .. })
    }
}
