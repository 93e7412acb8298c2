// ── Transport boundary ──
//
// Everything unitstate-core needs from the bus: bulk and single property
// reads, the PropertiesChanged signal feed, and systemd manager calls.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::Error;
use crate::path::ObjectPath;
use crate::variant::Variant;

/// Property name → value, as returned by `GetAll`.
pub type PropertyMap = HashMap<String, Variant>;

/// Stream of decoded `PropertiesChanged` signals. Items that fail to decode
/// are yielded as errors so the consumer can account for them.
pub type SignalStream = Pin<Box<dyn Stream<Item = Result<PropertiesChanged, Error>> + Send>>;

/// One `org.freedesktop.DBus.Properties.PropertiesChanged` signal.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertiesChanged {
    pub path: ObjectPath,
    pub interface: String,
    pub changed: PropertyMap,
    /// Keys whose new value was not included and must be fetched.
    pub invalidated: Vec<String>,
}

// ── Manager calls ────────────────────────────────────────────────────

/// A method call on `org.freedesktop.systemd1.Manager`.
///
/// Job modes and kill targets are carried as their wire strings; the typed
/// enums live in unitstate-core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCall {
    Subscribe,
    Unsubscribe,
    StartUnit { name: String, mode: String },
    StopUnit { name: String, mode: String },
    ReloadUnit { name: String, mode: String },
    RestartUnit { name: String, mode: String },
    TryRestartUnit { name: String, mode: String },
    ReloadOrRestartUnit { name: String, mode: String },
    ReloadOrTryRestartUnit { name: String, mode: String },
    KillUnit { name: String, who: String, signal: i32 },
    ResetFailedUnit { name: String },
    UnrefUnit { name: String },
    GetUnit { name: String },
    LoadUnit { name: String },
}

impl ManagerCall {
    /// D-Bus member name of the call.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Subscribe => "Subscribe",
            Self::Unsubscribe => "Unsubscribe",
            Self::StartUnit { .. } => "StartUnit",
            Self::StopUnit { .. } => "StopUnit",
            Self::ReloadUnit { .. } => "ReloadUnit",
            Self::RestartUnit { .. } => "RestartUnit",
            Self::TryRestartUnit { .. } => "TryRestartUnit",
            Self::ReloadOrRestartUnit { .. } => "ReloadOrRestartUnit",
            Self::ReloadOrTryRestartUnit { .. } => "ReloadOrTryRestartUnit",
            Self::KillUnit { .. } => "KillUnit",
            Self::ResetFailedUnit { .. } => "ResetFailedUnit",
            Self::UnrefUnit { .. } => "UnrefUnit",
            Self::GetUnit { .. } => "GetUnit",
            Self::LoadUnit { .. } => "LoadUnit",
        }
    }

    /// The unit the call targets, if any.
    pub fn unit_name(&self) -> Option<&str> {
        match self {
            Self::Subscribe | Self::Unsubscribe => None,
            Self::StartUnit { name, .. }
            | Self::StopUnit { name, .. }
            | Self::ReloadUnit { name, .. }
            | Self::RestartUnit { name, .. }
            | Self::TryRestartUnit { name, .. }
            | Self::ReloadOrRestartUnit { name, .. }
            | Self::ReloadOrTryRestartUnit { name, .. }
            | Self::KillUnit { name, .. }
            | Self::ResetFailedUnit { name }
            | Self::UnrefUnit { name }
            | Self::GetUnit { name }
            | Self::LoadUnit { name } => Some(name),
        }
    }
}

/// Reply to a [`ManagerCall`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerReply {
    /// The call returns nothing.
    Done,
    /// A job was queued; this is its object path.
    Job(ObjectPath),
    /// Object path of a unit (`GetUnit`, `LoadUnit`).
    Unit(ObjectPath),
}

// ── Bus trait ────────────────────────────────────────────────────────

/// Connection to a systemd instance.
///
/// Implemented by [`DBusConnection`](crate::DBusConnection) for a real bus
/// and by [`MemoryBus`](crate::MemoryBus) for tests.
#[async_trait]
pub trait Bus: Send + Sync {
    /// `org.freedesktop.DBus.Properties.GetAll(interface)` on `path`.
    async fn get_all(&self, path: &ObjectPath, interface: &str) -> Result<PropertyMap, Error>;

    /// `org.freedesktop.DBus.Properties.Get(interface, name)` on `path`.
    async fn get_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
    ) -> Result<Variant, Error>;

    /// Open a new feed of `PropertiesChanged` signals for unit objects.
    ///
    /// The match is in place when this returns; signals emitted afterwards
    /// are delivered.
    async fn signals(&self) -> Result<SignalStream, Error>;

    /// Invoke a manager method.
    async fn call(&self, call: ManagerCall) -> Result<ManagerReply, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_match_manager_members() {
        let call = ManagerCall::ReloadOrTryRestartUnit {
            name: "foo.service".into(),
            mode: "replace".into(),
        };
        assert_eq!(call.method(), "ReloadOrTryRestartUnit");
        assert_eq!(call.unit_name(), Some("foo.service"));
        assert_eq!(ManagerCall::Subscribe.unit_name(), None);
    }
}
