// ── Runtime manager configuration ──
//
// Describes *which* bus to talk to and how the manager tunes its channels.
// Never touches disk; unitstate-config builds one of these from files and
// environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which message bus hosts the systemd instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "address")]
pub enum BusAddress {
    /// PID 1 on the system bus.
    #[default]
    System,
    /// The per-user manager on the session bus.
    Session,
    /// An explicit D-Bus address string.
    Address(String),
}

/// Tuning for a [`Manager`](crate::Manager).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub bus: BusAddress,
    /// Upper bound on every manager method call.
    pub call_timeout: Duration,
    /// Issue `Subscribe` when the first unit is registered.
    pub auto_subscribe: bool,
    /// Buffer of each unit's `StateChange` broadcast channel.
    pub state_channel_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            bus: BusAddress::System,
            call_timeout: Duration::from_secs(25),
            auto_subscribe: true,
            state_channel_capacity: 64,
        }
    }
}
