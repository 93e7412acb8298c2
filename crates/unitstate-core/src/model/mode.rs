use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a queued job interacts with jobs already pending for the unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Replace conflicting pending jobs.
    #[default]
    Replace,
    /// Fail if a conflicting job is pending.
    Fail,
    /// Stop every other unit (only for start).
    Isolate,
    IgnoreDependencies,
    IgnoreRequirements,
}

/// Which processes of a unit receive a kill signal.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Who {
    Main,
    Control,
    #[default]
    All,
}
