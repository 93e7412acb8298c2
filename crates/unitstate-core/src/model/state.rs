use std::fmt;

use serde::Serialize;
use strum::{Display, EnumString};

pub const LOAD_STATE: &str = "LoadState";
pub const ACTIVE_STATE: &str = "ActiveState";
pub const SUB_STATE: &str = "SubState";

/// The three properties that make up a unit's lifecycle state.
pub const LIFECYCLE_KEYS: [&str; 3] = [LOAD_STATE, ACTIVE_STATE, SUB_STATE];

/// Immutable `(load, active, sub)` lifecycle snapshot.
///
/// All three members are always set; a member with no known value holds
/// [`StateTuple::UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StateTuple {
    load_state: String,
    active_state: String,
    sub_state: String,
}

impl StateTuple {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(
        load_state: impl Into<String>,
        active_state: impl Into<String>,
        sub_state: impl Into<String>,
    ) -> Self {
        Self {
            load_state: load_state.into(),
            active_state: active_state.into(),
            sub_state: sub_state.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN, Self::UNKNOWN, Self::UNKNOWN)
    }

    /// Build a tuple from a lookup by property name, using the sentinel for
    /// anything the lookup does not know.
    pub fn from_lookup<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Self {
        let field = |key: &str| lookup(key).unwrap_or(Self::UNKNOWN).to_owned();
        Self {
            load_state: field(LOAD_STATE),
            active_state: field(ACTIVE_STATE),
            sub_state: field(SUB_STATE),
        }
    }

    /// A copy with each member taken from `lookup` when it has one, else
    /// kept from `self`.
    pub fn overlay<'a>(&self, lookup: impl Fn(&str) -> Option<&'a str>) -> Self {
        Self {
            load_state: lookup(LOAD_STATE).map_or_else(|| self.load_state.clone(), str::to_owned),
            active_state: lookup(ACTIVE_STATE)
                .map_or_else(|| self.active_state.clone(), str::to_owned),
            sub_state: lookup(SUB_STATE).map_or_else(|| self.sub_state.clone(), str::to_owned),
        }
    }

    pub fn load_state(&self) -> &str {
        &self.load_state
    }

    pub fn active_state(&self) -> &str {
        &self.active_state
    }

    pub fn sub_state(&self) -> &str {
        &self.sub_state
    }

    /// Typed view of the load state; `None` for values systemd may add later.
    pub fn load(&self) -> Option<LoadState> {
        self.load_state.parse().ok()
    }

    /// Typed view of the active state.
    pub fn active(&self) -> Option<ActiveState> {
        self.active_state.parse().ok()
    }

    pub fn is_known(&self) -> bool {
        self.load_state != Self::UNKNOWN
            || self.active_state != Self::UNKNOWN
            || self.sub_state != Self::UNKNOWN
    }
}

impl Default for StateTuple {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for StateTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({})",
            self.load_state, self.active_state, self.sub_state
        )
    }
}

// ── Typed state domains ──────────────────────────────────────────────

/// Values of the `LoadState` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum LoadState {
    Stub,
    Loaded,
    NotFound,
    BadSetting,
    Error,
    Merged,
    Masked,
}

/// Values of the `ActiveState` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ActiveState {
    Active,
    Reloading,
    Inactive,
    Failed,
    Activating,
    Deactivating,
    Maintenance,
    Refreshing,
}

impl ActiveState {
    /// The unit is between two stable states.
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            Self::Activating | Self::Deactivating | Self::Reloading | Self::Refreshing
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_systemctl_style() {
        let state = StateTuple::new("loaded", "active", "running");
        assert_eq!(state.to_string(), "loaded - active (running)");
    }

    #[test]
    fn lookup_falls_back_to_sentinel() {
        let state = StateTuple::from_lookup(|key| (key == ACTIVE_STATE).then_some("failed"));
        assert_eq!(state, StateTuple::new("unknown", "failed", "unknown"));
        assert!(state.is_known());
        assert!(!StateTuple::unknown().is_known());
    }

    #[test]
    fn overlay_keeps_untouched_members() {
        let base = StateTuple::new("loaded", "active", "running");
        let next = base.overlay(|key| (key == ACTIVE_STATE).then_some("deactivating"));
        assert_eq!(next, StateTuple::new("loaded", "deactivating", "running"));
    }

    #[test]
    fn serializes_member_names() {
        insta::assert_json_snapshot!(StateTuple::new("loaded", "active", "running"), @r#"
        {
          "load_state": "loaded",
          "active_state": "active",
          "sub_state": "running"
        }
        "#);
    }

    #[test]
    fn typed_views() {
        let state = StateTuple::new("not-found", "deactivating", "stop-sigterm");
        assert_eq!(state.load(), Some(LoadState::NotFound));
        assert_eq!(state.active(), Some(ActiveState::Deactivating));
        assert!(state.active().unwrap().is_transitional());
        assert_eq!(StateTuple::unknown().active(), None);
    }
}
