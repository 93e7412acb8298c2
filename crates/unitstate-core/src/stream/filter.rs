// ── Lifecycle predicates ──
//
// Used by `Unit::wait_for` and by consumers filtering a state stream.

use crate::model::{ActiveState, StateTuple};

/// Predicate over a unit's [`StateTuple`].
pub enum StateFilter {
    Any,
    /// `ActiveState` is `active`.
    Active,
    /// `ActiveState` is `inactive`.
    Inactive,
    /// `ActiveState` is `failed`.
    Failed,
    /// Not in the middle of a transition.
    Settled,
    ActiveState(ActiveState),
    SubState(String),
    Custom(Box<dyn Fn(&StateTuple) -> bool + Send + Sync>),
}

impl StateFilter {
    pub fn matches(&self, state: &StateTuple) -> bool {
        match self {
            Self::Any => true,
            Self::Active => state.active() == Some(ActiveState::Active),
            Self::Inactive => state.active() == Some(ActiveState::Inactive),
            Self::Failed => state.active() == Some(ActiveState::Failed),
            Self::Settled => state.active().is_some_and(|a| !a.is_transitional()),
            Self::ActiveState(expected) => state.active() == Some(*expected),
            Self::SubState(expected) => state.sub_state() == expected,
            Self::Custom(f) => f(state),
        }
    }
}
