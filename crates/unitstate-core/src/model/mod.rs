// ── Unit domain model ──
//
// Names, kinds, lifecycle states and the structured records carried by
// unit properties.

pub mod mode;
pub mod name;
pub mod records;
pub mod state;

// ── Re-exports ──────────────────────────────────────────────────────

pub use mode::{Mode, Who};
pub use name::{UnitKind, UnitName, extract_name, normalize_name};
pub use records::{Condition, IoBandwidth, Job, LoadError, timestamp_from_usec};
pub use state::{
    ACTIVE_STATE, ActiveState, LIFECYCLE_KEYS, LOAD_STATE, LoadState, SUB_STATE, StateTuple,
};
