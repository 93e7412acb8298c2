// unitstate-core: Live mirror of systemd unit state between unitstate-api and consumers.

pub mod config;
pub mod convert;
pub mod error;
pub mod manager;
pub mod model;
pub mod store;
pub mod stream;
pub mod subscription;
pub mod unit;
pub mod value;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BusAddress, ManagerConfig};
pub use error::CoreError;
pub use manager::Manager;
pub use store::{ChangeSet, PropertyCache};
pub use stream::{ListenerId, StateChange, StateChangeStream, StateDispatcher, StateFilter, StateStream};
pub use subscription::{SignalSubscription, SubscriptionStats};
pub use unit::Unit;
pub use value::{FromProperty, PropertyValue, ValueKind};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    // Names
    UnitKind, UnitName,
    // Lifecycle
    ActiveState, LoadState, StateTuple,
    // Verbs
    Mode, Who,
    // Records
    Condition, IoBandwidth, Job, LoadError,
};
