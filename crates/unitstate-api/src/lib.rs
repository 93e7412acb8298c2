// unitstate-api: Transport layer between systemd's D-Bus API and unitstate-core.

pub mod bus;
pub mod error;
pub mod memory;
pub mod path;
pub mod variant;

#[cfg(feature = "zbus")]
pub mod dbus;

pub use bus::{Bus, ManagerCall, ManagerReply, PropertiesChanged, PropertyMap, SignalStream};
pub use error::Error;
pub use memory::MemoryBus;
pub use path::{
    MANAGER_INTERFACE, MANAGER_PATH, ObjectPath, PROPERTIES_INTERFACE, SERVICE_NAME,
    UNIT_INTERFACE, UNIT_PATH_PREFIX, escape_path, unescape_path,
};
pub use variant::Variant;

#[cfg(feature = "zbus")]
pub use dbus::DBusConnection;
