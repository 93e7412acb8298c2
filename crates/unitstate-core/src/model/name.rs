use std::fmt;

use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use unitstate_api::{ObjectPath, UNIT_PATH_PREFIX, escape_path, unescape_path};

use crate::error::CoreError;

/// The unit types systemd knows, each with its name suffix and the
/// type-specific D-Bus interface.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Service,
    Socket,
    Target,
    Device,
    Mount,
    Automount,
    Swap,
    Timer,
    Path,
    Slice,
    Scope,
}

impl UnitKind {
    /// Name suffix including the dot, e.g. `.service`.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Service => ".service",
            Self::Socket => ".socket",
            Self::Target => ".target",
            Self::Device => ".device",
            Self::Mount => ".mount",
            Self::Automount => ".automount",
            Self::Swap => ".swap",
            Self::Timer => ".timer",
            Self::Path => ".path",
            Self::Slice => ".slice",
            Self::Scope => ".scope",
        }
    }

    /// The kind-specific interface exported next to
    /// `org.freedesktop.systemd1.Unit`.
    pub fn interface(self) -> &'static str {
        match self {
            Self::Service => "org.freedesktop.systemd1.Service",
            Self::Socket => "org.freedesktop.systemd1.Socket",
            Self::Target => "org.freedesktop.systemd1.Target",
            Self::Device => "org.freedesktop.systemd1.Device",
            Self::Mount => "org.freedesktop.systemd1.Mount",
            Self::Automount => "org.freedesktop.systemd1.Automount",
            Self::Swap => "org.freedesktop.systemd1.Swap",
            Self::Timer => "org.freedesktop.systemd1.Timer",
            Self::Path => "org.freedesktop.systemd1.Path",
            Self::Slice => "org.freedesktop.systemd1.Slice",
            Self::Scope => "org.freedesktop.systemd1.Scope",
        }
    }

    /// Kind whose suffix ends `name`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::iter().find(|kind| {
            name.strip_suffix(kind.suffix())
                .is_some_and(|stem| !stem.is_empty())
        })
    }
}

/// Append `suffix` to `name` unless it is already there.
pub fn normalize_name(name: &str, suffix: &str) -> String {
    if name.ends_with(suffix) {
        name.to_owned()
    } else {
        format!("{name}{suffix}")
    }
}

/// The unit name encoded in a unit object path, if `path` is one.
pub fn extract_name(path: &ObjectPath) -> Option<String> {
    path.as_str()
        .strip_prefix(UNIT_PATH_PREFIX)
        .and_then(unescape_path)
}

/// A full, normalized unit name such as `sshd.service`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnitName(String);

impl UnitName {
    /// Normalize `name` for `kind`: the suffix is appended when missing.
    pub fn normalize(name: &str, kind: UnitKind) -> Result<Self, CoreError> {
        validate(name)?;
        Ok(Self(normalize_name(name, kind.suffix())))
    }

    /// Parse a full name, inferring the kind from its suffix.
    pub fn parse(name: &str) -> Result<(Self, UnitKind), CoreError> {
        validate(name)?;
        let kind = UnitKind::from_name(name).ok_or_else(|| CoreError::InvalidName {
            name: name.to_owned(),
            reason: "no recognised unit type suffix".into(),
        })?;
        Ok((Self(name.to_owned()), kind))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The escaped object path label for this name.
    pub fn escaped(&self) -> String {
        escape_path(&self.0)
    }

    pub fn object_path(&self) -> ObjectPath {
        ObjectPath::for_unit(&self.0)
    }
}

fn validate(name: &str) -> Result<(), CoreError> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name.contains('/') {
        "unit names cannot contain '/'"
    } else if name.chars().any(char::is_control) {
        "control characters are not allowed"
    } else {
        return Ok(());
    };
    Err(CoreError::InvalidName {
        name: name.to_owned(),
        reason: reason.into(),
    })
}

impl fmt::Display for UnitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UnitName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn normalization_appends_missing_suffix_once() {
        assert_eq!(normalize_name("foo", ".service"), "foo.service");
        assert_eq!(normalize_name("foo.service", ".service"), "foo.service");

        let a = UnitName::normalize("foo", UnitKind::Service).unwrap();
        let b = UnitName::normalize("foo.service", UnitKind::Service).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.escaped(), "foo_2eservice");
    }

    #[test]
    fn parse_infers_kind() {
        let (name, kind) = UnitName::parse("dev-sda1.swap").unwrap();
        assert_eq!(name.as_str(), "dev-sda1.swap");
        assert_eq!(kind, UnitKind::Swap);
        assert_eq!(
            UnitName::parse("proc-sys-fs-binfmt_misc.automount").unwrap().1,
            UnitKind::Automount
        );
        assert!(UnitName::parse("nosuffix").is_err());
        assert!(UnitName::parse(".service").is_err());
    }

    #[test]
    fn rejects_bad_names() {
        assert!(UnitName::normalize("", UnitKind::Service).is_err());
        assert!(UnitName::normalize("a/b", UnitKind::Service).is_err());
    }

    #[test]
    fn extract_name_inverts_object_path() {
        let name = UnitName::normalize("getty@tty1", UnitKind::Service).unwrap();
        assert_eq!(
            extract_name(&name.object_path()).as_deref(),
            Some("getty@tty1.service")
        );
        assert_eq!(extract_name(&ObjectPath::manager()), None);
    }

    #[test]
    fn kind_metadata() {
        assert_eq!(UnitKind::Socket.to_string(), "socket");
        assert_eq!(UnitKind::Socket.interface(), "org.freedesktop.systemd1.Socket");
        assert_eq!("timer".parse::<UnitKind>().unwrap(), UnitKind::Timer);
    }
}
