// ── Object identities ──
//
// Well-known systemd bus names plus the label escaping systemd applies when
// it turns a unit name into an object path.

use std::fmt;

use crate::error::Error;

pub const SERVICE_NAME: &str = "org.freedesktop.systemd1";
pub const MANAGER_PATH: &str = "/org/freedesktop/systemd1";
pub const MANAGER_INTERFACE: &str = "org.freedesktop.systemd1.Manager";
pub const UNIT_INTERFACE: &str = "org.freedesktop.systemd1.Unit";
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
pub const UNIT_PATH_PREFIX: &str = "/org/freedesktop/systemd1/unit/";

/// A validated D-Bus object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Validate `path` against the D-Bus object path grammar.
    pub fn new(path: impl Into<String>) -> Result<Self, Error> {
        let path = path.into();
        validate(&path).map_err(|reason| Error::InvalidPath {
            path: path.clone(),
            reason: reason.to_owned(),
        })?;
        Ok(Self(path))
    }

    /// Object path systemd exports for the unit called `name`.
    ///
    /// Escaping always yields a valid single segment, so this cannot fail.
    pub fn for_unit(name: &str) -> Self {
        Self(format!("{UNIT_PATH_PREFIX}{}", escape_path(name)))
    }

    pub fn manager() -> Self {
        Self(MANAGER_PATH.to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The unit name this path refers to, if it lives under the unit
    /// prefix and its label unescapes cleanly.
    pub fn unit_name(&self) -> Option<String> {
        self.0
            .strip_prefix(UNIT_PATH_PREFIX)
            .and_then(unescape_path)
    }
}

fn validate(path: &str) -> Result<(), &'static str> {
    if !path.starts_with('/') {
        return Err("must start with '/'");
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err("trailing '/'");
    }
    for segment in path[1..].split('/') {
        if segment.is_empty() {
            return Err("empty segment");
        }
        if !segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err("segments may only contain [A-Za-z0-9_]");
        }
    }
    Ok(())
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ObjectPath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// ── Label escaping ───────────────────────────────────────────────────

/// Escape `label` into a single object path segment.
///
/// ASCII letters pass through, digits pass through except in first
/// position, and every other byte becomes `_` followed by two lowercase hex
/// digits. The empty label maps to `_`.
pub fn escape_path(label: &str) -> String {
    if label.is_empty() {
        return "_".to_owned();
    }
    let mut out = String::with_capacity(label.len() * 3);
    for (i, b) in label.bytes().enumerate() {
        if b.is_ascii_alphabetic() || (i > 0 && b.is_ascii_digit()) {
            out.push(char::from(b));
        } else {
            out.push('_');
            out.push(hex_digit(b >> 4));
            out.push(hex_digit(b & 0x0f));
        }
    }
    out
}

/// Inverse of [`escape_path`]. `None` for a dangling or non-hex escape, or
/// when the decoded bytes are not UTF-8.
pub fn unescape_path(segment: &str) -> Option<String> {
    if segment == "_" {
        return Some(String::new());
    }
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hi = bytes.get(i + 1).copied().and_then(hex_value)?;
            let lo = bytes.get(i + 2).copied().and_then(hex_value)?;
            out.push((hi << 4) | lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn hex_digit(nibble: u8) -> char {
    char::from_digit(u32::from(nibble), 16).unwrap_or('0')
}

fn hex_value(b: u8) -> Option<u8> {
    char::from(b)
        .to_digit(16)
        .and_then(|d| u8::try_from(d).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_dots_and_dashes() {
        assert_eq!(escape_path("foo.service"), "foo_2eservice");
        assert_eq!(
            escape_path("systemd-journald.service"),
            "systemd_2djournald_2eservice"
        );
    }

    #[test]
    fn escapes_leading_digit_only() {
        assert_eq!(escape_path("1a2"), "_31a2");
        assert_eq!(escape_path(""), "_");
    }

    #[test]
    fn unescape_inverts_escape() {
        for name in ["foo.service", "getty@tty1.service", "-.mount", "0x.socket", ""] {
            assert_eq!(unescape_path(&escape_path(name)).as_deref(), Some(name));
        }
    }

    #[test]
    fn unescape_rejects_broken_escapes() {
        assert_eq!(unescape_path("foo_2"), None);
        assert_eq!(unescape_path("foo_zz"), None);
    }

    #[test]
    fn unit_path_round_trips_name() {
        let path = ObjectPath::for_unit("dbus.socket");
        assert_eq!(path.as_str(), "/org/freedesktop/systemd1/unit/dbus_2esocket");
        assert_eq!(path.unit_name().as_deref(), Some("dbus.socket"));
        assert_eq!(ObjectPath::manager().unit_name(), None);
    }

    #[test]
    fn validates_object_paths() {
        assert!(ObjectPath::new("/").is_ok());
        assert!(ObjectPath::new("/org/freedesktop/systemd1/job/7").is_ok());
        assert!(ObjectPath::new("org").is_err());
        assert!(ObjectPath::new("/org/").is_err());
        assert!(ObjectPath::new("/org//x").is_err());
        assert!(ObjectPath::new("/org/foo.service").is_err());
    }
}
