// ── Typed property values ──
//
// The cache stores every property as a `PropertyValue`. Callers pull typed
// values out through `FromProperty`, which fails with a `TypeMismatch`
// instead of guessing.

use std::fmt;

use serde::Serialize;
use strum::Display;

use crate::error::CoreError;

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    /// Every signed and unsigned integer up to 32 bits, plus `int64`.
    Integer(i64),
    /// `uint64`: timestamps, byte counts, limits.
    BigInteger(u64),
    Double(f64),
    /// Strings, object paths and signatures.
    String(String),
    Bytes(Vec<u8>),
    Strings(Vec<String>),
    /// A struct, fields in wire order.
    Record(Vec<PropertyValue>),
    /// An array of anything other than bytes or strings.
    List(Vec<PropertyValue>),
    Variant(Box<PropertyValue>),
}

/// The tag of a [`PropertyValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ValueKind {
    Boolean,
    Integer,
    BigInteger,
    Double,
    String,
    Bytes,
    Strings,
    Record,
    List,
    Variant,
    /// Matches any tag.
    Any,
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::BigInteger(_) => ValueKind::BigInteger,
            Self::Double(_) => ValueKind::Double,
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Strings(_) => ValueKind::Strings,
            Self::Record(_) => ValueKind::Record,
            Self::List(_) => ValueKind::List,
            Self::Variant(_) => ValueKind::Variant,
        }
    }

    /// Strip any number of variant wrappers.
    pub fn peel(&self) -> &PropertyValue {
        let mut value = self;
        while let Self::Variant(inner) = value {
            value = inner;
        }
        value
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.peel() {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&[PropertyValue]> {
        match self.peel() {
            Self::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self.peel() {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Coerce into `T`, reporting `key` on mismatch. Variant wrappers are
    /// stripped unless `T` takes any tag, which gets the value as stored.
    pub fn coerce<T: FromProperty>(&self, key: &str) -> Result<T, CoreError> {
        let value = if T::KIND == ValueKind::Any {
            self
        } else {
            self.peel()
        };
        T::from_property(value).ok_or_else(|| CoreError::TypeMismatch {
            key: key.to_owned(),
            expected: T::KIND,
            found: self.peel().kind(),
        })
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", if *v { "yes" } else { "no" }),
            Self::Integer(v) => write!(f, "{v}"),
            Self::BigInteger(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => f.write_str(v),
            Self::Bytes(v) => {
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Self::Strings(v) => f.write_str(&v.join(" ")),
            Self::Record(fields) => {
                f.write_str("(")?;
                write_joined(f, fields, ", ")?;
                f.write_str(")")
            }
            Self::List(items) => {
                f.write_str("[")?;
                write_joined(f, items, ", ")?;
                f.write_str("]")
            }
            Self::Variant(inner) => write!(f, "{inner}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[PropertyValue], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// ── Coercion ─────────────────────────────────────────────────────────

/// Extraction of a Rust type from a [`PropertyValue`].
///
/// `from_property` receives a value with its variant wrappers already
/// removed (except for [`ValueKind::Any`]) and returns `None` when the tag
/// does not fit.
pub trait FromProperty: Sized {
    const KIND: ValueKind;

    fn from_property(value: &PropertyValue) -> Option<Self>;
}

impl FromProperty for PropertyValue {
    const KIND: ValueKind = ValueKind::Any;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromProperty for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromProperty for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromProperty for i32 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Integer(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromProperty for u32 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Integer(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromProperty for u64 {
    const KIND: ValueKind = ValueKind::BigInteger;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::BigInteger(v) => Some(*v),
            PropertyValue::Integer(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl FromProperty for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromProperty for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromProperty for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Bytes(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromProperty for Vec<String> {
    const KIND: ValueKind = ValueKind::Strings;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Strings(v) => Some(v.clone()),
            _ => None,
        }
    }
}
