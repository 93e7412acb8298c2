// ── Wire values ──
//
// Loosely typed property payloads as they come off the bus. The tag set
// mirrors the D-Bus type system one-to-one; `unitstate-core` decodes these
// into its own typed property representation.

use std::fmt;

/// A single D-Bus value with its wire type tag.
///
/// Container variants carry the signature of their elements so that empty
/// arrays and dictionaries stay typed.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Bool(bool),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Str(String),
    ObjectPath(String),
    Signature(String),
    /// `a<element>`: homogeneous array.
    Array { element: String, items: Vec<Variant> },
    /// `a{<key><value>}`: dictionary, entries in wire order.
    Dict {
        key: String,
        value: String,
        entries: Vec<(Variant, Variant)>,
    },
    /// `(...)`: struct.
    Struct(Vec<Variant>),
    /// `v`: boxed variant.
    Variant(Box<Variant>),
}

impl Variant {
    /// The D-Bus signature of this value.
    pub fn signature(&self) -> String {
        match self {
            Self::Bool(_) => "b".into(),
            Self::Byte(_) => "y".into(),
            Self::Int16(_) => "n".into(),
            Self::UInt16(_) => "q".into(),
            Self::Int32(_) => "i".into(),
            Self::UInt32(_) => "u".into(),
            Self::Int64(_) => "x".into(),
            Self::UInt64(_) => "t".into(),
            Self::Double(_) => "d".into(),
            Self::Str(_) => "s".into(),
            Self::ObjectPath(_) => "o".into(),
            Self::Signature(_) => "g".into(),
            Self::Array { element, .. } => format!("a{element}"),
            Self::Dict { key, value, .. } => format!("a{{{key}{value}}}"),
            Self::Struct(fields) => {
                let inner: String = fields.iter().map(Variant::signature).collect();
                format!("({inner})")
            }
            Self::Variant(_) => "v".into(),
        }
    }

    // ── Constructors ─────────────────────────────────────────────────

    /// `as` from any string-like iterator.
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Array {
            element: "s".into(),
            items: items.into_iter().map(|s| Self::Str(s.into())).collect(),
        }
    }

    /// `ay` from a byte slice.
    pub fn bytes(data: &[u8]) -> Self {
        Self::Array {
            element: "y".into(),
            items: data.iter().copied().map(Self::Byte).collect(),
        }
    }

    /// Array of values sharing `element` as their signature.
    pub fn array(element: impl Into<String>, items: Vec<Variant>) -> Self {
        Self::Array {
            element: element.into(),
            items,
        }
    }

    pub fn object_path(path: impl Into<String>) -> Self {
        Self::ObjectPath(path.into())
    }

    pub fn boxed(inner: Variant) -> Self {
        Self::Variant(Box::new(inner))
    }

    /// The string payload of `s`, `o` and `g` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::ObjectPath(s) | Self::Signature(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Str(v) | Self::ObjectPath(v) | Self::Signature(v) => write!(f, "{v:?}"),
            Self::Array { items, .. } => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Dict { entries, .. } => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Struct(fields) => {
                f.write_str("(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{field}")?;
                }
                f.write_str(")")
            }
            Self::Variant(inner) => write!(f, "<{inner}>"),
        }
    }
}

// ── Conversions from Rust primitives ─────────────────────────────────

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for Variant {
    fn from(v: u8) -> Self {
        Self::Byte(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u64> for Variant {
    fn from(v: u64) -> Self {
        Self::UInt64(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}
