// Structured property payloads decoded from records (D-Bus structs).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::value::{FromProperty, PropertyValue, ValueKind};

/// `Job` property, `(uo)`: the job currently queued for a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: u32,
    pub path: String,
}

impl Job {
    /// systemd reports "no job" as id 0 on path `/`.
    pub fn is_none(&self) -> bool {
        self.id == 0
    }
}

/// `LoadError` property, `(ss)`: D-Bus error name and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadError {
    pub name: String,
    pub message: String,
}

impl LoadError {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// One entry of `Conditions` / `Asserts`, `(sbbsi)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub kind: String,
    pub trigger: bool,
    pub negate: bool,
    pub parameter: String,
    /// Positive when the check passed, negative when it failed, 0 when
    /// not evaluated yet.
    pub state: i32,
}

/// One entry of `IOReadBandwidthMax` and friends, `(st)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoBandwidth {
    pub path: String,
    pub bandwidth: u64,
}

// ── Record decoding ──────────────────────────────────────────────────

fn field<T: FromProperty>(fields: &[PropertyValue], index: usize) -> Option<T> {
    fields.get(index).and_then(|v| T::from_property(v.peel()))
}

impl FromProperty for Job {
    const KIND: ValueKind = ValueKind::Record;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        let fields = value.as_record()?;
        if fields.len() != 2 {
            return None;
        }
        Some(Self {
            id: field(fields, 0)?,
            path: field(fields, 1)?,
        })
    }
}

impl FromProperty for LoadError {
    const KIND: ValueKind = ValueKind::Record;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        let fields = value.as_record()?;
        if fields.len() != 2 {
            return None;
        }
        Some(Self {
            name: field(fields, 0)?,
            message: field(fields, 1)?,
        })
    }
}

impl FromProperty for Condition {
    const KIND: ValueKind = ValueKind::Record;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        let fields = value.as_record()?;
        if fields.len() != 5 {
            return None;
        }
        Some(Self {
            kind: field(fields, 0)?,
            trigger: field(fields, 1)?,
            negate: field(fields, 2)?,
            parameter: field(fields, 3)?,
            state: field(fields, 4)?,
        })
    }
}

impl FromProperty for IoBandwidth {
    const KIND: ValueKind = ValueKind::Record;

    fn from_property(value: &PropertyValue) -> Option<Self> {
        let fields = value.as_record()?;
        if fields.len() != 2 {
            return None;
        }
        Some(Self {
            path: field(fields, 0)?,
            bandwidth: field(fields, 1)?,
        })
    }
}

/// Arrays of records: every element must decode or the whole list fails.
macro_rules! record_list {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromProperty for Vec<$ty> {
                const KIND: ValueKind = ValueKind::List;

                fn from_property(value: &PropertyValue) -> Option<Self> {
                    value
                        .as_list()?
                        .iter()
                        .map(|item| <$ty>::from_property(item.peel()))
                        .collect()
                }
            }
        )+
    };
}

record_list!(Job, Condition, IoBandwidth);

// ── Timestamps ───────────────────────────────────────────────────────

/// Convert a systemd `usec` realtime timestamp. Zero means "never".
pub fn timestamp_from_usec(usec: u64) -> Option<DateTime<Utc>> {
    if usec == 0 {
        return None;
    }
    let secs = i64::try_from(usec / 1_000_000).ok()?;
    let nanos = u32::try_from((usec % 1_000_000) * 1_000).ok()?;
    DateTime::from_timestamp(secs, nanos)
}
