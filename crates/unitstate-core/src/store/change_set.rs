// ── Change sets ──
//
// The decoded payload of one PropertiesChanged notification.

use std::collections::HashMap;

use unitstate_api::PropertyMap;

use crate::convert;
use crate::error::CoreError;
use crate::model::LIFECYCLE_KEYS;
use crate::value::{PropertyValue, ValueKind};

/// Property updates delivered by one notification; may be partial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    values: HashMap<String, PropertyValue>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw changed-properties map as a unit.
    ///
    /// Any undecodable value, or a lifecycle key that is not a string,
    /// rejects the whole set.
    pub fn decode(changed: &PropertyMap) -> Result<Self, CoreError> {
        let values = convert::decode_map(changed)?;
        let set = Self { values };
        set.validate()?;
        Ok(set)
    }

    pub(crate) fn validate(&self) -> Result<(), CoreError> {
        for key in LIFECYCLE_KEYS {
            if let Some(value) = self.values.get(key) {
                if value.as_str().is_none() {
                    return Err(CoreError::TypeMismatch {
                        key: key.to_owned(),
                        expected: ValueKind::String,
                        found: value.peel().kind(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys in the set, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Whether any of `LoadState`, `ActiveState` or `SubState` is present.
    pub fn touches_lifecycle(&self) -> bool {
        LIFECYCLE_KEYS.iter().any(|key| self.values.contains_key(*key))
    }

    /// String value of `key`, if present and a string.
    pub fn lifecycle_value(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(PropertyValue::as_str)
    }
}

impl FromIterator<(String, PropertyValue)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ChangeSet {
    type Item = (String, PropertyValue);
    type IntoIter = std::collections::hash_map::IntoIter<String, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use unitstate_api::Variant;

    #[test]
    fn detects_lifecycle_keys() {
        let set = ChangeSet::new().with("MainPID", PropertyValue::Integer(1));
        assert!(!set.touches_lifecycle());

        let set = set.with("SubState", PropertyValue::String("running".into()));
        assert!(set.touches_lifecycle());
        assert_eq!(set.lifecycle_value("SubState"), Some("running"));
        assert_eq!(set.keys(), vec!["MainPID", "SubState"]);
    }

    #[test]
    fn non_string_lifecycle_value_rejects_set() {
        let mut raw = PropertyMap::new();
        raw.insert("ActiveState".into(), Variant::UInt32(1));
        raw.insert("Description".into(), Variant::from("x"));

        let err = ChangeSet::decode(&raw).unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { ref key, .. } if key == "ActiveState"));
    }
}
