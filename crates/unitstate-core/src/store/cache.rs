// ── Property cache ──
//
// Local mirror of one unit object's properties. Filled by a bulk GetAll on
// first use, then kept current by change sets from the signal feed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;
use unitstate_api::{Bus, ObjectPath};

use crate::convert;
use crate::error::CoreError;
use crate::model::StateTuple;
use crate::store::ChangeSet;
use crate::value::{FromProperty, PropertyValue};

#[derive(Default)]
struct CacheState {
    values: HashMap<String, PropertyValue>,
    initialized: bool,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Property cache for exactly one remote object.
///
/// Mutations (bulk refresh and change-set application) are serialized by an
/// async write gate; the map itself sits behind a `RwLock` so readers never
/// see a half-applied update.
pub struct PropertyCache {
    bus: Arc<dyn Bus>,
    path: ObjectPath,
    interfaces: Vec<String>,
    state: RwLock<CacheState>,
    gate: Mutex<()>,
}

impl PropertyCache {
    pub fn new(bus: Arc<dyn Bus>, path: ObjectPath, interfaces: Vec<String>) -> Self {
        Self {
            bus,
            path,
            interfaces,
            state: RwLock::new(CacheState::default()),
            gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Interfaces fetched by a refresh, in order.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn has_interface(&self, interface: &str) -> bool {
        self.interfaces.iter().any(|i| i == interface)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Typed read, fetching everything first if the cache was never filled.
    pub async fn get<T: FromProperty>(&self, key: &str) -> Result<T, CoreError> {
        self.ensure_initialized().await?;
        let state = self.read();
        let value = state.values.get(key).ok_or_else(|| CoreError::UnknownKey {
            key: key.to_owned(),
        })?;
        value.coerce(key)
    }

    /// Untyped read, fetching first if needed.
    pub async fn get_value(&self, key: &str) -> Result<PropertyValue, CoreError> {
        self.get::<PropertyValue>(key).await
    }

    /// Typed read of whatever is cached right now, without a round trip.
    /// `Ok(None)` if the key is not cached.
    pub fn cached<T: FromProperty>(&self, key: &str) -> Result<Option<T>, CoreError> {
        self.read()
            .values
            .get(key)
            .map(|value| value.coerce(key))
            .transpose()
    }

    /// Lifecycle tuple from the current contents.
    pub fn state(&self) -> StateTuple {
        let state = self.read();
        StateTuple::from_lookup(|key| state.values.get(key).and_then(PropertyValue::as_str))
    }

    /// Sorted list of cached keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.read().values.keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Clone of every cached value.
    pub fn snapshot(&self) -> HashMap<String, PropertyValue> {
        self.read().values.clone()
    }

    pub fn len(&self) -> usize {
        self.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().values.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.read().initialized
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.read().refreshed_at
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Bulk fetch unless a previous fetch already filled the cache.
    pub async fn ensure_initialized(&self) -> Result<(), CoreError> {
        if self.is_initialized() {
            return Ok(());
        }
        let _gate = self.gate.lock().await;
        if self.is_initialized() {
            return Ok(());
        }
        self.refresh_locked().await
    }

    /// Re-fetch every property and replace the map wholesale.
    pub async fn refresh_all(&self) -> Result<(), CoreError> {
        let _gate = self.gate.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<(), CoreError> {
        let mut values = HashMap::new();
        for interface in &self.interfaces {
            let raw = self.bus.get_all(&self.path, interface).await?;
            values.extend(convert::decode_map(&raw)?);
        }

        let count = values.len();
        {
            let mut state = self.write();
            state.values = values;
            state.initialized = true;
            state.refreshed_at = Some(Utc::now());
        }
        debug!(path = %self.path, properties = count, "property cache refreshed");
        Ok(())
    }

    /// Overwrite exactly the keys in `changes`.
    ///
    /// Returns the lifecycle tuple as it was immediately before the update,
    /// captured under the same write lock.
    pub fn apply_change_set(&self, changes: &ChangeSet) -> StateTuple {
        let mut state = self.write();
        let previous =
            StateTuple::from_lookup(|key| state.values.get(key).and_then(PropertyValue::as_str));
        for (key, value) in changes.iter() {
            state.values.insert(key.to_owned(), value.clone());
        }
        previous
    }

    /// Fetch and decode a single property (used for invalidated keys).
    pub async fn fetch(&self, interface: &str, key: &str) -> Result<PropertyValue, CoreError> {
        let raw = self.bus.get_property(&self.path, interface, key).await?;
        convert::decode_property(key, &raw)
    }

    /// Hold the write gate; refreshes wait until the guard is dropped.
    pub(crate) async fn write_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use unitstate_api::{MemoryBus, PropertyMap, UNIT_INTERFACE, Variant};

    fn unit_props() -> PropertyMap {
        [
            ("LoadState", Variant::from("loaded")),
            ("ActiveState", Variant::from("active")),
            ("SubState", Variant::from("running")),
            ("Description", Variant::from("Foo daemon")),
            ("CanStart", Variant::Bool(true)),
            ("ActiveEnterTimestamp", Variant::UInt64(1_700_000_000_000_000)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
    }

    fn cache(bus: &MemoryBus) -> PropertyCache {
        let path = bus.insert_unit("foo.service", UNIT_INTERFACE, unit_props());
        PropertyCache::new(Arc::new(bus.clone()), path, vec![UNIT_INTERFACE.to_owned()])
    }

    #[tokio::test]
    async fn first_get_fetches_once() {
        let bus = MemoryBus::new();
        let cache = cache(&bus);
        assert!(!cache.is_initialized());

        let description: String = cache.get("Description").await.unwrap();
        let can_start: bool = cache.get("CanStart").await.unwrap();

        assert_eq!(description, "Foo daemon");
        assert!(can_start);
        assert_eq!(bus.get_all_count(), 1);
        assert!(cache.last_refresh().is_some());
    }

    #[tokio::test]
    async fn unknown_key_and_type_mismatch() {
        let bus = MemoryBus::new();
        let cache = cache(&bus);

        let err = cache.get::<String>("Bogus").await.unwrap_err();
        assert!(matches!(err, CoreError::UnknownKey { .. }));

        let err = cache.get::<bool>("Description").await.unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[tokio::test]
    async fn transport_failure_leaves_cache_uninitialized() {
        let bus = MemoryBus::new();
        let cache = cache(&bus);
        bus.fail_next_get_all(1);

        let err = cache.get::<String>("Description").await.unwrap_err();
        assert!(err.is_transport());
        assert!(!cache.is_initialized());

        assert!(cache.get::<String>("Description").await.is_ok());
    }

    #[tokio::test]
    async fn apply_returns_previous_state() {
        let bus = MemoryBus::new();
        let cache = cache(&bus);
        cache.refresh_all().await.unwrap();

        let changes = ChangeSet::new().with(
            "ActiveState",
            PropertyValue::String("deactivating".into()),
        );
        let previous = cache.apply_change_set(&changes);

        assert_eq!(previous, StateTuple::new("loaded", "active", "running"));
        assert_eq!(
            cache.state(),
            StateTuple::new("loaded", "deactivating", "running")
        );
        assert_eq!(bus.get_all_count(), 1);
    }

    #[tokio::test]
    async fn apply_on_empty_cache_reports_unknown() {
        let bus = MemoryBus::new();
        let cache = cache(&bus);
        let previous = cache.apply_change_set(
            &ChangeSet::new().with("SubState", PropertyValue::String("dead".into())),
        );
        assert_eq!(previous, StateTuple::unknown());
        assert_eq!(cache.cached::<String>("SubState").unwrap().as_deref(), Some("dead"));
        assert!(!cache.is_initialized());
    }
}
