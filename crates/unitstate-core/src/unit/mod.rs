// ── Unit facade ──
//
// One systemd unit: its property cache, signal subscription and state
// dispatcher, plus lifecycle verbs forwarded to the owning manager.

mod properties;

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::debug;
use unitstate_api::{Bus, ObjectPath, PropertiesChanged, UNIT_INTERFACE};

use crate::config::ManagerConfig;
use crate::error::CoreError;
use crate::manager::{Manager, ManagerInner};
use crate::model::{Mode, StateTuple, UnitKind, UnitName, Who, extract_name};
use crate::store::PropertyCache;
use crate::stream::{ListenerId, StateChange, StateDispatcher, StateFilter, StateStream};
use crate::subscription::SignalSubscription;
use crate::value::{FromProperty, PropertyValue};

/// A systemd unit as seen through one [`Manager`].
///
/// Obtained from [`Manager::get_or_create`]; there is at most one `Unit`
/// per normalized name and manager.
pub struct Unit {
    name: UnitName,
    kind: UnitKind,
    manager: Weak<ManagerInner>,
    cache: PropertyCache,
    subscription: SignalSubscription,
    dispatcher: StateDispatcher,
}

impl Unit {
    pub(crate) fn new(
        name: UnitName,
        kind: UnitKind,
        bus: Arc<dyn Bus>,
        manager: Weak<ManagerInner>,
        config: &ManagerConfig,
    ) -> Self {
        let path = name.object_path();
        let interfaces = vec![UNIT_INTERFACE.to_owned(), kind.interface().to_owned()];
        Self {
            cache: PropertyCache::new(bus, path.clone(), interfaces),
            subscription: SignalSubscription::new(),
            dispatcher: StateDispatcher::new(name.as_str(), path, config.state_channel_capacity),
            name,
            kind,
            manager,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn unit_name(&self) -> &UnitName {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn path(&self) -> &ObjectPath {
        self.cache.path()
    }

    pub fn cache(&self) -> &PropertyCache {
        &self.cache
    }

    pub fn subscription(&self) -> &SignalSubscription {
        &self.subscription
    }

    pub fn dispatcher(&self) -> &StateDispatcher {
        &self.dispatcher
    }

    /// The owning manager, unless it has been dropped.
    pub fn manager(&self) -> Option<Manager> {
        self.manager.upgrade().map(Manager::from_inner)
    }

    fn owner(&self) -> Result<Arc<ManagerInner>, CoreError> {
        self.manager.upgrade().ok_or(CoreError::ManagerGone)
    }

    /// Whether `path` is the object path of this unit.
    pub fn is_assignable_from(&self, path: &ObjectPath) -> bool {
        extract_name(path).is_some_and(|name| name == self.name.as_str())
    }

    // ── Lifecycle verbs ──────────────────────────────────────────────
    //
    // Each queues a job and returns its object path without waiting for
    // it. Use `wait_for` or a listener to observe the outcome.

    pub async fn start(&self, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.owner()?.start_unit(self.name(), mode).await
    }

    pub async fn stop(&self, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.owner()?.stop_unit(self.name(), mode).await
    }

    pub async fn reload(&self, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.owner()?.reload_unit(self.name(), mode).await
    }

    pub async fn restart(&self, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.owner()?.restart_unit(self.name(), mode).await
    }

    pub async fn try_restart(&self, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.owner()?.try_restart_unit(self.name(), mode).await
    }

    pub async fn reload_or_restart(&self, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.owner()?.reload_or_restart_unit(self.name(), mode).await
    }

    pub async fn reload_or_try_restart(&self, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.owner()?
            .reload_or_try_restart_unit(self.name(), mode)
            .await
    }

    pub async fn kill(&self, who: Who, signal: i32) -> Result<(), CoreError> {
        self.owner()?.kill_unit(self.name(), who, signal).await
    }

    pub async fn reset_failed(&self) -> Result<(), CoreError> {
        self.owner()?.reset_failed_unit(self.name()).await
    }

    pub async fn unref(&self) -> Result<(), CoreError> {
        self.owner()?.unref_unit(self.name()).await
    }

    // ── Subscription ─────────────────────────────────────────────────

    /// Start receiving change notifications. A no-op if already
    /// subscribed; the first active unit switches manager events on.
    pub async fn subscribe(&self) -> Result<(), CoreError> {
        if !self.subscription.subscribe() {
            return Ok(());
        }
        let acquired = match self.owner() {
            Ok(owner) => owner.acquire_events().await,
            Err(e) => Err(e),
        };
        if let Err(e) = acquired {
            self.subscription.unsubscribe();
            return Err(e);
        }
        debug!(unit = %self.name, "subscribed to changes");
        Ok(())
    }

    /// Stop receiving change notifications. Safe if never subscribed.
    pub async fn unsubscribe(&self) -> Result<(), CoreError> {
        if !self.subscription.unsubscribe() {
            return Ok(());
        }
        if let Some(owner) = self.manager.upgrade() {
            owner.release_events().await;
        }
        debug!(unit = %self.name, "unsubscribed from changes");
        Ok(())
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    pub(crate) async fn deliver(
        &self,
        signal: &PropertiesChanged,
    ) -> Result<Option<Arc<StateChange>>, CoreError> {
        self.subscription
            .deliver(signal, &self.cache, &self.dispatcher)
            .await
    }

    // ── Properties ───────────────────────────────────────────────────

    /// Typed property read; the first read fetches everything.
    pub async fn get<T: FromProperty>(&self, key: &str) -> Result<T, CoreError> {
        self.cache.get(key).await
    }

    pub async fn get_value(&self, key: &str) -> Result<PropertyValue, CoreError> {
        self.cache.get_value(key).await
    }

    /// Re-fetch all properties from systemd.
    pub async fn refresh_all(&self) -> Result<(), CoreError> {
        self.cache.refresh_all().await?;
        self.dispatcher.observe(self.cache.state());
        Ok(())
    }

    /// Current lifecycle state, fetching first if the cache is empty.
    pub async fn state(&self) -> Result<StateTuple, CoreError> {
        self.cache.ensure_initialized().await?;
        let state = self.cache.state();
        self.dispatcher.observe(state.clone());
        Ok(state)
    }

    /// Lifecycle state from whatever is cached, without a round trip.
    pub fn cached_state(&self) -> StateTuple {
        self.cache.state()
    }

    // ── Listeners ────────────────────────────────────────────────────

    pub fn add_listener<F>(&self, callback: F) -> Result<ListenerId, CoreError>
    where
        F: Fn(&StateChange) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.dispatcher.add_listener(callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.dispatcher.remove_listener(id)
    }

    pub fn subscribe_state(&self) -> StateStream {
        self.dispatcher.subscribe_state()
    }

    pub fn watch_state(&self) -> tokio::sync::watch::Receiver<StateTuple> {
        self.dispatcher.watch_state()
    }

    /// Wait until the unit's state satisfies `filter`.
    ///
    /// Subscribes if needed, checks the live state once, then follows
    /// notifications until the filter matches or `timeout` elapses.
    pub async fn wait_for(
        &self,
        filter: StateFilter,
        timeout: Duration,
    ) -> Result<StateTuple, CoreError> {
        self.subscribe().await?;
        let mut rx = self.dispatcher.watch_state();

        let current = self.state().await?;
        if filter.matches(&current) {
            return Ok(current);
        }

        match tokio::time::timeout(timeout, rx.wait_for(|state| filter.matches(state))).await {
            Ok(Ok(state)) => Ok(state.clone()),
            Ok(Err(_)) => Err(CoreError::ManagerGone),
            Err(_) => Err(CoreError::Timeout { timeout }),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}
