// ── Unit manager ──
//
// Registry of `Unit` facades keyed by normalized name, owner of the shared
// systemd event subscription, and the signal pump that routes
// PropertiesChanged notifications to units.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use unitstate_api::{Bus, ManagerCall, ManagerReply, ObjectPath, SignalStream};

use crate::config::{BusAddress, ManagerConfig};
use crate::error::CoreError;
use crate::model::{Mode, UnitKind, UnitName, Who};
use crate::unit::Unit;

// ── Manager ──────────────────────────────────────────────────────────

/// Entry point: one per bus connection.
///
/// Cheaply cloneable. Units hold only a weak reference back, so dropping
/// the last `Manager` clone stops the signal pump; units that outlive it
/// fail manager operations with [`CoreError::ManagerGone`].
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    bus: Arc<dyn Bus>,
    config: ManagerConfig,
    units: DashMap<String, Arc<Unit>>,
    events: Mutex<EventToggle>,
    cancel: CancellationToken,
}

/// Reference count of subscribed units and the pump they share.
#[derive(Default)]
struct EventToggle {
    refs: usize,
    pump: Option<Pump>,
}

struct Pump {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Manager {
    /// Build a manager over an existing bus.
    pub fn new(bus: Arc<dyn Bus>, config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                bus,
                config,
                units: DashMap::new(),
                events: Mutex::new(EventToggle::default()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Connect to the bus named in `config`.
    pub async fn connect(config: ManagerConfig) -> Result<Self, CoreError> {
        let bus = match &config.bus {
            BusAddress::System => unitstate_api::DBusConnection::system().await?,
            BusAddress::Session => unitstate_api::DBusConnection::session().await?,
            BusAddress::Address(address) => {
                unitstate_api::DBusConnection::address(address).await?
            }
        };
        Ok(Self::new(Arc::new(bus), config))
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn bus(&self) -> &Arc<dyn Bus> {
        &self.inner.bus
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// The unit for `name` of `kind`, constructing it on first use.
    ///
    /// `foo` and `foo.service` resolve to the same instance. With
    /// `auto_subscribe` the unit is subscribed before it is returned.
    pub async fn get_or_create(&self, kind: UnitKind, name: &str) -> Result<Arc<Unit>, CoreError> {
        let name = UnitName::normalize(name, kind)?;
        self.register(name, kind).await
    }

    /// Like [`get_or_create`](Self::get_or_create) with the kind taken from
    /// the name's suffix.
    pub async fn unit(&self, full_name: &str) -> Result<Arc<Unit>, CoreError> {
        let (name, kind) = UnitName::parse(full_name)?;
        self.register(name, kind).await
    }

    async fn register(&self, name: UnitName, kind: UnitKind) -> Result<Arc<Unit>, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ManagerGone);
        }

        let unit = match self.inner.units.entry(name.as_str().to_owned()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let unit = Arc::new(Unit::new(
                    name,
                    kind,
                    Arc::clone(&self.inner.bus),
                    Arc::downgrade(&self.inner),
                    &self.inner.config,
                ));
                debug!(unit = %unit, "unit registered");
                Arc::clone(entry.insert(unit).value())
            }
        };

        if self.inner.config.auto_subscribe {
            unit.subscribe().await?;
        }
        Ok(unit)
    }

    /// Registered unit for `name` of `kind`, normalized the same way as
    /// [`get_or_create`](Self::get_or_create). Never registers anything.
    pub fn get(&self, kind: UnitKind, name: &str) -> Option<Arc<Unit>> {
        let name = UnitName::normalize(name, kind).ok()?;
        self.inner
            .units
            .get(name.as_str())
            .map(|r| Arc::clone(r.value()))
    }

    /// All registered units, sorted by name.
    pub fn units(&self) -> Vec<Arc<Unit>> {
        let mut units: Vec<Arc<Unit>> = self
            .inner
            .units
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();
        units.sort_by(|a, b| a.name().cmp(b.name()));
        units
    }

    pub fn len(&self) -> usize {
        self.inner.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.units.is_empty()
    }

    /// The registered unit whose object path is `path`.
    pub fn unit_for_path(&self, path: &ObjectPath) -> Option<Arc<Unit>> {
        self.inner.unit_for_path(path)
    }

    /// Unsubscribe and forget a unit. Other holders of the `Arc` keep a
    /// working cache but receive no further notifications.
    pub async fn remove(&self, kind: UnitKind, name: &str) -> Option<Arc<Unit>> {
        let name = UnitName::normalize(name, kind).ok()?;
        let (_, unit) = self.inner.units.remove(name.as_str())?;
        if let Err(e) = unit.unsubscribe().await {
            warn!(unit = %unit, error = %e, "unsubscribe on removal failed");
        }
        debug!(unit = %unit, "unit removed");
        Some(unit)
    }

    /// Number of units currently holding the event subscription.
    pub async fn active_subscriptions(&self) -> usize {
        self.inner.events.lock().await.refs
    }

    /// Stop the signal pump and release the systemd subscription. The
    /// manager refuses to register units afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        for entry in &self.inner.units {
            entry.value().subscription().unsubscribe();
        }

        let mut toggle = self.inner.events.lock().await;
        let was_active = toggle.refs > 0;
        toggle.refs = 0;
        if let Some(pump) = toggle.pump.take() {
            pump.stop().await;
        }
        drop(toggle);

        if was_active {
            if let Err(e) = self.inner.call(ManagerCall::Unsubscribe).await {
                warn!(error = %e, "Unsubscribe during shutdown failed");
            }
        }
        info!("unit manager shut down");
    }

    // ── Manager verbs ────────────────────────────────────────────────

    /// Raw `Subscribe` call, independent of unit subscriptions.
    pub async fn subscribe(&self) -> Result<(), CoreError> {
        self.inner.call(ManagerCall::Subscribe).await.map(drop)
    }

    /// Raw `Unsubscribe` call, independent of unit subscriptions.
    pub async fn unsubscribe(&self) -> Result<(), CoreError> {
        self.inner.call(ManagerCall::Unsubscribe).await.map(drop)
    }

    pub async fn start_unit(&self, name: &str, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.inner.start_unit(name, mode).await
    }

    pub async fn stop_unit(&self, name: &str, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.inner.stop_unit(name, mode).await
    }

    pub async fn reload_unit(&self, name: &str, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.inner.reload_unit(name, mode).await
    }

    pub async fn restart_unit(&self, name: &str, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.inner.restart_unit(name, mode).await
    }

    pub async fn try_restart_unit(&self, name: &str, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.inner.try_restart_unit(name, mode).await
    }

    pub async fn reload_or_restart_unit(
        &self,
        name: &str,
        mode: Mode,
    ) -> Result<ObjectPath, CoreError> {
        self.inner.reload_or_restart_unit(name, mode).await
    }

    pub async fn reload_or_try_restart_unit(
        &self,
        name: &str,
        mode: Mode,
    ) -> Result<ObjectPath, CoreError> {
        self.inner.reload_or_try_restart_unit(name, mode).await
    }

    pub async fn kill_unit(&self, name: &str, who: Who, signal: i32) -> Result<(), CoreError> {
        self.inner.kill_unit(name, who, signal).await
    }

    pub async fn reset_failed_unit(&self, name: &str) -> Result<(), CoreError> {
        self.inner.reset_failed_unit(name).await
    }

    pub async fn unref_unit(&self, name: &str) -> Result<(), CoreError> {
        self.inner.unref_unit(name).await
    }

    /// Object path of a loaded unit.
    pub async fn get_unit(&self, name: &str) -> Result<ObjectPath, CoreError> {
        self.inner
            .unit_path(ManagerCall::GetUnit {
                name: name.to_owned(),
            })
            .await
    }

    /// Object path of a unit, loading it if necessary.
    pub async fn load_unit(&self, name: &str) -> Result<ObjectPath, CoreError> {
        self.inner
            .unit_path(ManagerCall::LoadUnit {
                name: name.to_owned(),
            })
            .await
    }
}

// ── Shared internals ─────────────────────────────────────────────────

impl ManagerInner {
    fn unit_for_path(&self, path: &ObjectPath) -> Option<Arc<Unit>> {
        self.units
            .iter()
            .find(|r| r.value().is_assignable_from(path))
            .map(|r| Arc::clone(r.value()))
    }

    /// Issue a manager call bounded by the configured timeout.
    async fn call(&self, call: ManagerCall) -> Result<ManagerReply, CoreError> {
        let timeout = self.config.call_timeout;
        trace!(method = call.method(), "manager call");
        match tokio::time::timeout(timeout, self.bus.call(call)).await {
            Ok(reply) => Ok(reply?),
            Err(_) => Err(CoreError::Timeout { timeout }),
        }
    }

    async fn job(&self, call: ManagerCall) -> Result<ObjectPath, CoreError> {
        let method = call.method();
        match self.call(call).await? {
            ManagerReply::Job(path) => {
                debug!(method, job = %path, "job queued");
                Ok(path)
            }
            _ => Err(CoreError::UnexpectedReply { method }),
        }
    }

    async fn unit_path(&self, call: ManagerCall) -> Result<ObjectPath, CoreError> {
        let method = call.method();
        match self.call(call).await? {
            ManagerReply::Unit(path) => Ok(path),
            _ => Err(CoreError::UnexpectedReply { method }),
        }
    }

    pub(crate) async fn start_unit(&self, name: &str, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.job(ManagerCall::StartUnit {
            name: name.to_owned(),
            mode: mode.to_string(),
        })
        .await
    }

    pub(crate) async fn stop_unit(&self, name: &str, mode: Mode) -> Result<ObjectPath, CoreError> {
        self.job(ManagerCall::StopUnit {
            name: name.to_owned(),
            mode: mode.to_string(),
        })
        .await
    }

    pub(crate) async fn reload_unit(
        &self,
        name: &str,
        mode: Mode,
    ) -> Result<ObjectPath, CoreError> {
        self.job(ManagerCall::ReloadUnit {
            name: name.to_owned(),
            mode: mode.to_string(),
        })
        .await
    }

    pub(crate) async fn restart_unit(
        &self,
        name: &str,
        mode: Mode,
    ) -> Result<ObjectPath, CoreError> {
        self.job(ManagerCall::RestartUnit {
            name: name.to_owned(),
            mode: mode.to_string(),
        })
        .await
    }

    pub(crate) async fn try_restart_unit(
        &self,
        name: &str,
        mode: Mode,
    ) -> Result<ObjectPath, CoreError> {
        self.job(ManagerCall::TryRestartUnit {
            name: name.to_owned(),
            mode: mode.to_string(),
        })
        .await
    }

    pub(crate) async fn reload_or_restart_unit(
        &self,
        name: &str,
        mode: Mode,
    ) -> Result<ObjectPath, CoreError> {
        self.job(ManagerCall::ReloadOrRestartUnit {
            name: name.to_owned(),
            mode: mode.to_string(),
        })
        .await
    }

    pub(crate) async fn reload_or_try_restart_unit(
        &self,
        name: &str,
        mode: Mode,
    ) -> Result<ObjectPath, CoreError> {
        self.job(ManagerCall::ReloadOrTryRestartUnit {
            name: name.to_owned(),
            mode: mode.to_string(),
        })
        .await
    }

    pub(crate) async fn kill_unit(&self, name: &str, who: Who, signal: i32) -> Result<(), CoreError> {
        self.call(ManagerCall::KillUnit {
            name: name.to_owned(),
            who: who.to_string(),
            signal,
        })
        .await
        .map(drop)
    }

    pub(crate) async fn reset_failed_unit(&self, name: &str) -> Result<(), CoreError> {
        self.call(ManagerCall::ResetFailedUnit {
            name: name.to_owned(),
        })
        .await
        .map(drop)
    }

    pub(crate) async fn unref_unit(&self, name: &str) -> Result<(), CoreError> {
        self.call(ManagerCall::UnrefUnit {
            name: name.to_owned(),
        })
        .await
        .map(drop)
    }

    // ── Event toggle ─────────────────────────────────────────────────

    /// Count one more subscribed unit; the first one turns systemd events
    /// on and starts the signal pump.
    pub(crate) async fn acquire_events(self: &Arc<Self>) -> Result<(), CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::ManagerGone);
        }

        let mut toggle = self.events.lock().await;
        if toggle.refs == 0 {
            // Open the signal feed before Subscribe so nothing emitted in
            // between is lost.
            let signals = self.bus.signals().await?;
            self.call(ManagerCall::Subscribe).await?;

            let cancel = self.cancel.child_token();
            let handle = tokio::spawn(signal_pump(
                Arc::downgrade(self),
                signals,
                cancel.clone(),
            ));
            toggle.pump = Some(Pump { cancel, handle });
            info!("systemd events subscribed");
        }
        toggle.refs += 1;
        Ok(())
    }

    /// Count one fewer subscribed unit; the last one stops the pump and
    /// turns systemd events off. Teardown failures are logged only.
    pub(crate) async fn release_events(&self) {
        let mut toggle = self.events.lock().await;
        if toggle.refs == 0 {
            return;
        }
        toggle.refs -= 1;
        if toggle.refs > 0 {
            return;
        }

        if let Some(pump) = toggle.pump.take() {
            pump.stop().await;
        }
        if let Err(e) = self.call(ManagerCall::Unsubscribe).await {
            warn!(error = %e, "Unsubscribe failed");
        }
        info!("systemd events unsubscribed");
    }
}

impl Pump {
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                warn!(error = %e, "signal pump panicked");
            }
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Signal pump ──────────────────────────────────────────────────────

/// Route every PropertiesChanged signal to the registered unit it belongs
/// to, one at a time, in arrival order.
async fn signal_pump(
    manager: Weak<ManagerInner>,
    mut signals: SignalStream,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            item = signals.next() => item,
        };
        let Some(item) = item else {
            warn!("signal stream ended");
            break;
        };
        let signal = match item {
            Ok(signal) => signal,
            Err(e) => {
                warn!(error = %e, "unreadable signal dropped");
                continue;
            }
        };

        let Some(target) = manager.upgrade().and_then(|m| m.unit_for_path(&signal.path)) else {
            trace!(path = %signal.path, "signal for unregistered object");
            continue;
        };
        trace!(unit = %target, keys = signal.changed.len(), "routing signal");
        // Failures are logged and counted by the subscription.
        let _ = target.deliver(&signal).await;
    }
    debug!("signal pump stopped");
}
