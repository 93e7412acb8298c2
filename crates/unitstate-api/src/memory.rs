// ── In-memory bus ──
//
// A scripted stand-in for systemd: objects and their properties live in a
// map, manager calls are recorded, and signals are injected by hand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::bus::{Bus, ManagerCall, ManagerReply, PropertiesChanged, PropertyMap, SignalStream};
use crate::error::Error;
use crate::path::{MANAGER_PATH, ObjectPath};
use crate::variant::Variant;

const SIGNAL_CAPACITY: usize = 256;

type Interfaces = HashMap<String, PropertyMap>;

#[derive(Debug, Clone)]
enum SignalEvent {
    Changed(PropertiesChanged),
    Malformed(String),
}

/// Cheap-to-clone handle onto a shared in-memory systemd.
#[derive(Clone)]
pub struct MemoryBus {
    inner: Arc<Inner>,
}

struct Inner {
    objects: Mutex<HashMap<ObjectPath, Interfaces>>,
    calls: Mutex<Vec<ManagerCall>>,
    signals: broadcast::Sender<SignalEvent>,
    subscribed: AtomicBool,
    jobs: AtomicU32,
    get_all_count: AtomicUsize,
    fail_get_all: AtomicUsize,
    fail_get_property: AtomicUsize,
    fail_calls: AtomicUsize,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                objects: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
                signals,
                subscribed: AtomicBool::new(false),
                jobs: AtomicU32::new(0),
                get_all_count: AtomicUsize::new(0),
                fail_get_all: AtomicUsize::new(0),
                fail_get_property: AtomicUsize::new(0),
                fail_calls: AtomicUsize::new(0),
            }),
        }
    }

    // ── Scripting objects ────────────────────────────────────────────

    /// Export `properties` on `interface` at `path`, replacing any previous
    /// set for that interface.
    pub fn insert_object(&self, path: &ObjectPath, interface: &str, properties: PropertyMap) {
        lock(&self.inner.objects)
            .entry(path.clone())
            .or_default()
            .insert(interface.to_owned(), properties);
    }

    /// Export `properties` for the unit called `name`; returns its path.
    pub fn insert_unit(&self, name: &str, interface: &str, properties: PropertyMap) -> ObjectPath {
        let path = ObjectPath::for_unit(name);
        self.insert_object(&path, interface, properties);
        path
    }

    /// Change one stored value without emitting a signal.
    pub fn set_property(&self, path: &ObjectPath, interface: &str, name: &str, value: Variant) {
        lock(&self.inner.objects)
            .entry(path.clone())
            .or_default()
            .entry(interface.to_owned())
            .or_default()
            .insert(name.to_owned(), value);
    }

    /// Apply `changed` to the stored object, then emit `PropertiesChanged`.
    pub fn emit_changed(
        &self,
        path: &ObjectPath,
        interface: &str,
        changed: PropertyMap,
        invalidated: Vec<String>,
    ) {
        {
            let mut objects = lock(&self.inner.objects);
            let props = objects
                .entry(path.clone())
                .or_default()
                .entry(interface.to_owned())
                .or_default();
            for (key, value) in &changed {
                props.insert(key.clone(), value.clone());
            }
        }
        self.emit_raw(PropertiesChanged {
            path: path.clone(),
            interface: interface.to_owned(),
            changed,
            invalidated,
        });
    }

    /// Emit a signal as-is; the stored object is left untouched.
    pub fn emit_raw(&self, signal: PropertiesChanged) {
        // No receivers simply means nobody is listening yet.
        let _ = self.inner.signals.send(SignalEvent::Changed(signal));
    }

    /// Emit a signal whose body fails to decode.
    pub fn emit_malformed(&self, reason: impl Into<String>) {
        let _ = self.inner.signals.send(SignalEvent::Malformed(reason.into()));
    }

    // ── Failure injection ────────────────────────────────────────────

    /// Make the next `n` `GetAll` requests fail.
    pub fn fail_next_get_all(&self, n: usize) {
        self.inner.fail_get_all.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` single-property `Get` requests fail.
    pub fn fail_next_get_property(&self, n: usize) {
        self.inner.fail_get_property.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` manager calls fail.
    pub fn fail_next_calls(&self, n: usize) {
        self.inner.fail_calls.store(n, Ordering::SeqCst);
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// Every manager call received so far, in order.
    pub fn calls(&self) -> Vec<ManagerCall> {
        lock(&self.inner.calls).clone()
    }

    /// Number of `GetAll` requests served or failed.
    pub fn get_all_count(&self) -> usize {
        self.inner.get_all_count.load(Ordering::SeqCst)
    }

    /// Whether the last Subscribe has not been matched by an Unsubscribe.
    pub fn is_subscribed(&self) -> bool {
        self.inner.subscribed.load(Ordering::SeqCst)
    }

    /// Number of open signal streams.
    pub fn signal_receivers(&self) -> usize {
        self.inner.signals.receiver_count()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Bus for MemoryBus {
    async fn get_all(&self, path: &ObjectPath, interface: &str) -> Result<PropertyMap, Error> {
        self.inner.get_all_count.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.inner.fail_get_all) {
            return Err(Error::MethodFailed {
                method: "GetAll",
                message: "injected failure".into(),
            });
        }
        let objects = lock(&self.inner.objects);
        let interfaces = objects.get(path).ok_or_else(|| Error::UnknownObject {
            path: path.to_string(),
        })?;
        interfaces
            .get(interface)
            .cloned()
            .ok_or_else(|| Error::UnknownInterface {
                path: path.to_string(),
                interface: interface.to_owned(),
            })
    }

    async fn get_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
    ) -> Result<Variant, Error> {
        if take_failure(&self.inner.fail_get_property) {
            return Err(Error::MethodFailed {
                method: "Get",
                message: "injected failure".into(),
            });
        }
        let objects = lock(&self.inner.objects);
        objects
            .get(path)
            .and_then(|interfaces| interfaces.get(interface))
            .and_then(|props| props.get(name))
            .cloned()
            .ok_or_else(|| Error::UnknownProperty {
                interface: interface.to_owned(),
                name: name.to_owned(),
            })
    }

    async fn signals(&self) -> Result<SignalStream, Error> {
        let stream = BroadcastStream::new(self.inner.signals.subscribe()).map(|item| match item {
            Ok(SignalEvent::Changed(signal)) => Ok(signal),
            Ok(SignalEvent::Malformed(reason)) => Err(Error::Malformed { reason }),
            Err(BroadcastStreamRecvError::Lagged(missed)) => Err(Error::Lagged { missed }),
        });
        Ok(Box::pin(stream))
    }

    async fn call(&self, call: ManagerCall) -> Result<ManagerReply, Error> {
        lock(&self.inner.calls).push(call.clone());
        if take_failure(&self.inner.fail_calls) {
            return Err(Error::MethodFailed {
                method: call.method(),
                message: "injected failure".into(),
            });
        }

        match call {
            ManagerCall::Subscribe => {
                self.inner.subscribed.store(true, Ordering::SeqCst);
                Ok(ManagerReply::Done)
            }
            ManagerCall::Unsubscribe => {
                self.inner.subscribed.store(false, Ordering::SeqCst);
                Ok(ManagerReply::Done)
            }
            ManagerCall::StartUnit { .. }
            | ManagerCall::StopUnit { .. }
            | ManagerCall::ReloadUnit { .. }
            | ManagerCall::RestartUnit { .. }
            | ManagerCall::TryRestartUnit { .. }
            | ManagerCall::ReloadOrRestartUnit { .. }
            | ManagerCall::ReloadOrTryRestartUnit { .. } => {
                let id = self.inner.jobs.fetch_add(1, Ordering::SeqCst) + 1;
                let job = ObjectPath::new(format!("{MANAGER_PATH}/job/{id}"))?;
                Ok(ManagerReply::Job(job))
            }
            ManagerCall::KillUnit { .. }
            | ManagerCall::ResetFailedUnit { .. }
            | ManagerCall::UnrefUnit { .. } => Ok(ManagerReply::Done),
            ManagerCall::GetUnit { name } => {
                let path = ObjectPath::for_unit(&name);
                if lock(&self.inner.objects).contains_key(&path) {
                    Ok(ManagerReply::Unit(path))
                } else {
                    Err(Error::MethodFailed {
                        method: "GetUnit",
                        message: format!("Unit {name} not loaded."),
                    })
                }
            }
            ManagerCall::LoadUnit { name } => Ok(ManagerReply::Unit(ObjectPath::for_unit(&name))),
        }
    }
}
