// ── State change dispatch ──
//
// Turns lifecycle-bearing change sets into `StateChange` events and fans
// them out. Every callback listener owns a queue and a task; the dispatcher
// itself only enqueues, so a callback may freely call back into its unit
// (including removing itself).

mod filter;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_core::Stream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use unitstate_api::ObjectPath;

use crate::error::CoreError;
use crate::model::StateTuple;
use crate::store::ChangeSet;

pub use filter::StateFilter;

/// One lifecycle transition of a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub unit: String,
    pub path: ObjectPath,
    /// The full change set that carried the transition.
    pub changes: ChangeSet,
    /// Cached tuple immediately before the change set was applied.
    pub previous: StateTuple,
    pub current: StateTuple,
}

/// Handle returned by [`StateDispatcher::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type Callback = dyn Fn(&StateChange) -> Result<(), CoreError> + Send + Sync;

struct ListenerEntry {
    id: ListenerId,
    queue: mpsc::UnboundedSender<Arc<StateChange>>,
    cancel: CancellationToken,
}

// ── Dispatcher ───────────────────────────────────────────────────────

/// Per-unit publisher of [`StateChange`]s.
pub struct StateDispatcher {
    unit: String,
    path: ObjectPath,
    listeners: ArcSwap<Vec<Arc<ListenerEntry>>>,
    next_id: AtomicU64,
    events: broadcast::Sender<Arc<StateChange>>,
    latest: watch::Sender<StateTuple>,
    failures: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl StateDispatcher {
    pub fn new(unit: impl Into<String>, path: ObjectPath, channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(channel_capacity.max(1));
        let (latest, _) = watch::channel(StateTuple::unknown());
        Self {
            unit: unit.into(),
            path,
            listeners: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
            events,
            latest,
            failures: Arc::new(AtomicU64::new(0)),
            cancel: CancellationToken::new(),
        }
    }

    /// Publish a change set that was just applied on top of `previous`.
    ///
    /// Returns `None` without notifying anyone when the set carries no
    /// lifecycle key.
    pub fn publish(&self, changes: &ChangeSet, previous: &StateTuple) -> Option<Arc<StateChange>> {
        if !changes.touches_lifecycle() {
            return None;
        }

        let current = previous.overlay(|key| changes.lifecycle_value(key));
        let change = Arc::new(StateChange {
            unit: self.unit.clone(),
            path: self.path.clone(),
            changes: changes.clone(),
            previous: previous.clone(),
            current: current.clone(),
        });
        trace!(unit = %self.unit, from = %previous, to = %current, "state change");

        self.latest.send_replace(current);
        // No subscribers is fine.
        let _ = self.events.send(Arc::clone(&change));

        for entry in self.listeners.load().iter() {
            if entry.cancel.is_cancelled() {
                continue;
            }
            // A closed queue means the task already exited.
            let _ = entry.queue.send(Arc::clone(&change));
        }
        Some(change)
    }

    /// Record a tuple observed outside the signal path (e.g. after a
    /// refresh). Updates `watch_state` only; listeners are not called.
    pub fn observe(&self, state: StateTuple) {
        self.latest.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Register a callback. It runs on its own task, never under a cache
    /// or registry lock. Errors and panics are logged and counted.
    ///
    /// Must be called from within a tokio runtime.
    pub fn add_listener<F>(&self, callback: F) -> Result<ListenerId, CoreError>
    where
        F: Fn(&StateChange) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| CoreError::ListenerFailure {
                message: format!("no async runtime to host the listener: {e}"),
            })?;

        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (queue, rx) = mpsc::unbounded_channel();
        let cancel = self.cancel.child_token();

        runtime.spawn(listener_task(
            self.unit.clone(),
            id,
            Arc::new(callback),
            rx,
            cancel.clone(),
            Arc::clone(&self.failures),
        ));

        let entry = Arc::new(ListenerEntry { id, queue, cancel });
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&entry));
            next
        });
        debug!(unit = %self.unit, listener = %id, "state listener added");
        Ok(id)
    }

    /// Unregister a listener. Safe to call from inside that listener's own
    /// callback; it will not be invoked again. Returns `false` if `id` was
    /// not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut removed = None;
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            removed = next
                .iter()
                .position(|entry| entry.id == id)
                .map(|pos| next.remove(pos));
            next
        });

        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                debug!(unit = %self.unit, listener = %id, "state listener removed");
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load().len()
    }

    /// Callbacks that returned an error or panicked so far.
    pub fn listener_failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    // ── Streams ──────────────────────────────────────────────────────

    pub fn subscribe_state(&self) -> StateStream {
        StateStream {
            receiver: self.events.subscribe(),
        }
    }

    /// The most recent tuple, updated on every publish and observation.
    pub fn watch_state(&self) -> watch::Receiver<StateTuple> {
        self.latest.subscribe()
    }
}

impl Drop for StateDispatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn listener_task(
    unit: String,
    id: ListenerId,
    callback: Arc<Callback>,
    mut rx: mpsc::UnboundedReceiver<Arc<StateChange>>,
    cancel: CancellationToken,
    failures: Arc<AtomicU64>,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            change = rx.recv() => {
                let Some(change) = change else { break };
                match std::panic::catch_unwind(AssertUnwindSafe(|| callback(&change))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        warn!(unit = %unit, listener = %id, error = %e, "state listener failed");
                    }
                    Err(_) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        warn!(unit = %unit, listener = %id, "state listener panicked");
                    }
                }
            }
        }
    }
    trace!(unit = %unit, listener = %id, "listener task finished");
}

// ── Stream wrappers ──────────────────────────────────────────────────

/// Broadcast subscription to a unit's state changes.
pub struct StateStream {
    receiver: broadcast::Receiver<Arc<StateChange>>,
}

impl StateStream {
    /// Next change; `None` once the unit is gone. Lag is logged and
    /// skipped.
    pub async fn recv(&mut self) -> Option<Arc<StateChange>> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "state stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Follow changes until one lands in a state matching `filter`.
    ///
    /// When `from` already matches, the unit must first be seen leaving
    /// the filter, so a job that cycles through its target (restart,
    /// reload) is not mistaken for finished. Only changes received on this
    /// stream count; open it before issuing the job.
    pub async fn wait_for_transition(
        &mut self,
        from: &StateTuple,
        filter: &StateFilter,
        timeout: Duration,
    ) -> Result<StateTuple, CoreError> {
        let follow = async {
            let mut left = !filter.matches(from);
            while let Some(change) = self.recv().await {
                if !filter.matches(&change.current) {
                    left = true;
                } else if left {
                    return Ok(change.current.clone());
                }
            }
            Err(CoreError::ManagerGone)
        };
        tokio::time::timeout(timeout, follow)
            .await
            .map_err(|_| CoreError::Timeout { timeout })?
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> StateChangeStream {
        StateChangeStream {
            inner: BroadcastStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter over a [`StateStream`].
pub struct StateChangeStream {
    inner: BroadcastStream<Arc<StateChange>>,
}

impl Stream for StateChangeStream {
    type Item = Arc<StateChange>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(change))) => return Poll::Ready(Some(change)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                    warn!(missed, "state stream lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
