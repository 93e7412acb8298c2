// ── Signal subscription ──
//
// Per-unit switch for PropertiesChanged delivery, plus the delivery path
// itself: decode, fetch invalidated keys, apply to the cache, dispatch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{trace, warn};
use unitstate_api::PropertiesChanged;

use crate::error::CoreError;
use crate::store::{ChangeSet, PropertyCache};
use crate::stream::{StateChange, StateDispatcher};

/// Delivery counters, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Notifications applied to the cache.
    pub delivered: u64,
    /// Notifications rejected because they could not be decoded or an
    /// invalidated key could not be fetched.
    pub dropped: u64,
}

/// Whether a unit currently accepts change notifications.
pub struct SignalSubscription {
    active: AtomicBool,
    stats: watch::Sender<SubscriptionStats>,
}

impl Default for SignalSubscription {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSubscription {
    pub fn new() -> Self {
        let (stats, _) = watch::channel(SubscriptionStats::default());
        Self {
            active: AtomicBool::new(false),
            stats,
        }
    }

    /// Start accepting notifications. Returns `true` only for the call that
    /// actually switched delivery on.
    pub fn subscribe(&self) -> bool {
        !self.active.swap(true, Ordering::AcqRel)
    }

    /// Stop accepting notifications. Returns `true` only if delivery was on.
    /// A delivery already past the activity check may still complete.
    pub fn unsubscribe(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SubscriptionStats {
        *self.stats.borrow()
    }

    pub fn watch_stats(&self) -> watch::Receiver<SubscriptionStats> {
        self.stats.subscribe()
    }

    fn record(&self, f: impl FnOnce(&mut SubscriptionStats)) {
        self.stats.send_modify(f);
    }

    /// Route one notification addressed to this unit.
    ///
    /// The change set is decoded and completed (invalidated keys fetched)
    /// before anything touches the cache; on any failure the notification
    /// is dropped whole and the error returned. On success the set is
    /// applied and, if it carries a lifecycle key, published.
    pub async fn deliver(
        &self,
        signal: &PropertiesChanged,
        cache: &PropertyCache,
        dispatcher: &StateDispatcher,
    ) -> Result<Option<Arc<StateChange>>, CoreError> {
        if !self.is_active() {
            trace!(path = %signal.path, "notification after unsubscribe ignored");
            return Ok(None);
        }
        if !cache.has_interface(&signal.interface) {
            trace!(path = %signal.path, interface = %signal.interface, "notification for untracked interface");
            return Ok(None);
        }

        let gate = cache.write_gate().await;
        let changes = match self.complete(signal, cache).await {
            Ok(changes) => changes,
            Err(e) => {
                self.record(|s| s.dropped += 1);
                warn!(path = %signal.path, error = %e, "dropping undecodable notification");
                return Err(e);
            }
        };
        if changes.is_empty() {
            return Ok(None);
        }

        let previous = cache.apply_change_set(&changes);
        drop(gate);
        self.record(|s| s.delivered += 1);

        Ok(dispatcher.publish(&changes, &previous))
    }

    async fn complete(
        &self,
        signal: &PropertiesChanged,
        cache: &PropertyCache,
    ) -> Result<ChangeSet, CoreError> {
        let mut changes = ChangeSet::decode(&signal.changed)?;
        for key in &signal.invalidated {
            let value = cache.fetch(&signal.interface, key).await?;
            changes.insert(key.clone(), value);
        }
        changes.validate()?;
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_idempotent() {
        let sub = SignalSubscription::new();
        assert!(sub.subscribe());
        assert!(!sub.subscribe());
        assert!(sub.is_active());
    }

    #[test]
    fn unsubscribe_without_subscribe_is_safe() {
        let sub = SignalSubscription::new();
        assert!(!sub.unsubscribe());
        assert!(sub.subscribe());
        assert!(sub.unsubscribe());
        assert!(!sub.is_active());
    }
}
