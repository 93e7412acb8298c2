#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use unitstate_api::{
    Bus, Error, ManagerCall, ManagerReply, MemoryBus, ObjectPath, PropertyMap, SignalStream,
    Variant,
};
use unitstate_core::{CoreError, Manager, ManagerConfig, Mode};

/// Serves properties and signals from a `MemoryBus` but never answers
/// job-queueing calls.
struct StalledBus(MemoryBus);

#[async_trait]
impl Bus for StalledBus {
    async fn get_all(&self, path: &ObjectPath, interface: &str) -> Result<PropertyMap, Error> {
        self.0.get_all(path, interface).await
    }

    async fn get_property(
        &self,
        path: &ObjectPath,
        interface: &str,
        name: &str,
    ) -> Result<Variant, Error> {
        self.0.get_property(path, interface, name).await
    }

    async fn signals(&self) -> Result<SignalStream, Error> {
        self.0.signals().await
    }

    async fn call(&self, call: ManagerCall) -> Result<ManagerReply, Error> {
        match call {
            ManagerCall::Subscribe | ManagerCall::Unsubscribe => self.0.call(call).await,
            _ => std::future::pending().await,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_calls_time_out() {
    let config = ManagerConfig {
        call_timeout: Duration::from_secs(2),
        ..ManagerConfig::default()
    };
    let manager = Manager::new(Arc::new(StalledBus(MemoryBus::new())), config);
    let unit = manager.unit("foo.service").await.unwrap();

    let err = unit.start(Mode::Replace).await.unwrap_err();
    assert!(matches!(err, CoreError::Timeout { timeout } if timeout == Duration::from_secs(2)));
    assert!(err.to_string().contains("2000ms"));
}
