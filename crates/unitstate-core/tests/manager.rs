#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use pretty_assertions::assert_eq;
use unitstate_api::{
    Bus, ManagerCall, MemoryBus, ObjectPath, PropertiesChanged, PropertyMap, UNIT_INTERFACE, Variant,
};
use unitstate_core::convert::decode_property;
use unitstate_core::{
    CoreError, Manager, ManagerConfig, Mode, StateFilter, StateTuple, Unit, UnitKind, ValueKind,
    Who,
};

// ── Fixtures ────────────────────────────────────────────────────────

fn props(pairs: &[(&str, Variant)]) -> PropertyMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

fn lifecycle(load: &str, active: &str, sub: &str) -> PropertyMap {
    props(&[
        ("LoadState", Variant::from(load)),
        ("ActiveState", Variant::from(active)),
        ("SubState", Variant::from(sub)),
        ("Description", Variant::from("Foo daemon")),
    ])
}

fn install(bus: &MemoryBus, name: &str) -> ObjectPath {
    let path = bus.insert_unit(name, UNIT_INTERFACE, lifecycle("loaded", "active", "running"));
    bus.insert_object(&path, UnitKind::Service.interface(), props(&[("MainPID", Variant::UInt32(42))]));
    path
}

fn manager(bus: &MemoryBus) -> Manager {
    Manager::new(Arc::new(bus.clone()), ManagerConfig::default())
}

async fn setup() -> (MemoryBus, Manager, Arc<Unit>, ObjectPath) {
    let bus = MemoryBus::new();
    let path = install(&bus, "foo.service");
    let manager = manager(&bus);
    let unit = manager.get_or_create(UnitKind::Service, "foo").await.unwrap();
    (bus, manager, unit, path)
}

/// Wait until the unit has processed `n` notifications, applied or dropped.
async fn processed(unit: &Unit, n: u64) {
    let mut stats = unit.subscription().watch_stats();
    tokio::time::timeout(
        Duration::from_secs(5),
        stats.wait_for(|s| s.delivered + s.dropped >= n),
    )
    .await
    .unwrap()
    .unwrap();
}

fn subscribe_calls(bus: &MemoryBus) -> usize {
    bus.calls()
        .iter()
        .filter(|call| matches!(call, ManagerCall::Subscribe))
        .count()
}

// ── Registry ────────────────────────────────────────────────────────

#[tokio::test]
async fn one_instance_per_normalized_name() {
    let (_bus, manager, unit, path) = setup().await;

    let again = manager.get_or_create(UnitKind::Service, "foo.service").await.unwrap();
    let parsed = manager.unit("foo.service").await.unwrap();

    assert!(Arc::ptr_eq(&unit, &again));
    assert!(Arc::ptr_eq(&unit, &parsed));
    assert_eq!(manager.len(), 1);
    assert_eq!(unit.path(), &path);
    assert!(Arc::ptr_eq(&manager.unit_for_path(&path).unwrap(), &unit));
}

#[tokio::test]
async fn bare_and_suffixed_names_resolve_alike() {
    let (bus, manager, unit, _path) = setup().await;

    let bare = manager.get(UnitKind::Service, "foo").unwrap();
    let full = manager.get(UnitKind::Service, "foo.service").unwrap();
    assert!(Arc::ptr_eq(&bare, &unit));
    assert!(Arc::ptr_eq(&full, &unit));
    assert!(manager.get(UnitKind::Socket, "foo").is_none());
    assert!(manager.get(UnitKind::Service, "").is_none());

    let removed = manager.remove(UnitKind::Service, "foo").await.unwrap();
    assert!(Arc::ptr_eq(&removed, &unit));
    assert!(manager.get(UnitKind::Service, "foo.service").is_none());
    assert!(manager.remove(UnitKind::Service, "foo.service").await.is_none());
    assert!(!bus.is_subscribed());
}

#[tokio::test]
async fn units_are_listed_by_name() {
    let bus = MemoryBus::new();
    let manager = manager(&bus);
    manager.get_or_create(UnitKind::Socket, "sshd").await.unwrap();
    manager.get_or_create(UnitKind::Service, "cron").await.unwrap();

    let names: Vec<String> = manager.units().iter().map(|u| u.name().to_owned()).collect();
    assert_eq!(names, ["cron.service", "sshd.socket"]);
}

#[tokio::test]
async fn invalid_names_are_rejected() {
    let bus = MemoryBus::new();
    let manager = manager(&bus);

    let err = manager.get_or_create(UnitKind::Service, "").await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidName { .. }));
    assert!(manager.is_empty());
}

#[tokio::test]
async fn removal_releases_the_subscription() {
    let (bus, manager, unit, _path) = setup().await;
    assert!(bus.is_subscribed());

    let removed = manager.remove(UnitKind::Service, "foo").await.unwrap();
    assert!(Arc::ptr_eq(&removed, &unit));
    assert!(!unit.is_subscribed());
    assert!(!bus.is_subscribed());
    assert!(manager.get(UnitKind::Service, "foo.service").is_none());
}

// ── Subscription ────────────────────────────────────────────────────

#[tokio::test]
async fn subscribe_is_idempotent() {
    let (bus, manager, unit, path) = setup().await;
    unit.subscribe().await.unwrap();
    unit.subscribe().await.unwrap();
    manager.get_or_create(UnitKind::Service, "foo").await.unwrap();

    assert_eq!(subscribe_calls(&bus), 1);
    assert_eq!(manager.active_subscriptions().await, 1);

    let mut stream = unit.subscribe_state();
    bus.emit_changed(&path, UNIT_INTERFACE, props(&[("SubState", Variant::from("reloading"))]), vec![]);

    let change = stream.recv().await.unwrap();
    assert_eq!(change.current.sub_state(), "reloading");
    let duplicate = tokio::time::timeout(Duration::from_millis(50), stream.recv()).await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn last_unsubscribe_turns_events_off() {
    let bus = MemoryBus::new();
    install(&bus, "a.service");
    install(&bus, "b.service");
    let manager = manager(&bus);
    let a = manager.unit("a.service").await.unwrap();
    let b = manager.unit("b.service").await.unwrap();
    assert_eq!(subscribe_calls(&bus), 1);

    a.unsubscribe().await.unwrap();
    assert!(bus.is_subscribed());
    b.unsubscribe().await.unwrap();
    b.unsubscribe().await.unwrap();
    assert!(!bus.is_subscribed());
    assert_eq!(manager.active_subscriptions().await, 0);
}

#[tokio::test]
async fn failed_subscribe_can_be_retried() {
    let bus = MemoryBus::new();
    install(&bus, "foo.service");
    let manager = manager(&bus);

    bus.fail_next_calls(1);
    let err = manager.unit("foo.service").await.unwrap_err();
    assert!(err.is_transport());

    let unit = manager.get(UnitKind::Service, "foo.service").unwrap();
    assert!(!unit.is_subscribed());

    manager.unit("foo.service").await.unwrap();
    assert!(unit.is_subscribed());
    assert!(bus.is_subscribed());
}

#[tokio::test]
async fn notifications_after_unsubscribe_are_ignored() {
    let bus = MemoryBus::new();
    let path = install(&bus, "foo.service");
    let config = ManagerConfig {
        auto_subscribe: false,
        ..ManagerConfig::default()
    };
    let manager = Manager::new(Arc::new(bus.clone()), config);
    let foo = manager.unit("foo.service").await.unwrap();
    install(&bus, "bar.service");
    let bar = manager.unit("bar.service").await.unwrap();
    bar.subscribe().await.unwrap();
    assert!(!foo.is_subscribed());

    bus.emit_changed(&path, UNIT_INTERFACE, props(&[("SubState", Variant::from("dead"))]), vec![]);
    let bar_path = bar.path().clone();
    bus.emit_changed(&bar_path, UNIT_INTERFACE, props(&[("SubState", Variant::from("dead"))]), vec![]);
    processed(&bar, 1).await;

    assert_eq!(foo.subscription().stats().delivered, 0);
    assert!(foo.cache().is_empty());
}

// ── Change delivery ─────────────────────────────────────────────────

#[tokio::test]
async fn partial_change_keeps_cached_members() {
    let (bus, _manager, unit, path) = setup().await;
    assert_eq!(unit.state().await.unwrap(), StateTuple::new("loaded", "active", "running"));

    let mut stream = unit.subscribe_state();
    bus.emit_changed(
        &path,
        UNIT_INTERFACE,
        props(&[("ActiveState", Variant::from("deactivating"))]),
        vec![],
    );

    let change = stream.recv().await.unwrap();
    assert_eq!(change.previous, StateTuple::new("loaded", "active", "running"));
    assert_eq!(change.current, StateTuple::new("loaded", "deactivating", "running"));
    assert_eq!(change.unit, "foo.service");
    assert_eq!(unit.cached_state(), change.current);
}

#[tokio::test]
async fn undecodable_change_set_is_dropped_whole() {
    let (bus, _manager, unit, path) = setup().await;
    unit.state().await.unwrap();
    let before = unit.cache().snapshot();

    bus.emit_raw(PropertiesChanged {
        path: path.clone(),
        interface: UNIT_INTERFACE.to_owned(),
        changed: props(&[
            ("SubState", Variant::from("dead")),
            (
                "Names",
                Variant::Array {
                    element: "s".into(),
                    items: vec![Variant::Int32(1)],
                },
            ),
        ]),
        invalidated: vec![],
    });
    processed(&unit, 1).await;

    assert_eq!(unit.subscription().stats().dropped, 1);
    assert_eq!(unit.cache().snapshot(), before);
    assert_eq!(unit.cached_state().sub_state(), "running");
}

#[tokio::test]
async fn non_string_lifecycle_value_is_rejected() {
    let (bus, _manager, unit, path) = setup().await;
    unit.state().await.unwrap();

    bus.emit_raw(PropertiesChanged {
        path,
        interface: UNIT_INTERFACE.to_owned(),
        changed: props(&[("ActiveState", Variant::Bool(true))]),
        invalidated: vec![],
    });
    processed(&unit, 1).await;

    assert_eq!(unit.subscription().stats().dropped, 1);
    assert_eq!(unit.cached_state().active_state(), "active");
}

#[tokio::test]
async fn non_lifecycle_change_updates_cache_silently() {
    let (bus, _manager, unit, path) = setup().await;
    unit.state().await.unwrap();
    let mut stream = unit.subscribe_state();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    unit.add_listener(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    bus.emit_changed(&path, UNIT_INTERFACE, props(&[("Description", Variant::from("renamed"))]), vec![]);
    processed(&unit, 1).await;

    assert_eq!(unit.description().await.unwrap(), "renamed");
    let spurious = tokio::time::timeout(Duration::from_millis(50), stream.recv()).await;
    assert!(spurious.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(unit.dispatcher().listener_failures(), 0);
}

#[tokio::test]
async fn invalidated_keys_are_fetched() {
    let (bus, _manager, unit, path) = setup().await;
    unit.state().await.unwrap();

    bus.set_property(&path, UNIT_INTERFACE, "SubState", Variant::from("stop-sigterm"));
    bus.emit_raw(PropertiesChanged {
        path,
        interface: UNIT_INTERFACE.to_owned(),
        changed: props(&[("ActiveState", Variant::from("deactivating"))]),
        invalidated: vec!["SubState".into()],
    });
    processed(&unit, 1).await;

    assert_eq!(
        unit.cached_state(),
        StateTuple::new("loaded", "deactivating", "stop-sigterm")
    );
}

#[tokio::test]
async fn failed_fetch_of_invalidated_key_drops_the_notification() {
    let (bus, _manager, unit, path) = setup().await;
    unit.state().await.unwrap();
    let before = unit.cache().snapshot();
    let mut stream = unit.subscribe_state();

    bus.set_property(&path, UNIT_INTERFACE, "SubState", Variant::from("stop-sigterm"));
    bus.fail_next_get_property(1);
    bus.emit_raw(PropertiesChanged {
        path,
        interface: UNIT_INTERFACE.to_owned(),
        changed: props(&[("ActiveState", Variant::from("deactivating"))]),
        invalidated: vec!["SubState".into()],
    });
    processed(&unit, 1).await;

    let stats = unit.subscription().stats();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.delivered, 0);
    assert_eq!(unit.cache().snapshot(), before);
    assert_eq!(unit.cached_state(), StateTuple::new("loaded", "active", "running"));
    let change = tokio::time::timeout(Duration::from_millis(50), stream.recv()).await;
    assert!(change.is_err());
}

#[tokio::test]
async fn unreadable_signals_do_not_stop_the_pump() {
    let (bus, _manager, unit, path) = setup().await;

    bus.emit_malformed("truncated body");
    bus.emit_changed(&path, UNIT_INTERFACE, props(&[("SubState", Variant::from("dead"))]), vec![]);
    processed(&unit, 1).await;

    assert_eq!(unit.subscription().stats().delivered, 1);
}

#[tokio::test]
async fn other_interfaces_and_objects_are_ignored() {
    let (bus, _manager, unit, path) = setup().await;

    bus.emit_changed(&path, "org.example.Other", props(&[("SubState", Variant::from("x"))]), vec![]);
    let stranger = ObjectPath::for_unit("bar.service");
    bus.emit_changed(&stranger, UNIT_INTERFACE, props(&[("SubState", Variant::from("x"))]), vec![]);
    bus.emit_changed(&path, UnitKind::Service.interface(), props(&[("MainPID", Variant::UInt32(7))]), vec![]);
    processed(&unit, 1).await;

    assert_eq!(unit.subscription().stats().delivered, 1);
    assert_eq!(unit.main_pid().await.unwrap(), 7);
}

// ── Listeners ───────────────────────────────────────────────────────

#[tokio::test]
async fn listener_can_remove_itself() {
    let (bus, _manager, unit, path) = setup().await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let calls = Arc::new(AtomicUsize::new(0));
    let id = Arc::new(OnceLock::new());

    let weak = Arc::downgrade(&unit);
    let listener_id = Arc::clone(&id);
    let counter = Arc::clone(&calls);
    let registered = unit
        .add_listener(move |change| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let (Some(unit), Some(id)) = (weak.upgrade(), listener_id.get()) {
                unit.remove_listener(*id);
            }
            tx.send(change.current.clone()).unwrap();
            Ok(())
        })
        .unwrap();
    id.set(registered).unwrap();

    bus.emit_changed(&path, UNIT_INTERFACE, props(&[("SubState", Variant::from("dead"))]), vec![]);
    bus.emit_changed(&path, UNIT_INTERFACE, props(&[("SubState", Variant::from("running"))]), vec![]);
    processed(&unit, 2).await;

    let first = rx.recv().await.unwrap();
    assert_eq!(first.sub_state(), "dead");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(unit.dispatcher().listener_count(), 0);
    assert!(!unit.remove_listener(registered));
}

#[tokio::test]
async fn failing_listener_does_not_starve_others() {
    let (bus, _manager, unit, path) = setup().await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    unit.add_listener(|_| {
        Err(CoreError::ListenerFailure {
            message: "boom".into(),
        })
    })
    .unwrap();
    unit.add_listener(move |change| {
        tx.send(change.current.active_state().to_owned()).unwrap();
        Ok(())
    })
    .unwrap();

    bus.emit_changed(&path, UNIT_INTERFACE, props(&[("ActiveState", Variant::from("failed"))]), vec![]);

    assert_eq!(rx.recv().await.unwrap(), "failed");
    tokio::time::timeout(Duration::from_secs(5), async {
        while unit.dispatcher().listener_failures() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn listener_keeps_up_with_a_burst() {
    let (bus, _manager, unit, path) = setup().await;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    unit.add_listener(move |change| {
        tx.send(change.current.sub_state().to_owned()).unwrap();
        Ok(())
    })
    .unwrap();

    let states: Vec<String> = (0..64).map(|i| format!("step-{i}")).collect();
    for state in &states {
        bus.emit_changed(&path, UNIT_INTERFACE, props(&[("SubState", Variant::from(state.as_str()))]), vec![]);
    }
    processed(&unit, 64).await;

    let mut seen = Vec::new();
    while seen.len() < states.len() {
        let next = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        seen.push(next.unwrap());
    }
    assert_eq!(seen, states);
}

// ── Waiting ─────────────────────────────────────────────────────────

#[tokio::test]
async fn wait_for_returns_once_the_filter_matches() {
    let (bus, _manager, unit, path) = setup().await;
    unit.state().await.unwrap();

    let waiter = {
        let unit = Arc::clone(&unit);
        tokio::spawn(async move { unit.wait_for(StateFilter::Failed, Duration::from_secs(5)).await })
    };
    tokio::task::yield_now().await;
    bus.emit_changed(
        &path,
        UNIT_INTERFACE,
        props(&[("ActiveState", Variant::from("failed")), ("SubState", Variant::from("failed"))]),
        vec![],
    );

    let state = waiter.await.unwrap().unwrap();
    assert_eq!(state, StateTuple::new("loaded", "failed", "failed"));
}

#[tokio::test]
async fn wait_for_short_circuits_on_current_state() {
    let (_bus, _manager, unit, _path) = setup().await;
    let state = unit
        .wait_for(StateFilter::Active, Duration::from_millis(10))
        .await
        .unwrap();
    assert_eq!(state.active_state(), "active");
}

#[tokio::test(start_paused = true)]
async fn wait_for_times_out() {
    let (_bus, _manager, unit, _path) = setup().await;
    let err = unit
        .wait_for(StateFilter::Inactive, Duration::from_secs(3))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Timeout { timeout } if timeout == Duration::from_secs(3)));
}

#[tokio::test(start_paused = true)]
async fn restart_is_not_finished_by_the_state_it_started_in() {
    let (_bus, _manager, unit, _path) = setup().await;
    let mut stream = unit.subscribe_state();
    let before = unit.state().await.unwrap();
    assert_eq!(before.active_state(), "active");

    unit.restart(Mode::Replace).await.unwrap();
    let err = stream
        .wait_for_transition(&before, &StateFilter::Active, Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Timeout { .. }));
}

#[tokio::test]
async fn restart_wait_follows_the_unit_back_up() {
    let (bus, _manager, unit, path) = setup().await;
    let mut stream = unit.subscribe_state();
    let before = unit.state().await.unwrap();

    unit.restart(Mode::Replace).await.unwrap();
    for (active, sub) in [("deactivating", "stop-sigterm"), ("activating", "start"), ("active", "running")] {
        bus.emit_changed(
            &path,
            UNIT_INTERFACE,
            props(&[("ActiveState", Variant::from(active)), ("SubState", Variant::from(sub))]),
            vec![],
        );
    }

    let state = stream
        .wait_for_transition(&before, &StateFilter::Active, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(state, StateTuple::new("loaded", "active", "running"));
}

// ── Properties ──────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_round_trip() {
    let (bus, _manager, unit, path) = setup().await;
    assert_eq!(unit.description().await.unwrap(), "Foo daemon");
    assert_eq!(unit.main_pid().await.unwrap(), 42);

    bus.set_property(&path, UNIT_INTERFACE, "ActiveState", Variant::from("inactive"));
    bus.set_property(&path, UNIT_INTERFACE, "SubState", Variant::from("dead"));
    assert_eq!(unit.cached_state().active_state(), "active");

    unit.refresh_all().await.unwrap();
    assert_eq!(unit.cached_state(), StateTuple::new("loaded", "inactive", "dead"));
    assert_eq!(*unit.watch_state().borrow(), StateTuple::new("loaded", "inactive", "dead"));
}

#[tokio::test]
async fn every_fetched_key_reads_back_with_its_type() {
    let (bus, _manager, unit, path) = setup().await;
    bus.set_property(&path, UNIT_INTERFACE, "Names", Variant::strings(["foo.service", "foo-alias.service"]));
    bus.set_property(&path, UNIT_INTERFACE, "CanStart", Variant::Bool(true));
    bus.set_property(&path, UNIT_INTERFACE, "InactiveExitTimestamp", Variant::UInt64(1_700_000_000_000_000));
    bus.set_property(&path, UNIT_INTERFACE, "Extra", Variant::boxed(Variant::from("opaque")));
    unit.refresh_all().await.unwrap();

    for interface in [UNIT_INTERFACE, UnitKind::Service.interface()] {
        let raw = bus.get_all(&path, interface).await.unwrap();
        for (key, value) in &raw {
            let expected = decode_property(key, value).unwrap();
            assert_eq!(unit.get_value(key).await.unwrap(), expected, "{key}");
        }
    }
    assert_eq!(unit.names().await.unwrap(), ["foo.service", "foo-alias.service"]);
    assert!(unit.can_start().await.unwrap());
    assert!(unit.inactive_exit_timestamp().await.unwrap().is_some());
    assert_eq!(unit.get_value("Extra").await.unwrap().kind(), ValueKind::Variant);
    assert_eq!(unit.get::<String>("Extra").await.unwrap(), "opaque");
}

#[tokio::test]
async fn failed_refresh_keeps_previous_contents() {
    let (bus, _manager, unit, _path) = setup().await;
    unit.state().await.unwrap();

    bus.fail_next_get_all(1);
    assert!(unit.refresh_all().await.unwrap_err().is_transport());
    assert_eq!(unit.cached_state().active_state(), "active");
}

// ── Manager verbs ───────────────────────────────────────────────────

#[tokio::test]
async fn verbs_issue_manager_calls() {
    let (bus, _manager, unit, _path) = setup().await;

    let job = unit.restart(Mode::Fail).await.unwrap();
    assert!(job.as_str().starts_with("/org/freedesktop/systemd1/job/"));
    unit.kill(Who::Main, 15).await.unwrap();
    unit.reset_failed().await.unwrap();

    let calls: Vec<ManagerCall> = bus
        .calls()
        .into_iter()
        .filter(|call| !matches!(call, ManagerCall::Subscribe))
        .collect();
    assert_eq!(
        calls,
        vec![
            ManagerCall::RestartUnit {
                name: "foo.service".into(),
                mode: "fail".into(),
            },
            ManagerCall::KillUnit {
                name: "foo.service".into(),
                who: "main".into(),
                signal: 15,
            },
            ManagerCall::ResetFailedUnit {
                name: "foo.service".into(),
            },
        ]
    );
}

#[tokio::test]
async fn get_unit_reports_missing_units() {
    let (_bus, manager, _unit, path) = setup().await;

    assert_eq!(manager.get_unit("foo.service").await.unwrap(), path);
    let err = manager.get_unit("missing.service").await.unwrap_err();
    assert!(err.to_string().contains("not loaded"));
    assert_eq!(
        manager.load_unit("missing.service").await.unwrap(),
        ObjectPath::for_unit("missing.service")
    );
}

#[tokio::test]
async fn dropped_manager_fails_unit_verbs() {
    let (_bus, manager, unit, _path) = setup().await;
    drop(manager);

    assert!(unit.manager().is_none());
    let err = unit.start(Mode::Replace).await.unwrap_err();
    assert!(matches!(err, CoreError::ManagerGone));
    // Cached reads keep working.
    assert_eq!(unit.cached_state().active_state(), "unknown");
}

#[tokio::test]
async fn shutdown_releases_everything() {
    let (bus, manager, unit, _path) = setup().await;
    manager.shutdown().await;

    assert!(!bus.is_subscribed());
    assert!(!unit.is_subscribed());
    let err = manager.unit("bar.service").await.unwrap_err();
    assert!(matches!(err, CoreError::ManagerGone));
}
