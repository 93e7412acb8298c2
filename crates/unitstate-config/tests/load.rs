#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use unitstate_config::{Config, ConfigError, load_config_from, save_config_to};
use unitstate_core::{BusAddress, Mode};

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg, Config::default());
}

#[test]
fn file_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[bus]
kind = "address"
address = "unix:path=/run/user/1000/bus"

[defaults]
timeout = 5
mode = "ignore-dependencies"

[manager]
state_channel_capacity = 8
"#,
    )
    .unwrap();

    let cfg = load_config_from(&path).unwrap();
    assert_eq!(
        cfg.bus,
        BusAddress::Address("unix:path=/run/user/1000/bus".into())
    );
    assert_eq!(cfg.defaults.mode, Mode::IgnoreDependencies);
    assert_eq!(cfg.defaults.output, "table");

    let manager = cfg.to_manager_config().unwrap();
    assert_eq!(manager.call_timeout, Duration::from_secs(5));
    assert_eq!(manager.state_channel_capacity, 8);
    assert!(manager.auto_subscribe);
}

#[test]
fn session_bus_needs_no_address() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[bus]\nkind = \"session\"\n").unwrap();

    assert_eq!(load_config_from(&path).unwrap().bus, BusAddress::Session);
}

#[test]
fn invalid_values_fail_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[defaults]\noutput = \"xml\"\n").unwrap();

    let err = load_config_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Validation { .. }));
}

#[test]
fn malformed_toml_is_a_figment_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[defaults\ntimeout = ").unwrap();

    assert!(matches!(
        load_config_from(&path).unwrap_err(),
        ConfigError::Figment(_)
    ));
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut cfg = Config {
        bus: BusAddress::Session,
        ..Config::default()
    };
    cfg.defaults.timeout = 10;
    cfg.manager.auto_subscribe = false;

    save_config_to(&path, &cfg).unwrap();
    assert_eq!(load_config_from(&path).unwrap(), cfg);
}
