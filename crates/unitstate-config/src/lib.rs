//! Shared configuration for unitstate tools.
//!
//! A TOML file in the platform config directory, overridden by
//! `UNITSTATE_*` environment variables, and translated into
//! `unitstate_core::ManagerConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use unitstate_core::{BusAddress, ManagerConfig, Mode};

/// Environment variable that points at an alternative config file.
pub const CONFIG_ENV: &str = "UNITSTATE_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<ConfigError> for unitstate_core::CoreError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Which bus hosts the systemd instance.
    #[serde(default)]
    pub bus: BusAddress,

    /// Defaults for CLI behaviour.
    #[serde(default)]
    pub defaults: Defaults,

    /// Manager tuning.
    #[serde(default)]
    pub manager: ManagerSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Manager call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Job mode for lifecycle verbs.
    #[serde(default)]
    pub mode: Mode,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            mode: Mode::default(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    25
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ManagerSettings {
    #[serde(default = "default_true")]
    pub auto_subscribe: bool,

    #[serde(default = "default_state_capacity")]
    pub state_channel_capacity: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            auto_subscribe: true,
            state_channel_capacity: default_state_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_state_capacity() -> usize {
    64
}

impl Config {
    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.timeout == 0 {
            return Err(invalid("defaults.timeout", "must be at least one second"));
        }
        if !matches!(self.defaults.output.as_str(), "table" | "json" | "plain") {
            return Err(invalid(
                "defaults.output",
                "expected one of table, json, plain",
            ));
        }
        if !matches!(self.defaults.color.as_str(), "auto" | "always" | "never") {
            return Err(invalid(
                "defaults.color",
                "expected one of auto, always, never",
            ));
        }
        if self.manager.state_channel_capacity == 0 {
            return Err(invalid("manager.state_channel_capacity", "must be positive"));
        }
        if let BusAddress::Address(address) = &self.bus {
            if address.trim().is_empty() {
                return Err(invalid("bus.address", "must not be empty"));
            }
        }
        Ok(())
    }

    /// Validate and translate into runtime manager settings.
    pub fn to_manager_config(&self) -> Result<ManagerConfig, ConfigError> {
        self.validate()?;
        Ok(ManagerConfig {
            bus: self.bus.clone(),
            call_timeout: Duration::from_secs(self.defaults.timeout),
            auto_subscribe: self.manager.auto_subscribe,
            state_channel_capacity: self.manager.state_channel_capacity,
        })
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `UNITSTATE_CONFIG` if set, otherwise the
/// XDG / platform location.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("org", "unitstate", "unitstate").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("unitstate");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Nested keys are separated by a double underscore, e.g.
/// `UNITSTATE_DEFAULTS__TIMEOUT=5` or `UNITSTATE_BUS__KIND=session`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UNITSTATE_").ignore(&["config"]).split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

/// Serialize config to TOML at `path`, creating parent directories.
pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    cfg.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
