//! Application config: JSON file helpers, env overrides, validation.

use crate::counter::CounterConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "BLISTER_CONFIG";
const APP_DIR: &str = "blister-monitor";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load a JSON config. A missing file yields `T::default()`; an unreadable
/// or unparsable one is an error.
pub fn load_json_config<T: DeserializeOwned + Default>(
    path: &Path,
    label: &str,
) -> Result<T, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let config = serde_json::from_str::<T>(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!("[{}] Loaded config from {}", label, path.display());
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(
                "[{}] No config file at {}, using defaults",
                label,
                path.display()
            );
            Ok(T::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn save_json_config<T: Serialize>(
    path: &Path,
    config: &T,
    label: &str,
) -> Result<(), ConfigError> {
    let io_err = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(io_err)?;
    tracing::info!("[{}] Saved config to {}", label, path.display());
    Ok(())
}

/// Pick the value of the environment variable named by `env_var` when it is
/// set and non-empty, else `value`.
pub fn resolve_env_override(value: &str, env_var: &Option<String>) -> String {
    if let Some(ref name) = env_var {
        if let Ok(from_env) = std::env::var(name) {
            if !from_env.is_empty() {
                return from_env;
            }
        }
    }
    value.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub counter: CounterConfig,
    #[serde(default = "default_broker_host")]
    pub broker_host: String,
    #[serde(default = "default_broker_port")]
    pub broker_port: u16,
    /// MQTT topic carrying blister events.
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Or read the database URL from this environment variable.
    #[serde(default = "default_database_url_env")]
    pub database_url_env: Option<String>,
    #[serde(default = "default_record_timeout_ms")]
    pub record_timeout_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Fixed seed for reproducible picks. `None` = OS entropy.
    #[serde(default)]
    pub random_seed: Option<u64>,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Insert the demo patient on startup.
    #[serde(default)]
    pub seed_demo: bool,
}

fn default_broker_host() -> String {
    "broker.emqx.io".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_channel() -> String {
    "medicalblister".to_string()
}

fn default_database_url() -> String {
    let path = default_app_dir().join("blister.db");
    format!("sqlite://{}", path.display())
}

fn default_database_url_env() -> Option<String> {
    Some("BLISTER_DATABASE_URL".to_string())
}

fn default_record_timeout_ms() -> u64 {
    5000
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_log_capacity() -> usize {
    crate::activity::DEFAULT_LOG_CAPACITY
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            counter: CounterConfig::default(),
            broker_host: default_broker_host(),
            broker_port: default_broker_port(),
            channel: default_channel(),
            database_url: default_database_url(),
            database_url_env: default_database_url_env(),
            record_timeout_ms: default_record_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            random_seed: None,
            log_capacity: default_log_capacity(),
            seed_demo: false,
        }
    }
}

impl AppConfig {
    /// Load from `path`, writing the defaults there first if the file does
    /// not exist yet, then validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let existed = path.exists();
        let config: AppConfig = load_json_config(path, "Config")?;
        if !existed {
            if let Err(e) = save_json_config(path, &config, "Config") {
                tracing::warn!("[Config] Could not write default config: {}", e);
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.counter.validate()?;
        if self.broker_host.trim().is_empty() {
            return Err(ConfigError::Invalid("broker_host is empty".to_string()));
        }
        if self.channel.trim().is_empty() {
            return Err(ConfigError::Invalid("channel is empty".to_string()));
        }
        if self.resolve_database_url().trim().is_empty() {
            return Err(ConfigError::Invalid("database_url is empty".to_string()));
        }
        if self.record_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "record_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn resolve_database_url(&self) -> String {
        resolve_env_override(&self.database_url, &self.database_url_env)
    }

    pub fn record_timeout(&self) -> Duration {
        Duration::from_millis(self.record_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

pub fn default_app_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Config path: explicit argument, then `BLISTER_CONFIG`, then the app data
/// directory.
pub fn resolve_config_path(arg: Option<String>) -> PathBuf {
    if let Some(path) = arg.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => default_app_dir().join("config.json"),
    }
}
