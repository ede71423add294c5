//! Engine configuration: TOML file, then environment overrides
//!
//! Env overrides: SMARTLOCK_ISSUER_URL, SMARTLOCK_ROOM.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smartlock_proto::ble::DEFAULT_SERVICE_UUID;
use smartlock_proto::framer::DEFAULT_MAX_MESSAGE_BYTES;

pub const ENV_ISSUER_URL: &str = "SMARTLOCK_ISSUER_URL";
pub const ENV_ROOM: &str = "SMARTLOCK_ROOM";
pub const ENV_HOME: &str = "SMARTLOCK_HOME";

/// Lock engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Base URL of the key issuer
    pub issuer_url: String,
    /// Room this lock guards; selects the key at the issuer
    pub room: String,
    pub provisioning_timeout_secs: u64,
    /// Interval between `ping` notifications while connected
    pub ping_interval_ms: u64,
    /// How long a status banner stays up
    pub banner_ms: u64,
    /// Delay between a disconnect and resuming advertising
    pub advertising_resume_delay_ms: u64,
    /// Largest partial message the framer buffers
    pub max_message_bytes: usize,
    pub service_uuid: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            issuer_url: "http://127.0.0.1:8081".to_string(),
            room: "101".to_string(),
            provisioning_timeout_secs: 10,
            ping_interval_ms: 2000,
            banner_ms: 2000,
            advertising_resume_delay_ms: 500,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            service_uuid: DEFAULT_SERVICE_UUID.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn provisioning_timeout(&self) -> Duration {
        Duration::from_secs(self.provisioning_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn banner_duration(&self) -> Duration {
        Duration::from_millis(self.banner_ms)
    }

    pub fn advertising_resume_delay(&self) -> Duration {
        Duration::from_millis(self.advertising_resume_delay_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load config: defaults or the given file, then env vars
pub fn load(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut config = match path {
        Some(path) => from_file(path)?,
        None => EngineConfig::default(),
    };
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

pub fn from_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply overrides looked up through `var`
pub fn apply_overrides(config: &mut EngineConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(url) = var(ENV_ISSUER_URL).filter(|v| !v.is_empty()) {
        config.issuer_url = url;
    }
    if let Some(room) = var(ENV_ROOM).filter(|v| !v.is_empty()) {
        config.room = room;
    }
}

/// Storage directory: SMARTLOCK_HOME, else ~/.smartlock
pub fn smartlock_home() -> Option<PathBuf> {
    match std::env::var_os(ENV_HOME) {
        Some(home) => Some(PathBuf::from(home)),
        None => dirs::home_dir().map(|home| home.join(".smartlock")),
    }
}
