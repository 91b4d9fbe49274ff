//! Configuration for prospect-together components

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Allowed range for the periodic save interval, in minutes.
pub const SAVE_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 1..=60;

/// Global configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub sharing: SharingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where and how often prospecting data is persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the snapshot files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Minutes between periodic saves
    #[serde(default = "default_save_interval")]
    pub save_interval_minutes: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./prospect-data")
}
fn default_save_interval() -> u64 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            save_interval_minutes: default_save_interval(),
        }
    }
}

/// Snapshot file kept by the authoritative server
pub const SERVER_DATA_FILE: &str = "prospectTogetherServer.json";
/// Snapshot file kept by a client
pub const CLIENT_DATA_FILE: &str = "prospectTogetherClient.json";
/// Predecessor of the client file, adopted when the client file is missing
pub const LEGACY_CLIENT_DATA_FILE: &str = "vsprospectorinfo.data.json";

impl StorageConfig {
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_minutes * 60)
    }

    pub fn server_file(&self) -> PathBuf {
        self.data_dir.join(SERVER_DATA_FILE)
    }

    pub fn client_file(&self) -> PathBuf {
        self.data_dir.join(CLIENT_DATA_FILE)
    }

    pub fn legacy_client_file(&self) -> PathBuf {
        self.data_dir.join(LEGACY_CLIENT_DATA_FILE)
    }
}

/// Opt-ins controlling what gets shared
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Re-send our own discoveries to the server for fan-out
    #[serde(default = "default_auto_share")]
    pub auto_share: bool,

    /// Decode prospecting payloads other players post in chat
    #[serde(default)]
    pub accept_chat_sharing: bool,
}

fn default_auto_share() -> bool {
    true
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            auto_share: default_auto_share(),
            accept_chat_sharing: false,
        }
    }
}

/// Sync channel server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the sync channel
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7420))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the optional TOML file, then
    /// `PROSPECT_*` environment variables (`PROSPECT_SHARING__AUTO_SHARE=false`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config: Config = builder
            .add_source(
                config::Environment::with_prefix("PROSPECT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_save_interval(self.storage.save_interval_minutes)
    }
}

pub fn validate_save_interval(minutes: u64) -> Result<()> {
    if !SAVE_INTERVAL_RANGE.contains(&minutes) {
        return Err(Error::InvalidConfig(format!(
            "save_interval_minutes must be within {}..={}, got {}",
            SAVE_INTERVAL_RANGE.start(),
            SAVE_INTERVAL_RANGE.end(),
            minutes
        )));
    }
    Ok(())
}

/// Live sharing toggles, flippable while running.
#[derive(Debug, Default)]
pub struct SharingSettings {
    auto_share: AtomicBool,
    accept_chat_sharing: AtomicBool,
}

impl SharingSettings {
    pub fn new(auto_share: bool, accept_chat_sharing: bool) -> Self {
        Self {
            auto_share: AtomicBool::new(auto_share),
            accept_chat_sharing: AtomicBool::new(accept_chat_sharing),
        }
    }

    pub fn auto_share(&self) -> bool {
        self.auto_share.load(Ordering::Relaxed)
    }

    pub fn set_auto_share(&self, enabled: bool) {
        self.auto_share.store(enabled, Ordering::Relaxed);
    }

    pub fn accept_chat_sharing(&self) -> bool {
        self.accept_chat_sharing.load(Ordering::Relaxed)
    }

    pub fn set_accept_chat_sharing(&self, enabled: bool) {
        self.accept_chat_sharing.store(enabled, Ordering::Relaxed);
    }
}

impl From<&SharingConfig> for SharingSettings {
    fn from(config: &SharingConfig) -> Self {
        SharingSettings::new(config.auto_share, config.accept_chat_sharing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.storage.save_interval_minutes, 5);
        assert!(config.sharing.auto_share);
        assert!(!config.sharing.accept_chat_sharing);
        assert_eq!(config.storage.save_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prospect.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "log_level = \"debug\"\n[storage]\nsave_interval_minutes = 1\n[sharing]\naccept_chat_sharing = true\n[server]\nbind_addr = \"0.0.0.0:9000\""
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.storage.save_interval_minutes, 1);
        assert!(config.sharing.accept_chat_sharing);
        assert!(config.sharing.auto_share);
        assert_eq!(config.server.bind_addr.port(), 9000);
    }

    #[test]
    fn test_save_interval_bounds() {
        assert!(validate_save_interval(0).is_err());
        assert!(validate_save_interval(1).is_ok());
        assert!(validate_save_interval(60).is_ok());
        assert!(validate_save_interval(61).is_err());
    }

    #[test]
    fn test_sharing_settings_toggle() {
        let settings = SharingSettings::from(&SharingConfig::default());
        assert!(settings.auto_share());
        settings.set_auto_share(false);
        assert!(!settings.auto_share());
        settings.set_accept_chat_sharing(true);
        assert!(settings.accept_chat_sharing());
    }
}
