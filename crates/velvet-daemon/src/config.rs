//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use velvet_types::Address;

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Chain endpoints.
    #[serde(default)]
    pub chains: ChainsConfig,
    /// Sync intervals and batch tuning.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Admin identity and transaction queue settings.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Special (time-reward) token range.
    #[serde(default)]
    pub special: SpecialConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Chain endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainsConfig {
    /// Issuance chain JSON-RPC endpoint.
    #[serde(default = "default_issuance_endpoint")]
    pub issuance_endpoint: String,
    /// Rewards chain JSON-RPC endpoint.
    #[serde(default = "default_rewards_endpoint")]
    pub rewards_endpoint: String,
}

/// Sync service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Issuance event poll interval in seconds.
    #[serde(default = "default_event_poll")]
    pub event_poll_secs: u64,
    /// Rewards event poll interval in seconds.
    #[serde(default = "default_reward_poll")]
    pub reward_poll_secs: u64,
    /// Full owner reconciliation interval in seconds.
    #[serde(default = "default_owner_full")]
    pub owner_full_secs: u64,
    /// Incremental owner sync interval in seconds.
    #[serde(default = "default_owner_incremental")]
    pub owner_incremental_secs: u64,
    /// Earnings sync interval in seconds.
    #[serde(default = "default_earnings_interval")]
    pub earnings_secs: u64,
    /// Tokens per batched owner read.
    #[serde(default = "default_owner_batch")]
    pub owner_batch_size: usize,
    /// Tokens per batched earnings read.
    #[serde(default = "default_earnings_batch")]
    pub earnings_batch_size: usize,
    /// Rate-limiting delay between batched reads, in milliseconds.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Largest block range one listener tick scans.
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
}

/// Admin identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Administrative identity address. Empty = not configured; every
    /// admin operation is rejected immediately.
    #[serde(default)]
    pub admin_address: String,
    /// Pause between consecutive admin transactions, in seconds.
    #[serde(default = "default_inter_tx_delay")]
    pub inter_tx_delay_secs: u64,
    /// Confirmation wait budget per transaction, in seconds.
    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

/// Special token range configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialConfig {
    /// First token id of the time-reward range.
    #[serde(default = "default_special_start")]
    pub range_start: u64,
    /// Last token id of the time-reward range (inclusive).
    #[serde(default = "default_special_end")]
    pub range_end: u64,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_issuance_endpoint() -> String {
    "http://127.0.0.1:9545".to_string()
}

fn default_rewards_endpoint() -> String {
    "http://127.0.0.1:9645".to_string()
}

fn default_event_poll() -> u64 {
    15
}

fn default_reward_poll() -> u64 {
    20
}

fn default_owner_full() -> u64 {
    300
}

fn default_owner_incremental() -> u64 {
    30
}

fn default_earnings_interval() -> u64 {
    60
}

fn default_owner_batch() -> usize {
    20
}

fn default_earnings_batch() -> usize {
    100
}

fn default_batch_delay_ms() -> u64 {
    200
}

fn default_max_block_range() -> u64 {
    1_000
}

fn default_inter_tx_delay() -> u64 {
    2
}

fn default_confirm_timeout() -> u64 {
    180
}

fn default_special_start() -> u64 {
    1_000
}

fn default_special_end() -> u64 {
    1_199
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChainsConfig {
    fn default() -> Self {
        Self {
            issuance_endpoint: default_issuance_endpoint(),
            rewards_endpoint: default_rewards_endpoint(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_poll_secs: default_event_poll(),
            reward_poll_secs: default_reward_poll(),
            owner_full_secs: default_owner_full(),
            owner_incremental_secs: default_owner_incremental(),
            earnings_secs: default_earnings_interval(),
            owner_batch_size: default_owner_batch(),
            earnings_batch_size: default_earnings_batch(),
            batch_delay_ms: default_batch_delay_ms(),
            max_block_range: default_max_block_range(),
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            admin_address: String::new(),
            inter_tx_delay_secs: default_inter_tx_delay(),
            confirm_timeout_secs: default_confirm_timeout(),
        }
    }
}

impl Default for SpecialConfig {
    fn default() -> Self {
        Self {
            range_start: default_special_start(),
            range_end: default_special_end(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// The configured admin identity, if any.
    pub fn admin_address(&self) -> Option<Address> {
        if self.admin.admin_address.is_empty() {
            None
        } else {
            Some(Address::new(self.admin.admin_address.clone()))
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.advanced.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.advanced.data_dir)
        }
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("VELVET_DATA_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("VELVET_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Velvet")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".velvet")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/velvet"))
}
