use crate::core::error::Error;
use crate::cosmos::client::CosmosClientConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "IBC_SCAN_CONFIG";
/// Environment variable overriding `chain.rpc_url`.
pub const RPC_URL_ENV: &str = "IBC_SCAN_RPC_URL";

/// Which record survives when the same packet key is seen twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    KeepFirst,
    #[default]
    KeepLast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointMode {
    /// Every checkpoint rewrites everything collected since the scan started
    #[default]
    Cumulative,
    /// Every checkpoint holds only rows not written before.
    ///
    /// Emitted rows are dropped from memory, but the keys of emitted sends are kept for the
    /// whole scan so a send seen again is not written twice. Memory still grows with the
    /// number of distinct sends, one key per packet.
    Delta,
}

/// What the scanner does when the client gives up on a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    #[default]
    Skip,
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How far back in block time to scan
    pub collection_window_secs: u64,
    /// Block time between two checkpoints
    pub checkpoint_interval_secs: u64,
    /// Pause after each processed height
    pub inter_height_delay_ms: u64,
    /// Directory for intermediate checkpoints
    pub checkpoint_dir: PathBuf,
    /// Directory for the final checkpoint
    pub output_dir: PathBuf,
    pub file_prefix: String,
    /// Event types carrying the fee of their transaction
    pub fee_event_types: Vec<String>,
    pub duplicate_policy: DuplicatePolicy,
    pub checkpoint_mode: CheckpointMode,
    pub fetch_failure_policy: FetchFailurePolicy,
    /// Consecutive heights without a timestamp after which the scan stops
    pub max_consecutive_skips: u64,
    /// Hide the progress spinner
    pub quiet: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            collection_window_secs: 12 * 60 * 60,
            checkpoint_interval_secs: 2 * 60 * 60,
            inter_height_delay_ms: 100,
            checkpoint_dir: PathBuf::from("current"),
            output_dir: PathBuf::from("."),
            file_prefix: "COSMO_ibc_sq".to_string(),
            fee_event_types: vec!["tx_fee".to_string(), "fee_pay".to_string()],
            duplicate_policy: DuplicatePolicy::default(),
            checkpoint_mode: CheckpointMode::default(),
            fetch_failure_policy: FetchFailurePolicy::default(),
            max_consecutive_skips: 1_000,
            quiet: false,
        }
    }
}

impl ScanConfig {
    pub fn collection_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.collection_window_secs as i64)
    }

    pub fn checkpoint_interval(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.checkpoint_interval_secs as i64)
    }

    pub fn inter_height_delay(&self) -> Duration {
        Duration::from_millis(self.inter_height_delay_ms)
    }

    pub fn validate(&self) -> Result<(), Error> {
        // bounded so that the chrono conversions above cannot overflow
        const MAX_SECS: u64 = 100 * 365 * 24 * 60 * 60;
        if self.collection_window_secs == 0 || self.collection_window_secs > MAX_SECS {
            return Err(Error::Config(format!(
                "collection_window_secs must be within 1..={}",
                MAX_SECS
            )));
        }
        if self.checkpoint_interval_secs == 0 || self.checkpoint_interval_secs > MAX_SECS {
            return Err(Error::Config(format!(
                "checkpoint_interval_secs must be within 1..={}",
                MAX_SECS
            )));
        }
        if self.file_prefix.is_empty() {
            return Err(Error::Config("file_prefix must not be empty".to_string()));
        }
        if self.max_consecutive_skips == 0 {
            return Err(Error::Config(
                "max_consecutive_skips must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chain: CosmosClientConfig,
    pub scan: ScanConfig,
}

impl Config {
    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&raw)
    }

    /// Loads the file named by [`CONFIG_ENV`], or the defaults, then applies [`RPC_URL_ENV`].
    pub fn load() -> Result<Self, Error> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                log::info!(target: "ibc-packet-scan", "📄 Loading config from {:?}", path);
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        if let Ok(rpc_url) = std::env::var(RPC_URL_ENV) {
            config.chain.rpc_url = rpc_url;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.chain.retry.validate()?;
        self.scan.validate()
    }
}
