//! Configuration for the platform VM.
//!
//! Loadable from TOML the same way the teacher's `Config` is loaded from
//! disk (`toml`, `serde`), with network-specific defaults taking the place
//! of the teacher's `NetworkType`. Everything here is either a fork-
//! activation time, a staking economics constant, or a resource bound —
//! no RPC/network/wallet settings, since those surfaces are out of scope.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::VmError;

/// 1_000_000 == 100%; the fixed-point unit for share/percentage arithmetic.
pub const PERCENT_DENOMINATOR: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// Platform VM genesis chain-time, seconds since epoch.
    pub fn genesis_time(&self) -> i64 {
        match self {
            Network::Mainnet => 1_767_225_600,
            Network::Testnet => 1_764_547_200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    pub network: Network,

    /// Chain-time at which Banff-shaped blocks become mandatory. Blocks
    /// using the Apricot shape at or after this time fail with
    /// `ApricotBlockIssuedAfterFork`.
    pub banff_time: i64,

    /// Maximum permitted skew, in seconds, between a block's timestamp and
    /// local wall-clock time.
    pub sync_bound_secs: i64,

    pub staking: StakingConfig,
    pub reward: RewardScheduleConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    pub min_validator_stake: u64,
    pub max_validator_stake: u64,
    pub min_delegator_stake: u64,
    pub min_stake_duration_secs: i64,
    pub max_stake_duration_secs: i64,
    /// Percentage (parts-per-million) of a validator's reward that is
    /// withheld to be split among its delegators, parts-per-million.
    pub max_delegation_fee_ppm: u64,
    /// Default uptime requirement, parts-per-million, used for
    /// primary-network validators and for supernets that have not been
    /// transformed into a permissionless supernet.
    pub default_uptime_requirement_ppm: u64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            min_validator_stake: 2_000 * SATOSHIS_PER_TOKEN,
            max_validator_stake: 3_000_000 * SATOSHIS_PER_TOKEN,
            min_delegator_stake: 25 * SATOSHIS_PER_TOKEN,
            min_stake_duration_secs: 2 * 7 * 24 * 3600,
            max_stake_duration_secs: 365 * 24 * 3600,
            max_delegation_fee_ppm: 200_000,
            default_uptime_requirement_ppm: 800_000,
        }
    }
}

pub const SATOSHIS_PER_TOKEN: u64 = 1_000_000_000;

/// The three-breakpoint piecewise-linear reward share schedule used by
/// [`crate::reward`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardScheduleConfig {
    pub start_time_offset_secs: i64,
    pub diminishing_time_offset_secs: i64,
    pub target_time_offset_secs: i64,
    pub start_share_ppm: u64,
    pub diminishing_share_ppm: u64,
    pub target_share_ppm: u64,
    pub stake_period_reward_share_ppm: u64,
}

impl Default for RewardScheduleConfig {
    fn default() -> Self {
        Self {
            start_time_offset_secs: 0,
            diminishing_time_offset_secs: 3 * 365 * 24 * 3600,
            target_time_offset_secs: 5 * 365 * 24 * 3600,
            start_share_ppm: 120_000,
            diminishing_share_ppm: 100_000,
            target_share_ppm: 100_000,
            stake_period_reward_share_ppm: 20_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the persistent `sled` database. Mirrors the
    /// teacher's data-dir resolution but without per-network subdirectory
    /// nesting, since this crate is a library first.
    pub data_dir: PathBuf,
    /// Bytes of page cache handed to `sled`; `None` lets the VM size it
    /// from available system memory the way `app_builder::calculate_cache_size`
    /// does.
    pub cache_capacity_bytes: Option<u64>,
    /// Entries held by the validator-set LRU cache (§4.5).
    pub validator_set_cache_entries: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_capacity_bytes: None,
            validator_set_cache_entries: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("platformvm")
}

impl VmConfig {
    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            banff_time: Network::Testnet.genesis_time() + 3600,
            sync_bound_secs: 600,
            staking: StakingConfig::default(),
            reward: RewardScheduleConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, VmError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| VmError::Fatal(format!("reading config: {e}")))?;
        toml::from_str(&text).map_err(|e| VmError::Fatal(format!("parsing config: {e}")))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), VmError> {
        let text =
            toml::to_string_pretty(self).map_err(|e| VmError::Fatal(format!("config: {e}")))?;
        std::fs::write(path.as_ref(), text).map_err(|e| VmError::Fatal(format!("writing config: {e}")))
    }
}

/// Initialize a `tracing` subscriber suitable for standalone tooling and
/// integration tests. Embedding binaries are free to install their own
/// subscriber instead; the VM only ever emits through the `tracing` facade.
pub fn init_tracing(cfg: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if cfg.json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testnet_config_is_self_consistent() {
        let cfg = VmConfig::testnet();
        assert!(cfg.banff_time > cfg.network.genesis_time());
        assert!(cfg.staking.max_validator_stake > cfg.staking.min_validator_stake);
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = VmConfig::testnet();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: VmConfig = toml::from_str(&text).unwrap();
        assert_eq!(cfg.banff_time, back.banff_time);
        assert_eq!(
            cfg.staking.min_validator_stake,
            back.staking.min_validator_stake
        );
    }
}
