//! Configuration for StrataKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StrataError};
use crate::tree::LEVEL_COUNT;

/// Main configuration for a StrataKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── {level}.{index}.db  (SSTable files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Level Configuration
    // -------------------------------------------------------------------------
    /// Byte capacity of level 0; level N holds `level0_size * 10^N`
    pub level0_size: u64,

    /// Max number of tables in one level before it is compacted
    pub part_size: usize,

    /// Interval between background compaction checks (zero disables them)
    pub check_interval: Duration,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// MemTable size (in bytes) above which it is flushed to level 0
    pub threshold: usize,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./stratakv_data"),
            level0_size: 10 * 1024 * 1024, // 10 MB
            part_size: 4,
            check_interval: Duration::from_secs(3),
            threshold: 4 * 1024 * 1024, // 4 MB
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.part_size == 0 {
            return Err(StrataError::Config("part_size must be at least 1".into()));
        }
        if self.threshold == 0 {
            return Err(StrataError::Config("threshold must be non-zero".into()));
        }
        if self.level0_size == 0 {
            return Err(StrataError::Config("level0_size must be non-zero".into()));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(StrataError::Config(
                "WAL sync count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Byte capacity of `level`, growing tenfold per level
    pub fn level_capacity(&self, level: usize) -> u64 {
        let level = level.min(LEVEL_COUNT - 1) as u32;
        self.level0_size.saturating_mul(10u64.saturating_pow(level))
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the level 0 byte capacity
    pub fn level0_size(mut self, bytes: u64) -> Self {
        self.config.level0_size = bytes;
        self
    }

    /// Set the max table count per level
    pub fn part_size(mut self, count: usize) -> Self {
        self.config.part_size = count;
        self
    }

    /// Set the MemTable flush threshold (in bytes)
    pub fn threshold(mut self, bytes: usize) -> Self {
        self.config.threshold = bytes;
        self
    }

    /// Set the background compaction interval
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval = interval;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
