//! Engine Module
//!
//! The storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable and the table tree
//! - Handle concurrent read/write access
//! - Flush the MemTable to level 0 when it grows past the threshold
//! - Replay the WAL on startup
//! - Run the periodic compaction check

use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::codec::{BincodeCodec, ValueCodec};
use crate::config::Config;
use crate::entry::{Entry, Lookup};
use crate::error::{Result, StrataError};
use crate::memtable::MemTable;
use crate::tree::{CompactionScheduler, TableTree};
use crate::wal::{WalRecovery, WalWriter};

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Writes** (set/delete/flush): serialized by `write_lock`
///   - Order: write_lock → WAL → memtable → (flush) tree
///
/// - **Reads** (get): never take `write_lock`
///   - MemTable read lock, then a snapshot of the table tree
///   - SSTable lookups are positioned reads, so readers never block each
///     other
///
/// - **Flush**: the new level-0 table is inserted into the tree *before* the
///   MemTable is cleared, so a concurrent get finds the data in one or the
///   other
///
/// - **Compaction**: a background thread holding its own `Arc<TableTree>`
pub struct Engine<C: ValueCodec = BincodeCodec> {
    /// Engine configuration
    config: Config,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// On-disk tables by level (internal RwLock)
    tree: Arc<TableTree>,

    /// Serializes write operations (set/delete/flush)
    write_lock: Mutex<()>,

    /// Periodic compaction thread, if enabled
    scheduler: Option<CompactionScheduler>,

    /// Encoder for typed values
    codec: C,
}

impl Engine<BincodeCodec> {
    /// Open or create an engine with the given config
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_codec(config, BincodeCodec)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }
}

impl<C: ValueCodec> Engine<C> {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";

    /// Open or create an engine using `codec` for typed values
    ///
    /// On startup:
    /// 1. Validate config, create data directory
    /// 2. Replay the WAL into a fresh MemTable
    /// 3. Load existing SSTables into the table tree
    /// 4. Start the compaction scheduler
    pub fn open_with_codec(config: Config, codec: C) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir).map_err(StrataError::io_at(&config.data_dir))?;

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let memtable = MemTable::new();
        let (entries, recovery) = WalRecovery::recover(&wal_path)?;
        for entry in entries {
            memtable.apply(entry);
        }
        if recovery.entries_recovered > 0 || recovery.was_truncated {
            info!(
                recovered = recovery.entries_recovered,
                skipped = recovery.entries_skipped,
                discarded_bytes = recovery.bytes_discarded,
                last_lsn = recovery.last_lsn,
                "WAL replayed"
            );
        }
        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy, recovery.last_lsn + 1)?;

        let tree = Arc::new(TableTree::open(&config)?);

        let scheduler = if config.check_interval.is_zero() {
            None
        } else {
            Some(CompactionScheduler::start(
                Arc::clone(&tree),
                config.check_interval,
            )?)
        };

        info!(
            data_dir = %config.data_dir.display(),
            memtable_entries = memtable.len(),
            tables = tree.table_count(),
            "engine opened"
        );

        Ok(Self {
            config,
            wal: Mutex::new(wal),
            memtable,
            tree,
            write_lock: Mutex::new(()),
            scheduler,
            codec,
        })
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. Table tree, level 0 upward, newest table first within a level
    pub fn get(&self, key: &str) -> Result<Lookup> {
        match self.memtable.get(key) {
            Lookup::NotFound => self.tree.search(key),
            hit => Ok(hit),
        }
    }

    /// Set a key-value pair
    pub fn set(&self, key: &str, payload: &[u8]) -> Result<()> {
        self.write(Entry::new(key, payload))
    }

    /// Delete a key (records a tombstone)
    pub fn delete(&self, key: &str) -> Result<()> {
        self.write(Entry::tombstone(key))
    }

    /// Encode `value` with the engine's codec and store it
    pub fn set_value<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = self.codec.encode(value)?;
        self.set(key, &payload)
    }

    /// Fetch and decode a typed value
    ///
    /// Absent keys surface as `KeyNotFound`, deleted ones as `KeyTombstoned`.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let payload = self.get(key)?.into_value()?;
        self.codec.decode(&payload)
    }

    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append to WAL (durability)
    /// 3. Apply to MemTable
    /// 4. Flush if over threshold
    fn write(&self, entry: Entry) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.wal.lock().append(&entry)?;
        let size = self.memtable.apply(entry);

        if size > self.config.threshold {
            debug!(size, threshold = self.config.threshold, "memtable over threshold");
            self.flush_locked()?;
        }
        Ok(())
    }

    /// Flush memtable to a level-0 SSTable regardless of its size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_locked()
    }

    /// Flush implementation (called with write lock held)
    fn flush_locked(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        let entries = self.memtable.len();
        let index = self
            .memtable
            .scan(|snapshot| self.tree.create_table(snapshot.cloned(), 0))?;

        self.memtable.clear();
        self.wal.lock().reset()?;

        info!(index, entries, "memtable flushed to level 0");
        Ok(())
    }

    /// Run one compaction check now. Returns the number of levels compacted.
    pub fn compact(&self) -> Result<usize> {
        self.tree.check_and_compact()
    }

    /// Compact one level now. Returns `false` if there was nothing to do.
    pub fn compact_level(&self, level: usize) -> Result<bool> {
        self.tree.compact_level(level)
    }

    /// Close the engine gracefully
    ///
    /// Stops the compaction thread, flushes pending writes and syncs the WAL.
    pub fn close(mut self) -> Result<()> {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        self.flush()?;
        self.wal.lock().sync()?;
        info!(data_dir = %self.config.data_dir.display(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the current memtable size estimate
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_len(&self) -> usize {
        self.memtable.len()
    }

    /// Total number of SSTables
    pub fn table_count(&self) -> usize {
        self.tree.table_count()
    }

    /// Number of SSTables in `level`
    pub fn level_table_count(&self, level: usize) -> usize {
        self.tree.level_count(level)
    }

    /// The table tree
    pub fn tree(&self) -> &TableTree {
        &self.tree
    }
}
