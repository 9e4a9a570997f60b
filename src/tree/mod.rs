//! Table Tree Module
//!
//! Leveled organization of SSTables.
//!
//! ## Layout
//! ```text
//! level 0   [0.3.db] [0.4.db] [0.5.db]   ← flushes land here (newest)
//! level 1   [1.0.db]                     ← level 0 compacted
//! ...
//! level 9   [9.0.db] [9.1.db]            ← terminal level (oldest)
//! ```
//!
//! Lookups walk levels from 0 upward and, inside a level, from the highest
//! creation index down; the first table that knows the key answers.
//!
//! ## Concurrency
//! - `levels`: one RwLock; held exclusively only to allocate an index, splice
//!   a node in, or detach compacted nodes
//! - Lookups clone the `Arc<SSTable>` list under the read lock and do their
//!   I/O without it
//! - `compacting`: one flag per level so a level is merged by one pass at a
//!   time

mod compaction;
mod level;
mod scheduler;

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::entry::{Entry, Lookup};
use crate::error::{Result, StrataError};
use crate::sstable::{SSTable, TABLE_EXTENSION};

use level::Level;

pub use level::TableNode;
pub use scheduler::CompactionScheduler;

/// Number of levels in the tree
pub const LEVEL_COUNT: usize = 10;

/// Last level; compacting it rewrites it in place
pub const TERMINAL_LEVEL: usize = LEVEL_COUNT - 1;

/// Suffix of tables still being written
const TMP_SUFFIX: &str = ".tmp";

/// All SSTables of the engine, by level
pub struct TableTree {
    data_dir: PathBuf,
    levels: RwLock<Vec<Level>>,
    /// Byte capacity per level
    capacities: [u64; LEVEL_COUNT],
    /// Max table count per level
    part_size: usize,
    compacting: [AtomicBool; LEVEL_COUNT],
    /// Sequence for temporary table file names
    pending: AtomicU64,
}

impl TableTree {
    /// Load every table file found in `config.data_dir`
    ///
    /// A table that fails to open aborts loading: the error names the file.
    pub fn open(config: &Config) -> Result<Self> {
        let dir = config.data_dir.as_path();
        let started = Instant::now();
        let mut levels: Vec<Level> = (0..LEVEL_COUNT).map(|_| Level::default()).collect();
        let mut loaded = 0usize;

        for dir_entry in fs::read_dir(dir).map_err(StrataError::io_at(dir))? {
            let path = dir_entry.map_err(StrataError::io_at(dir))?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(OsStr::to_str) else {
                continue;
            };

            if name.ends_with(TMP_SUFFIX) {
                warn!(path = %path.display(), "removing unfinished table file");
                fs::remove_file(&path).map_err(StrataError::io_at(&path))?;
                continue;
            }
            if path.extension() != Some(OsStr::new(TABLE_EXTENSION)) {
                continue;
            }

            let Some((level, index)) = parse_table_name(name) else {
                warn!(path = %path.display(), "ignoring table file with unrecognised name");
                continue;
            };
            if level >= LEVEL_COUNT {
                warn!(path = %path.display(), level, "ignoring table file beyond the last level");
                continue;
            }

            let table = SSTable::open(&path)?;
            levels[level].insert(TableNode {
                index,
                table: Arc::new(table),
            });
            loaded += 1;
        }

        info!(
            dir = %dir.display(),
            tables = loaded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "table tree loaded"
        );

        Ok(Self {
            data_dir: dir.to_path_buf(),
            levels: RwLock::new(levels),
            capacities: std::array::from_fn(|level| config.level_capacity(level)),
            part_size: config.part_size,
            compacting: std::array::from_fn(|_| AtomicBool::new(false)),
            pending: AtomicU64::new(0),
        })
    }

    /// Add a finished table to `level` (capped at the terminal level)
    ///
    /// Allocates the level's next creation index, moves the table file to
    /// `<level>.<index>.db`, syncs the directory and splices the node in.
    /// Returns the index.
    pub fn insert(&self, mut table: SSTable, level: usize) -> Result<u64> {
        let level = level.min(TERMINAL_LEVEL);
        let mut levels = self.levels.write();

        let index = levels[level].allocate();
        let final_path = self.table_path(level, index);
        fs::rename(table.path(), &final_path).map_err(StrataError::io_at(table.path()))?;
        sync_dir(&self.data_dir)?;
        table.set_path(final_path);

        info!(level, index, entries = table.len(), bytes = table.file_size(), "SSTable added");
        levels[level].insert(TableNode {
            index,
            table: Arc::new(table),
        });
        Ok(index)
    }

    /// Write `entries` as a new table and insert it at `level`
    ///
    /// The file is written under a temporary name first, so a crash never
    /// leaves a half-written `.db` file behind.
    pub fn create_table<I>(&self, entries: I, level: usize) -> Result<u64>
    where
        I: IntoIterator<Item = Entry>,
    {
        let id = self.pending.fetch_add(1, Ordering::SeqCst);
        let tmp = self
            .data_dir
            .join(format!("pending-{}-{}{}", level, id, TMP_SUFFIX));

        let table = match SSTable::create(&tmp, entries) {
            Ok(table) => table,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        };
        self.insert(table, level).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            e
        })
    }

    /// Find the freshest answer for `key`
    pub fn search(&self, key: &str) -> Result<Lookup> {
        let tables: Vec<Arc<SSTable>> = {
            let levels = self.levels.read();
            levels
                .iter()
                .flat_map(|level| level.newest_first())
                .filter(|node| node.table.might_contain(key))
                .map(|node| Arc::clone(&node.table))
                .collect()
        };

        for table in &tables {
            match table.search(key)? {
                Lookup::NotFound => continue,
                hit => return Ok(hit),
            }
        }
        Ok(Lookup::NotFound)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of tables in `level`
    pub fn level_count(&self, level: usize) -> usize {
        self.levels.read().get(level).map_or(0, Level::len)
    }

    /// Cumulative file size of `level`
    pub fn level_size(&self, level: usize) -> u64 {
        self.levels.read().get(level).map_or(0, Level::size)
    }

    /// Byte capacity of `level`
    pub fn level_capacity(&self, level: usize) -> u64 {
        self.capacities[level.min(TERMINAL_LEVEL)]
    }

    /// Snapshot of `level`'s nodes, oldest first
    pub fn nodes(&self, level: usize) -> Vec<TableNode> {
        self.levels
            .read()
            .get(level)
            .map(|l| l.nodes().to_vec())
            .unwrap_or_default()
    }

    /// Creation index the next table in `level` will receive
    pub fn next_index(&self, level: usize) -> u64 {
        self.levels.read().get(level).map_or(0, Level::next_index)
    }

    /// Total number of tables across all levels
    pub fn table_count(&self) -> usize {
        self.levels.read().iter().map(Level::len).sum()
    }

    pub fn part_size(&self) -> usize {
        self.part_size
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the table with the given level and creation index
    pub fn table_path(&self, level: usize, index: u64) -> PathBuf {
        self.data_dir.join(table_file_name(level, index))
    }
}

/// Persist renames inside `dir`
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(StrataError::io_at(dir))
}

/// Directory handles cannot be synced here; renames rely on the OS
#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// "3.12.db" for level 3, index 12
pub fn table_file_name(level: usize, index: u64) -> String {
    format!("{}.{}.{}", level, index, TABLE_EXTENSION)
}

/// "3.12.db" → Some((3, 12))
pub fn parse_table_name(name: &str) -> Option<(usize, u64)> {
    let stem = name.strip_suffix(TABLE_EXTENSION)?.strip_suffix('.')?;
    let (level, index) = stem.split_once('.')?;
    Some((level.parse().ok()?, index.parse().ok()?))
}
