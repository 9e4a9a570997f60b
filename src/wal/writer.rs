//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::WalSyncStrategy;
use crate::entry::Entry;
use crate::error::{Result, StrataError};

use super::WalRecord;

/// Writes entries to the WAL file
///
/// Two layers of buffering:
///   BufWriter.flush()  → Rust buffer → OS page cache
///   file.sync_all()    → OS page cache → physical disk
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file for appending
    ///
    /// `next_lsn` is the sequence number given to the next record; after
    /// recovery it is `last_lsn + 1`.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(StrataError::io_at(path))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append an entry to the WAL, returning its LSN
    ///
    /// The record is handed to the OS before returning and fsync'd according
    /// to the sync strategy. Any failure is a durability failure.
    pub fn append(&mut self, entry: &Entry) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = WalRecord::new(lsn, entry.clone()).encode()?;

        self.writer
            .write_all(&frame)
            .and_then(|_| self.writer.flush())
            .map_err(StrataError::io_at(&self.path))?;
        self.next_lsn += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush().map_err(StrataError::io_at(&self.path))?;
        self.writer
            .get_ref()
            .sync_all()
            .map_err(StrataError::io_at(&self.path))?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every record. Only call once the MemTable this log mirrors
    /// is durable in an SSTable.
    pub fn reset(&mut self) -> Result<()> {
        self.writer.flush().map_err(StrataError::io_at(&self.path))?;
        let file = self.writer.get_ref();
        file.set_len(0).map_err(StrataError::io_at(&self.path))?;
        file.sync_all().map_err(StrataError::io_at(&self.path))?;
        self.unsynced = 0;
        debug!(path = %self.path.display(), next_lsn = self.next_lsn, "WAL reset");
        Ok(())
    }

    /// LSN that the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
