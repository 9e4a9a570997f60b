//! SSTable Builder
//!
//! Writes sorted entries to a new SSTable file.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use tracing::warn;

use crate::entry::Entry;
use crate::error::{Result, StrataError};

use super::{Footer, Position, SSTable};

/// Builder for creating new SSTables from sorted entries
///
/// The data region is assembled in memory; `finish()` writes the whole file
/// in one pass and reopens it read-only.
pub struct SSTableBuilder {
    /// Output file path
    path: PathBuf,
    /// Encoded entries, back to back
    data: BytesMut,
    /// Index: key → position in `data`
    index: BTreeMap<String, Position>,
    last_key: Option<String>,
}

impl SSTableBuilder {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            data: BytesMut::new(),
            index: BTreeMap::new(),
            last_key: None,
        }
    }

    /// Add an entry (must be called in strictly ascending key order)
    ///
    /// On an encoding error nothing is recorded and the builder stays usable.
    pub fn add(&mut self, entry: &Entry) -> Result<()> {
        if let Some(last) = &self.last_key {
            if entry.key.as_str() <= last.as_str() {
                return Err(StrataError::Storage(format!(
                    "key {:?} added after {:?}",
                    entry.key, last
                )));
            }
        }

        let encoded = entry.encode()?;
        let position = Position {
            start: self.data.len() as u64,
            length: encoded.len() as u64,
            deleted: entry.deleted,
        };
        self.data.put_slice(&encoded);
        self.index.insert(entry.key.clone(), position);
        self.last_key = Some(entry.key.clone());
        Ok(())
    }

    /// Number of entries added so far
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Finish building: write `[data][index][footer]`, fsync and open
    pub fn finish(self) -> Result<SSTable> {
        let index = bincode::serialize(&self.index)?;
        let footer = Footer::new(self.data.len() as u64, index.len() as u64);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(StrataError::io_at(&self.path))?;
        let mut writer = BufWriter::new(file);

        let write_regions = |writer: &mut BufWriter<File>| -> std::io::Result<()> {
            writer.write_all(&self.data)?;
            writer.write_all(&index)?;
            writer.write_all(&footer.encode())?;
            writer.flush()
        };
        write_regions(&mut writer).map_err(StrataError::io_at(&self.path))?;

        let file = writer.into_inner().map_err(|e| StrataError::FileIo {
            path: self.path.clone(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(StrataError::io_at(&self.path))?;
        drop(file);

        SSTable::open(&self.path)
    }
}

impl SSTable {
    /// Write `entries` to a new table file at `path` and open it
    ///
    /// Entries are sorted by key; for duplicate keys the last one wins. An
    /// entry that fails to encode is logged and left out.
    pub fn create<I>(path: &Path, entries: I) -> Result<SSTable>
    where
        I: IntoIterator<Item = Entry>,
    {
        let sorted: BTreeMap<String, Entry> = entries
            .into_iter()
            .map(|entry| (entry.key.clone(), entry))
            .collect();

        let mut builder = SSTableBuilder::new(path);
        for entry in sorted.values() {
            match builder.add(entry) {
                Ok(()) => {}
                Err(StrataError::Encoding(reason)) => {
                    warn!(key = %entry.key, %reason, "skipping entry that failed to encode");
                }
                Err(e) => return Err(e),
            }
        }
        builder.finish()
    }
}
