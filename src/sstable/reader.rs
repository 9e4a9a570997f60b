//! SSTable Reader
//!
//! Opens SSTable files and answers point lookups through the in-memory
//! index. All reads are positioned, so one open table serves any number of
//! concurrent readers without a lock.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::entry::{Entry, Lookup};
use crate::error::{Result, StrataError};

use super::{Footer, Position, FOOTER_SIZE};

/// An open, immutable SSTable
pub struct SSTable {
    path: PathBuf,
    file: File,
    footer: Footer,
    file_size: u64,
    /// Sparse index: key → position in the data region
    index: HashMap<String, Position>,
    /// Index keys in ascending order, for binary search
    sorted_keys: Vec<String>,
    /// Remove the file once the last handle is dropped
    obsolete: AtomicBool,
}

impl SSTable {
    /// Open an SSTable for reading
    ///
    /// Loads the footer and the whole index into memory. Any inconsistency
    /// between the footer, the index and the file size is reported as
    /// `CorruptMetadata` naming the file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(StrataError::io_at(path))?;
        let file_size = file.metadata().map_err(StrataError::io_at(path))?.len();

        if file_size < FOOTER_SIZE {
            return Err(StrataError::corrupt(
                path,
                format!("file is {} bytes, smaller than the footer", file_size),
            ));
        }

        let mut raw = [0u8; FOOTER_SIZE as usize];
        read_exact_at(&file, &mut raw, file_size - FOOTER_SIZE)
            .map_err(StrataError::io_at(path))?;
        let footer = Footer::decode(&raw);
        footer
            .validate(file_size)
            .map_err(|reason| StrataError::corrupt(path, reason))?;

        let mut index_bytes = vec![0u8; footer.index_len as usize];
        read_exact_at(&file, &mut index_bytes, footer.index_start)
            .map_err(StrataError::io_at(path))?;
        let index: HashMap<String, Position> = bincode::deserialize(&index_bytes)
            .map_err(|e| StrataError::corrupt(path, format!("undecodable index: {}", e)))?;

        if let Some((key, pos)) = index
            .iter()
            .find(|(_, pos)| pos.start.saturating_add(pos.length) > footer.data_len)
        {
            return Err(StrataError::corrupt(
                path,
                format!(
                    "key {:?} points past the data region ({}+{} > {})",
                    key, pos.start, pos.length, footer.data_len
                ),
            ));
        }

        let mut sorted_keys: Vec<String> = index.keys().cloned().collect();
        sorted_keys.sort_unstable();

        debug!(path = %path.display(), entries = sorted_keys.len(), file_size, "opened SSTable");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            footer,
            file_size,
            index,
            sorted_keys,
            obsolete: AtomicBool::new(false),
        })
    }

    /// Look up `key`
    ///
    /// Returns:
    /// - `Found(payload)`: key holds a value in this table
    /// - `Tombstoned`: key is deleted here (answered from the index alone)
    /// - `NotFound`: key is not in this table
    ///
    /// Read or decode failures are returned as errors.
    pub fn search(&self, key: &str) -> Result<Lookup> {
        if !self.might_contain(key) {
            return Ok(Lookup::NotFound);
        }

        let position = match self.position(key) {
            Some(position) => position,
            None => return Ok(Lookup::NotFound),
        };
        if position.deleted {
            return Ok(Lookup::Tombstoned);
        }

        let mut buf = vec![0u8; position.length as usize];
        read_exact_at(&self.file, &mut buf, self.footer.data_start + position.start)
            .map_err(StrataError::io_at(&self.path))?;
        let entry = Entry::decode(&buf)?;
        Ok(entry.to_lookup())
    }

    /// Binary search over the sorted key list
    fn position(&self, key: &str) -> Option<&Position> {
        let slot = self
            .sorted_keys
            .binary_search_by(|probe| probe.as_str().cmp(key))
            .ok()?;
        self.index.get(&self.sorted_keys[slot])
    }

    /// Load every entry in ascending key order (compaction input)
    ///
    /// The data region is read in one call. Records that fail to decode are
    /// logged and skipped; read failures are returned.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        let mut data = vec![0u8; self.footer.data_len as usize];
        read_exact_at(&self.file, &mut data, self.footer.data_start)
            .map_err(StrataError::io_at(&self.path))?;

        let mut entries = Vec::with_capacity(self.sorted_keys.len());
        for key in &self.sorted_keys {
            let position = self.index[key];
            if position.deleted {
                entries.push(Entry::tombstone(key.clone()));
                continue;
            }

            let start = position.start as usize;
            let end = start + position.length as usize;
            match Entry::decode(&data[start..end]) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    path = %self.path.display(),
                    key = %key,
                    error = %e,
                    "skipping undecodable record"
                ),
            }
        }
        Ok(entries)
    }

    /// Quick check if a key might be in this SSTable (range check)
    pub fn might_contain(&self, key: &str) -> bool {
        match (self.sorted_keys.first(), self.sorted_keys.last()) {
            (Some(min), Some(max)) => key >= min.as_str() && key <= max.as_str(),
            _ => false,
        }
    }

    /// Schedule the file for removal once no handle to this table remains
    pub fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    /// On-disk size in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of entries, tombstones included
    pub fn len(&self) -> usize {
        self.sorted_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_keys.is_empty()
    }

    /// Keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sorted_keys.iter().map(String::as_str)
    }

    pub fn min_key(&self) -> Option<&str> {
        self.sorted_keys.first().map(String::as_str)
    }

    pub fn max_key(&self) -> Option<&str> {
        self.sorted_keys.last().map(String::as_str)
    }
}

impl Drop for SSTable {
    fn drop(&mut self) {
        if !self.obsolete.load(Ordering::SeqCst) {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed compacted SSTable"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove compacted SSTable"
            ),
        }
    }
}

impl std::fmt::Debug for SSTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTable")
            .field("path", &self.path)
            .field("entries", &self.sorted_keys.len())
            .field("file_size", &self.file_size)
            .finish()
    }
}

// =============================================================================
// Positioned Reads
// =============================================================================

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
