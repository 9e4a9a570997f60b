//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::{Result, StrataError};

use super::WalReader;

/// Handles WAL recovery after a restart
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Checksummed records whose entry could not be decoded
    pub entries_skipped: u64,

    /// Last valid LSN (0 when the log is empty)
    pub last_lsn: u64,

    /// Bytes past the last valid record (torn or corrupt tail)
    pub bytes_discarded: u64,

    /// Whether the WAL file was truncated to drop the tail
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file, in append order
    ///
    /// This will:
    /// 1. Read all valid records
    /// 2. Skip records whose entry fails to decode
    /// 3. Truncate a torn or corrupt tail
    /// 4. Return all valid entries in order
    ///
    /// A missing file recovers nothing.
    pub fn recover(path: &Path) -> Result<(Vec<Entry>, RecoveryResult)> {
        let (entries, mut result) = Self::scan(path)?;

        if result.bytes_discarded > 0 {
            let valid_len = std::fs::metadata(path)
                .map_err(StrataError::io_at(path))?
                .len()
                - result.bytes_discarded;
            let file = OpenOptions::new()
                .write(true)
                .open(path)
                .map_err(StrataError::io_at(path))?;
            file.set_len(valid_len).map_err(StrataError::io_at(path))?;
            file.sync_all().map_err(StrataError::io_at(path))?;
            result.was_truncated = true;
            warn!(
                path = %path.display(),
                discarded = result.bytes_discarded,
                valid_len,
                "truncated torn WAL tail"
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::scan(path).map(|(_, result)| result)
    }

    fn scan(path: &Path) -> Result<(Vec<Entry>, RecoveryResult)> {
        let mut result = RecoveryResult::default();
        if !path.exists() {
            return Ok((Vec::new(), result));
        }

        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();

        loop {
            match reader.next_record() {
                Ok(Some(record)) => {
                    result.entries_recovered += 1;
                    result.last_lsn = record.lsn;
                    entries.push(record.entry);
                }
                Ok(None) => break,
                Err(StrataError::Encoding(reason)) => {
                    result.entries_skipped += 1;
                    warn!(
                        path = %path.display(),
                        offset = reader.valid_offset(),
                        %reason,
                        "skipping undecodable WAL record"
                    );
                }
                Err(StrataError::WalCorruption(reason)) => {
                    result.bytes_discarded = reader.file_len() - reader.valid_offset();
                    debug!(path = %path.display(), %reason, "WAL ends in a corrupt frame");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((entries, result))
    }
}
