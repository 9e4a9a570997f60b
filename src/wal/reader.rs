//! WAL Reader
//!
//! Sequentially reads framed records from a WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Result, StrataError};

use super::record::{FrameHeader, WalRecord};
use super::{HEADER_SIZE, MAX_RECORD_SIZE};

/// Reads records from the WAL file
///
/// `next_record` reports:
/// - `Ok(Some(_))` for a verified record
/// - `Ok(None)` at a clean end of file
/// - `Err(Encoding)` for a checksummed frame whose entry cannot be decoded;
///   the frame is consumed and reading may continue
/// - `Err(WalCorruption)` for a torn or checksum-failing frame; nothing past
///   `valid_offset()` can be trusted
pub struct WalReader {
    reader: BufReader<File>,
    /// End of the last fully consumed frame
    offset: u64,
    file_len: u64,
    done: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(StrataError::io_at(path))?;
        let file_len = file.metadata().map_err(StrataError::io_at(path))?.len();
        Ok(Self {
            reader: BufReader::new(file),
            offset: 0,
            file_len,
            done: false,
        })
    }

    /// Read the next record from the WAL
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        if self.offset >= self.file_len {
            return Ok(None);
        }

        let remaining = self.file_len - self.offset;
        if remaining < HEADER_SIZE as u64 {
            return Err(StrataError::WalCorruption(format!(
                "truncated header at offset {} ({} bytes left)",
                self.offset, remaining
            )));
        }

        let mut raw = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut raw)?;
        let header = FrameHeader::decode(&raw);

        let body_room = remaining - HEADER_SIZE as u64;
        if header.len > MAX_RECORD_SIZE || u64::from(header.len) > body_room {
            return Err(StrataError::WalCorruption(format!(
                "truncated record at offset {}: declared {} bytes, {} available",
                self.offset, header.len, body_room
            )));
        }

        let mut data = vec![0u8; header.len as usize];
        self.reader.read_exact(&mut data)?;
        let frame_end = self.offset + HEADER_SIZE as u64 + u64::from(header.len);

        match WalRecord::from_frame(header, &data) {
            Ok(record) => {
                self.offset = frame_end;
                Ok(Some(record))
            }
            Err(e @ StrataError::Encoding(_)) => {
                self.offset = frame_end;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Byte offset up to which the log has been verified
    pub fn valid_offset(&self) -> u64 {
        self.offset
    }

    /// Total file length at open time
    pub fn file_len(&self) -> u64 {
        self.file_len
    }
}

/// Yields records until the end of the log or the first corrupt frame
impl Iterator for WalReader {
    type Item = Result<WalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e @ StrataError::Encoding(_)) => Some(Err(e)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
