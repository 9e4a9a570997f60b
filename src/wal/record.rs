//! WAL record framing

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::entry::Entry;
use crate::error::{Result, StrataError};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single record payload; larger lengths mean a torn header
pub const MAX_RECORD_SIZE: u32 = 256 * 1024 * 1024;

/// A single framed entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,
    pub entry: Entry,
}

/// Parsed frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl WalRecord {
    pub fn new(lsn: u64, entry: Entry) -> Self {
        Self { lsn, entry }
    }

    /// Encode into a complete frame
    pub fn encode(&self) -> Result<Bytes> {
        let data = self.entry.encode()?;
        let len = u32::try_from(data.len())
            .ok()
            .filter(|&len| len <= MAX_RECORD_SIZE)
            .ok_or_else(|| {
                StrataError::Encoding(format!("WAL record too large: {} bytes", data.len()))
            })?;

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + data.len());
        buf.put_u64_le(self.lsn);
        buf.put_u32_le(checksum(self.lsn, &data));
        buf.put_u32_le(len);
        buf.put_slice(&data);
        Ok(buf.freeze())
    }

    /// Verify a frame body against its header and decode the entry
    pub(crate) fn from_frame(header: FrameHeader, data: &[u8]) -> Result<Self> {
        let actual = checksum(header.lsn, data);
        if actual != header.crc {
            return Err(StrataError::WalCorruption(format!(
                "checksum mismatch at lsn {}: expected {:#010x}, got {:#010x}",
                header.lsn, header.crc, actual
            )));
        }
        Ok(Self {
            lsn: header.lsn,
            entry: Entry::decode(data)?,
        })
    }
}

impl FrameHeader {
    pub(crate) fn decode(mut raw: &[u8]) -> Self {
        let lsn = raw.get_u64_le();
        let crc = raw.get_u32_le();
        let len = raw.get_u32_le();
        Self { lsn, crc, len }
    }
}

fn checksum(lsn: u64, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&lsn.to_le_bytes());
    hasher.update(data);
    hasher.finalize()
}
