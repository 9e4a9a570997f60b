//! SSTable footer

use bytes::{Buf, BufMut, BytesMut};

use super::{FOOTER_SIZE, FORMAT_VERSION};

/// Trailing metadata locating the data and index regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub version: u64,
    pub data_start: u64,
    pub data_len: u64,
    pub index_start: u64,
    pub index_len: u64,
}

impl Footer {
    /// Footer for a file laid out as `[data][index][footer]` from offset 0
    pub fn new(data_len: u64, index_len: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            data_start: 0,
            data_len,
            index_start: data_len,
            index_len,
        }
    }

    pub fn encode(&self) -> [u8; FOOTER_SIZE as usize] {
        let mut buf = BytesMut::with_capacity(FOOTER_SIZE as usize);
        buf.put_u64_le(self.version);
        buf.put_u64_le(self.data_start);
        buf.put_u64_le(self.data_len);
        buf.put_u64_le(self.index_start);
        buf.put_u64_le(self.index_len);

        let mut out = [0u8; FOOTER_SIZE as usize];
        out.copy_from_slice(&buf);
        out
    }

    /// Parse the last 40 bytes of a table file
    pub fn decode(raw: &[u8; FOOTER_SIZE as usize]) -> Self {
        let mut buf = &raw[..];
        Self {
            version: buf.get_u64_le(),
            data_start: buf.get_u64_le(),
            data_len: buf.get_u64_le(),
            index_start: buf.get_u64_le(),
            index_len: buf.get_u64_le(),
        }
    }

    /// Check the declared regions against the actual file size
    pub fn validate(&self, file_size: u64) -> std::result::Result<(), String> {
        if self.version != FORMAT_VERSION {
            return Err(format!("unsupported format version {}", self.version));
        }
        let data_end = self
            .data_start
            .checked_add(self.data_len)
            .ok_or("data region overflows")?;
        if data_end != self.index_start {
            return Err(format!(
                "data region ends at {} but index starts at {}",
                data_end, self.index_start
            ));
        }
        let index_end = self
            .index_start
            .checked_add(self.index_len)
            .ok_or("index region overflows")?;
        if index_end.checked_add(FOOTER_SIZE) != Some(file_size) {
            return Err(format!(
                "index region ends at {} but footer starts at {}",
                index_end,
                file_size.saturating_sub(FOOTER_SIZE)
            ));
        }
        Ok(())
    }
}
