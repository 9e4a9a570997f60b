//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Data Region (variable)                                  │
//! │   bincode(Entry) ... one record per key, sorted         │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Region (variable)                                 │
//! │   bincode(map key → Position { start, length, deleted }) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (40 bytes, little-endian u64)                    │
//! │   version | data_start | data_len | index_start         │
//! │   | index_len                                           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Positions are relative to `data_start`. Tombstones are written to the data
//! region like any other entry, and flagged in their Position so lookups can
//! answer without reading the data region.

mod builder;
mod footer;
mod reader;

use serde::{Deserialize, Serialize};

pub use builder::SSTableBuilder;
pub use footer::Footer;
pub use reader::SSTable;

// =============================================================================
// Shared Constants (used by builder, footer, reader)
// =============================================================================

/// Current SSTable format version
pub const FORMAT_VERSION: u64 = 1;

/// Footer size: five u64 fields = 40 bytes
pub const FOOTER_SIZE: u64 = 40;

/// File extension of finished tables
pub const TABLE_EXTENSION: &str = "db";

// =============================================================================
// Index Position
// =============================================================================

/// Location of one encoded entry inside the data region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Offset from the start of the data region
    pub start: u64,
    /// Encoded length in bytes
    pub length: u64,
    /// Copy of the entry's tombstone flag
    pub deleted: bool,
}
