//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append a record for every MemTable mutation before acknowledging it
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering
//! - Crash recovery and replay into a fresh MemTable
//! - Reset once the MemTable it mirrors has been flushed
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Entry  │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Entry  │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//! All integers are little-endian. The CRC covers the LSN bytes and the
//! bincode-encoded entry.

mod reader;
mod record;
mod recovery;
mod writer;

pub use reader::WalReader;
pub use record::{WalRecord, HEADER_SIZE, MAX_RECORD_SIZE};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
