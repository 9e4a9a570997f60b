//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Shared reads, exclusive mutation
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation and compaction merges
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in RwLock:
//! - Ordered keys (required for SSTable generation)
//! - O(log n) point lookup and insert
//! - Tombstones are stored as entries so they shadow older SSTable values

mod table;

pub use table::{MemTable, ENTRY_OVERHEAD};
