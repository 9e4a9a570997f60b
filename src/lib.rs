//! # StrataKV
//!
//! An embedded LSM-tree key-value storage engine with:
//! - Write-Ahead Logging (WAL) for durability
//! - Crash recovery with torn-write handling
//! - Immutable SSTables with an in-memory index and a fixed footer
//! - Ten table levels merged by a background compaction thread
//!
//! ## Architecture Overview
//!
//! ```text
//!              set / delete                       get
//!                   │                              │
//! ┌─────────────────▼──────────────────────────────▼────────────┐
//! │                         Engine                               │
//! └───────┬─────────────────────┬─────────────────────┬──────────┘
//!         │ 1. append           │ 2. apply            │ 3. lookup
//!         ▼                     ▼                     │
//!   ┌───────────┐        ┌─────────────┐              │
//!   │    WAL    │        │  MemTable   │◄─────────────┤
//!   │ (wal.log) │        │  (RwLock)   │              │
//!   └───────────┘        └──────┬──────┘              │
//!                               │ flush               │
//!                               ▼                     ▼
//!                        ┌──────────────────────────────────┐
//!                        │ TableTree                        │
//!                        │  level 0: 0.0.db 0.1.db ...      │
//!                        │  level 1: 1.0.db                 │
//!                        │  ...                             │
//!                        │  level 9 (terminal)              │
//!                        └──────────────┬───────────────────┘
//!                                       │ periodic check
//!                               ┌───────▼────────┐
//!                               │ Compaction     │
//!                               │ scheduler      │
//!                               └────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod entry;
pub mod codec;
pub mod wal;
pub mod memtable;
pub mod sstable;
pub mod tree;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use codec::{BincodeCodec, ValueCodec};
pub use config::{Config, WalSyncStrategy};
pub use engine::Engine;
pub use entry::{Entry, Lookup};
pub use error::{Result, StrataError};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StrataKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
