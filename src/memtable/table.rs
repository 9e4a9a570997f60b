//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::btree_map::Values;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::entry::{Entry, Lookup};

/// Fixed bookkeeping cost charged per entry in the size estimate
pub const ENTRY_OVERHEAD: usize = 32;

fn estimate(entry: &Entry) -> usize {
    entry.key.len() + entry.payload.len() + ENTRY_OVERHEAD
}

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<String, Entry>>,
    /// Approximate footprint in bytes, updated under the write lock
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Insert or overwrite a value, clearing any tombstone.
    /// Returns the new size estimate.
    pub fn set(&self, key: impl Into<String>, payload: impl Into<Vec<u8>>) -> usize {
        self.apply(Entry::new(key, payload))
    }

    /// Record a tombstone for `key`. Returns the new size estimate.
    pub fn delete(&self, key: impl Into<String>) -> usize {
        self.apply(Entry::tombstone(key))
    }

    /// Insert a prepared entry, replacing whatever the key held before
    pub fn apply(&self, entry: Entry) -> usize {
        let added = estimate(&entry);
        let mut data = self.data.write();
        let removed = data
            .insert(entry.key.clone(), entry)
            .map(|old| estimate(&old))
            .unwrap_or(0);

        if added >= removed {
            self.size.fetch_add(added - removed, Ordering::SeqCst) + (added - removed)
        } else {
            self.size.fetch_sub(removed - added, Ordering::SeqCst) - (removed - added)
        }
    }

    /// Look up a key (read lock)
    pub fn get(&self, key: &str) -> Lookup {
        self.data
            .read()
            .get(key)
            .map(Entry::to_lookup)
            .unwrap_or(Lookup::NotFound)
    }

    /// Run `f` over the entries in ascending key order while holding the
    /// read lock. Writers are blocked until `f` returns.
    pub fn scan<R>(&self, f: impl FnOnce(Values<'_, String, Entry>) -> R) -> R {
        let data = self.data.read();
        f(data.values())
    }

    /// Owned snapshot of all entries in ascending key order
    pub fn iter(&self) -> std::vec::IntoIter<Entry> {
        self.scan(|entries| entries.cloned().collect::<Vec<_>>())
            .into_iter()
    }

    /// Consume the table, yielding its entries in ascending key order
    pub fn into_entries(self) -> Vec<Entry> {
        self.data.into_inner().into_values().collect()
    }

    /// Approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Number of entries, tombstones included
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Remove all entries (after a successful flush)
    pub fn clear(&self) {
        let mut data = self.data.write();
        data.clear();
        self.size.store(0, Ordering::SeqCst);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
