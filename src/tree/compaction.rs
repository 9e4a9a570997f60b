//! Level compaction
//!
//! A level is merged as a whole: its tables are replayed oldest to newest
//! into a MemTable, so for every key the newest table's entry survives, and
//! the result is written as one table in the next level. Tables already in
//! the destination level are left alone; the new table gets the highest
//! creation index there and shadows them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info};

use crate::entry::Entry;
use crate::error::{Result, StrataError};
use crate::memtable::MemTable;

use super::{TableNode, TableTree, LEVEL_COUNT, TERMINAL_LEVEL};

/// Holds a level's in-progress flag for the duration of one compaction
struct CompactionGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CompactionGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CompactionGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl TableTree {
    /// Compact every level over its table count or byte capacity
    ///
    /// Levels are visited from 0 upward, so data pushed into level N+1 is
    /// checked in the same pass. Returns the number of levels compacted.
    pub fn check_and_compact(&self) -> Result<usize> {
        let mut compacted = 0;
        for level in 0..LEVEL_COUNT {
            let (count, size) = {
                let levels = self.levels.read();
                (levels[level].len(), levels[level].size())
            };
            if !self.needs_compaction(level, count, size) {
                continue;
            }

            debug!(
                level,
                count,
                size,
                capacity = self.capacities[level],
                "level over threshold"
            );
            if self.compact_level(level)? {
                compacted += 1;
            }
        }
        Ok(compacted)
    }

    fn needs_compaction(&self, level: usize, count: usize, size: u64) -> bool {
        let over = count > self.part_size || size > self.capacities[level];
        // Rewriting a lone terminal table gains nothing
        if level == TERMINAL_LEVEL {
            return over && count > 1;
        }
        over
    }

    /// Merge all tables of `level` into one table in the next level
    ///
    /// Returns `false` without doing anything when the level is empty or
    /// another compaction of the same level is running. Compacting the
    /// terminal level also holds the flag of the level above it. Tombstones are
    /// dropped only when the terminal level is merged into itself, since no
    /// older data can exist below it.
    pub fn compact_level(&self, level: usize) -> Result<bool> {
        if level >= LEVEL_COUNT {
            return Err(StrataError::Storage(format!(
                "level {} out of range (0..{})",
                level, LEVEL_COUNT
            )));
        }

        let Some(_guard) = CompactionGuard::acquire(&self.compacting[level]) else {
            debug!(level, "compaction already running");
            return Ok(false);
        };
        // The terminal merge gets the highest index in its level, so no
        // feeder compaction may land a table there while it runs
        let _feeder_guard = if level == TERMINAL_LEVEL {
            match CompactionGuard::acquire(&self.compacting[TERMINAL_LEVEL - 1]) {
                Some(guard) => Some(guard),
                None => {
                    debug!(level, "level {} is being compacted into this one", TERMINAL_LEVEL - 1);
                    return Ok(false);
                }
            }
        } else {
            None
        };

        let inputs: Vec<TableNode> = self.levels.read()[level].nodes().to_vec();
        if inputs.is_empty() {
            return Ok(false);
        }

        let started = Instant::now();
        let target = (level + 1).min(TERMINAL_LEVEL);
        info!(level, target, tables = inputs.len(), "compacting level");

        let merged = MemTable::new();
        for node in &inputs {
            for entry in node.table.entries()? {
                merged.apply(entry);
            }
        }

        let purge_tombstones = level == TERMINAL_LEVEL;
        let entries: Vec<Entry> = merged
            .into_entries()
            .into_iter()
            .filter(|entry| !(purge_tombstones && entry.deleted))
            .collect();
        let entry_count = entries.len();

        let output = if entries.is_empty() {
            None
        } else {
            Some(self.create_table(entries, target)?)
        };

        let merged_indices: Vec<u64> = inputs.iter().map(|node| node.index).collect();
        let removed = self.levels.write()[level].remove(&merged_indices);
        for node in &removed {
            node.table.mark_obsolete();
        }

        info!(
            level,
            target,
            inputs = merged_indices.len(),
            entries = entry_count,
            output_index = ?output,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compaction finished"
        );
        Ok(true)
    }

    /// Whether a compaction of `level` is running right now
    pub fn is_compacting(&self, level: usize) -> bool {
        self.compacting
            .get(level)
            .map_or(false, |flag| flag.load(Ordering::Acquire))
    }
}
