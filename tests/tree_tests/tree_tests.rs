//! Tests for the TableTree
//!
//! These tests verify:
//! - Table naming and creation indices
//! - Lookup order across and within levels
//! - Level compaction (newest wins, tombstones, file cleanup)
//! - Loading an existing directory
//! - Reads while a compaction runs

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stratakv::tree::{TableTree, LEVEL_COUNT, TERMINAL_LEVEL};
use stratakv::{Config, Entry, Lookup, StrataError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(dir: &Path, part_size: usize) -> Config {
    Config::builder()
        .data_dir(dir)
        .part_size(part_size)
        .check_interval(Duration::ZERO)
        .build()
}

fn open_tree(dir: &TempDir) -> TableTree {
    TableTree::open(&test_config(dir.path(), 4)).unwrap()
}

fn put(key: &str, value: &str) -> Entry {
    Entry::new(key, value.as_bytes().to_vec())
}

fn found(value: &str) -> Lookup {
    Lookup::Found(value.as_bytes().to_vec())
}

// =============================================================================
// Insert Tests
// =============================================================================

#[test]
fn test_open_empty_directory() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    assert_eq!(tree.table_count(), 0);
    assert_eq!(tree.search("anything").unwrap(), Lookup::NotFound);
}

#[test]
fn test_create_table_names_file_by_level_and_index() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    let first = tree.create_table(vec![put("a", "1")], 0).unwrap();
    let second = tree.create_table(vec![put("b", "2")], 0).unwrap();
    let other_level = tree.create_table(vec![put("c", "3")], 3).unwrap();

    assert_eq!((first, second, other_level), (0, 1, 0));
    assert!(dir.path().join("0.0.db").exists());
    assert!(dir.path().join("0.1.db").exists());
    assert!(dir.path().join("3.0.db").exists());
    assert_eq!(tree.level_count(0), 2);
    assert_eq!(tree.level_count(3), 1);
    assert_eq!(tree.next_index(0), 2);
}

#[test]
fn test_insert_beyond_last_level_lands_in_terminal_level() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("a", "1")], LEVEL_COUNT + 5).unwrap();

    assert_eq!(tree.level_count(TERMINAL_LEVEL), 1);
    assert!(dir.path().join("9.0.db").exists());
}

#[test]
fn test_no_temporary_files_left_after_create() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("a", "1")], 0).unwrap();

    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

// =============================================================================
// Search Tests
// =============================================================================

#[test]
fn test_search_prefers_newest_table_in_level() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("k", "old"), put("only_old", "x")], 0).unwrap();
    tree.create_table(vec![put("k", "new")], 0).unwrap();

    assert_eq!(tree.search("k").unwrap(), found("new"));
    assert_eq!(tree.search("only_old").unwrap(), found("x"));
}

#[test]
fn test_search_prefers_lower_level() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("k", "deep")], 2).unwrap();
    tree.create_table(vec![put("k", "shallow")], 0).unwrap();

    assert_eq!(tree.search("k").unwrap(), found("shallow"));
}

#[test]
fn test_tombstone_in_newer_table_shadows_older_value() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("k", "v")], 1).unwrap();
    tree.create_table(vec![Entry::tombstone("k")], 0).unwrap();

    assert_eq!(tree.search("k").unwrap(), Lookup::Tombstoned);
}

// =============================================================================
// Compaction Tests
// =============================================================================

#[test]
fn test_compaction_keeps_newest_value() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("k", "1"), put("a", "first")], 0).unwrap();
    tree.create_table(vec![put("k", "2")], 0).unwrap();

    assert!(tree.compact_level(0).unwrap());

    assert_eq!(tree.level_count(0), 0);
    assert_eq!(tree.level_count(1), 1);
    assert_eq!(tree.search("k").unwrap(), found("2"));
    assert_eq!(tree.search("a").unwrap(), found("first"));

    let merged = &tree.nodes(1)[0];
    assert_eq!(merged.table.entries().unwrap(), vec![put("a", "first"), put("k", "2")]);
}

#[test]
fn test_compaction_keeps_tombstones_above_terminal_level() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("k", "v")], 2).unwrap();
    tree.create_table(vec![put("k", "v0")], 0).unwrap();
    tree.create_table(vec![Entry::tombstone("k")], 0).unwrap();

    tree.compact_level(0).unwrap();

    // The merged tombstone must still hide level 2
    assert_eq!(tree.search("k").unwrap(), Lookup::Tombstoned);
    assert_eq!(tree.nodes(1)[0].table.entries().unwrap(), vec![Entry::tombstone("k")]);
}

#[test]
fn test_compaction_output_shadows_destination_tables() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("k", "in level 1")], 1).unwrap();
    tree.create_table(vec![put("k", "from level 0")], 0).unwrap();

    tree.compact_level(0).unwrap();

    assert_eq!(tree.level_count(1), 2);
    assert_eq!(tree.search("k").unwrap(), found("from level 0"));
}

#[test]
fn test_compaction_removes_input_files() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("a", "1")], 0).unwrap();
    tree.create_table(vec![put("b", "2")], 0).unwrap();

    tree.compact_level(0).unwrap();

    assert!(!dir.path().join("0.0.db").exists());
    assert!(!dir.path().join("0.1.db").exists());
    assert!(dir.path().join("1.0.db").exists());
}

#[test]
fn test_compact_empty_level_is_noop() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    assert!(!tree.compact_level(4).unwrap());
    assert_eq!(tree.table_count(), 0);
}

#[test]
fn test_compact_level_out_of_range() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    let err = tree.compact_level(LEVEL_COUNT).unwrap_err();

    assert!(matches!(err, StrataError::Storage(_)));
}

#[test]
fn test_terminal_level_compacts_into_itself_and_purges_tombstones() {
    let dir = TempDir::new().unwrap();
    let tree = open_tree(&dir);

    tree.create_table(vec![put("gone", "v"), put("kept", "v")], TERMINAL_LEVEL).unwrap();
    tree.create_table(vec![Entry::tombstone("gone")], TERMINAL_LEVEL).unwrap();

    assert!(tree.compact_level(TERMINAL_LEVEL).unwrap());

    let nodes = tree.nodes(TERMINAL_LEVEL);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].index, 2);
    assert_eq!(nodes[0].table.entries().unwrap(), vec![put("kept", "v")]);
    assert_eq!(tree.search("gone").unwrap(), Lookup::NotFound);
}

#[test]
fn test_check_and_compact_respects_part_size() {
    let dir = TempDir::new().unwrap();
    let tree = TableTree::open(&test_config(dir.path(), 2)).unwrap();

    for i in 0..3 {
        tree.create_table(vec![put(&format!("key{}", i), "v")], 0).unwrap();
    }
    assert_eq!(tree.level_count(0), 3);

    let compacted = tree.check_and_compact().unwrap();

    assert_eq!(compacted, 1);
    assert!(tree.level_count(0) <= tree.part_size());
    assert_eq!(tree.level_count(1), 1);
    for i in 0..3 {
        assert_eq!(tree.search(&format!("key{}", i)).unwrap(), found("v"));
    }
}

#[test]
fn test_check_and_compact_respects_level_capacity() {
    let dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(dir.path())
        .level0_size(64)
        .part_size(100)
        .check_interval(Duration::ZERO)
        .build();
    let tree = TableTree::open(&config).unwrap();

    tree.create_table(vec![put("big", &"x".repeat(200))], 0).unwrap();
    assert!(tree.level_size(0) > tree.level_capacity(0));

    tree.check_and_compact().unwrap();

    assert_eq!(tree.level_count(0), 0);
    assert!(tree.level_size(1) <= tree.level_capacity(1));
    assert_eq!(tree.search("big").unwrap(), Lookup::Found(vec![b'x'; 200]));
}

// =============================================================================
// Load Tests
// =============================================================================

#[test]
fn test_reload_restores_levels_and_indices() {
    let dir = TempDir::new().unwrap();
    {
        let tree = open_tree(&dir);
        tree.create_table(vec![put("k", "old")], 0).unwrap();
        tree.create_table(vec![put("k", "new")], 0).unwrap();
        tree.create_table(vec![put("deep", "v")], 5).unwrap();
    }

    let tree = open_tree(&dir);

    assert_eq!(tree.level_count(0), 2);
    assert_eq!(tree.level_count(5), 1);
    assert_eq!(tree.next_index(0), 2);
    assert_eq!(tree.search("k").unwrap(), found("new"));
    assert_eq!(tree.search("deep").unwrap(), found("v"));

    assert_eq!(tree.create_table(vec![put("x", "y")], 0).unwrap(), 2);
}

#[test]
fn test_open_removes_unfinished_tables_and_ignores_foreign_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("pending-0-7.tmp"), b"half written").unwrap();
    fs::write(dir.path().join("wal.log"), b"").unwrap();
    fs::write(dir.path().join("notes.db"), b"not a table").unwrap();
    fs::write(dir.path().join("12.0.db"), b"beyond the last level").unwrap();

    let tree = open_tree(&dir);

    assert_eq!(tree.table_count(), 0);
    assert!(!dir.path().join("pending-0-7.tmp").exists());
    assert!(dir.path().join("wal.log").exists());
}

#[test]
fn test_open_fails_on_corrupt_table() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("0.0.db"), [0u8; 12]).unwrap();

    let err = TableTree::open(&test_config(dir.path(), 4)).err().unwrap();

    assert!(matches!(err, StrataError::CorruptMetadata { .. }));
    assert!(err.to_string().contains("0.0.db"));
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_search_during_compaction() {
    let dir = TempDir::new().unwrap();
    let tree = Arc::new(open_tree(&dir));

    for t in 0..4 {
        let entries = (0..200).map(|i| put(&format!("key{:04}", i), &format!("v{}", t)));
        tree.create_table(entries, 0).unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for round in 0..5 {
                    for i in (round..200).step_by(5) {
                        let lookup = tree.search(&format!("key{:04}", i)).unwrap();
                        assert_eq!(lookup, found("v3"));
                    }
                }
            })
        })
        .collect();

    tree.compact_level(0).unwrap();
    tree.compact_level(1).unwrap();

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(tree.level_count(2), 1);
}

#[test]
fn test_feeder_compaction_during_terminal_merge_keeps_newest() {
    let dir = TempDir::new().unwrap();
    let tree = Arc::new(open_tree(&dir));

    // Two large terminal tables so the terminal merge takes a while
    for _ in 0..2 {
        let bulk = (0..100_000).map(|i| put(&format!("bulk{:06}", i), "x"));
        let entries = bulk.chain([put("k", "old"), put("gone", "old")]);
        tree.create_table(entries, TERMINAL_LEVEL).unwrap();
    }
    tree.create_table(vec![put("k", "new"), Entry::tombstone("gone")], TERMINAL_LEVEL - 1)
        .unwrap();

    let terminal = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || tree.compact_level(TERMINAL_LEVEL).unwrap())
    };
    while !tree.is_compacting(TERMINAL_LEVEL) && !terminal.is_finished() {
        thread::yield_now();
    }

    // Either rejected while the terminal merge runs, or lands after it
    tree.compact_level(TERMINAL_LEVEL - 1).unwrap();
    terminal.join().unwrap();
    tree.compact_level(TERMINAL_LEVEL - 1).unwrap();

    assert_eq!(tree.level_count(TERMINAL_LEVEL - 1), 0);
    assert_eq!(tree.search("k").unwrap(), found("new"));
    assert!(!tree.search("gone").unwrap().is_found());
    assert_eq!(tree.search("bulk000042").unwrap(), found("x"));
}
