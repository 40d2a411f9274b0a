//! Tests for index recovery
//!
//! These tests verify:
//! - Hint replay with last-write-wins
//! - Segment scan and hint regeneration when a hint file is missing
//! - Torn hint tails are cut back to whole records
//! - Records pointing at unreadable entries are dropped

use std::fs::{self, OpenOptions};
use std::io::Write;

use flowdb::format::{Entry, Hint, ENTRY_HEADER_SIZE, HINT_SIZE};
use flowdb::hash::hash;
use flowdb::storage::recovery::{rebuild_index, resolve_sizes};
use flowdb::storage::{Layout, SegmentManager};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Writes `a`, `b`, `a` into segment 1 and returns the layout
fn populated_layout() -> (TempDir, Layout) {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path().join("db"));

    let mut manager = SegmentManager::create(layout.clone(), 1 << 20).unwrap();
    for (ts, key, value) in [(1u64, "a", "one"), (2, "b", "two"), (3, "a", "three")] {
        let entry = Entry::new(ts, key.as_bytes().to_vec(), value.as_bytes().to_vec());
        manager.append(&entry, hash(&entry.key)).unwrap();
    }
    manager.close().unwrap();

    (temp_dir, layout)
}

fn append_bytes(path: &std::path::Path, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
}

/// On-disk length of a test entry (all keys here are one byte)
fn entry_len(value: &str) -> u64 {
    (ENTRY_HEADER_SIZE + 1 + value.len()) as u64
}

// =============================================================================
// Hint Replay Tests
// =============================================================================

#[test]
fn test_replay_hints_last_write_wins() {
    let (_temp, layout) = populated_layout();

    let (keydir, result) = rebuild_index(&layout, 1).unwrap();

    assert_eq!(keydir.len(), 2);
    assert_eq!(result.hint_files, 1);
    assert_eq!(result.segments_scanned, 0);
    assert_eq!(result.records_applied, 3);

    let a = keydir.get(hash(b"a")).unwrap();
    assert_eq!(a.segment_id, 1);
    assert_eq!(a.timestamp, 3);
    assert_eq!(a.value_position, entry_len("one") + entry_len("two"));
    // Hints carry no sizes
    assert_eq!(a.value_size, 0);

    let b = keydir.get(hash(b"b")).unwrap();
    assert_eq!(b.value_position, entry_len("one"));
}

#[test]
fn test_resolve_sizes_fills_entry_lengths() {
    let (_temp, layout) = populated_layout();
    let (mut keydir, mut result) = rebuild_index(&layout, 1).unwrap();
    let manager = SegmentManager::resume(layout, 1 << 20, 1, vec![1]).unwrap();

    resolve_sizes(&mut keydir, &manager, &mut result).unwrap();

    assert_eq!(result.records_dropped, 0);
    assert_eq!(keydir.get(hash(b"a")).unwrap().value_size as u64, entry_len("three"));
    assert_eq!(keydir.get(hash(b"b")).unwrap().value_size as u64, entry_len("two"));
}

#[test]
fn test_empty_hint_file() {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path());
    SegmentManager::create(layout.clone(), 1024).unwrap().close().unwrap();

    let (keydir, result) = rebuild_index(&layout, 1).unwrap();

    assert!(keydir.is_empty());
    assert_eq!(result.hint_files, 1);
    assert_eq!(result.records_applied, 0);
}

// =============================================================================
// Missing Hint Tests
// =============================================================================

#[test]
fn test_missing_hint_scans_segment_and_regenerates() {
    let (_temp, layout) = populated_layout();
    let original_hints = fs::read(layout.hint_path(1)).unwrap();
    fs::remove_file(layout.hint_path(1)).unwrap();

    let (keydir, result) = rebuild_index(&layout, 1).unwrap();

    assert_eq!(result.hint_files, 0);
    assert_eq!(result.segments_scanned, 1);
    assert_eq!(result.records_applied, 3);
    assert_eq!(keydir.len(), 2);

    // The scan knows entry lengths directly
    let a = keydir.get(hash(b"a")).unwrap();
    assert_eq!(a.value_size as u64, entry_len("three"));

    assert_eq!(fs::read(layout.hint_path(1)).unwrap(), original_hints);
}

#[test]
fn test_scan_stops_at_partial_entry() {
    let (_temp, layout) = populated_layout();
    fs::remove_file(layout.hint_path(1)).unwrap();
    append_bytes(&layout.segment_path(1), &[0u8; 10]);

    let (keydir, result) = rebuild_index(&layout, 1).unwrap();

    assert_eq!(result.records_applied, 3);
    assert_eq!(keydir.len(), 2);
    let hints = fs::metadata(layout.hint_path(1)).unwrap().len();
    assert_eq!(hints as usize, 3 * HINT_SIZE);
}

#[test]
fn test_scan_stops_at_corrupt_entry() {
    let (_temp, layout) = populated_layout();
    fs::remove_file(layout.hint_path(1)).unwrap();

    // Flip a value byte in the second entry
    let mut segment = fs::read(layout.segment_path(1)).unwrap();
    let second_value = (entry_len("one") as usize) + ENTRY_HEADER_SIZE + 1;
    segment[second_value] ^= 0xFF;
    fs::write(layout.segment_path(1), &segment).unwrap();

    let (keydir, result) = rebuild_index(&layout, 1).unwrap();

    assert_eq!(result.records_applied, 1);
    assert_eq!(keydir.len(), 1);
    assert_eq!(keydir.get(hash(b"a")).unwrap().timestamp, 1);
}

// =============================================================================
// Torn Hint Tests
// =============================================================================

#[test]
fn test_torn_hint_tail_is_truncated() {
    let (_temp, layout) = populated_layout();
    append_bytes(&layout.hint_path(1), &[0xAB; 7]);

    let (keydir, result) = rebuild_index(&layout, 1).unwrap();

    assert_eq!(result.torn_hint_files, 1);
    assert_eq!(result.records_applied, 3);
    assert_eq!(keydir.len(), 2);
    let hints = fs::metadata(layout.hint_path(1)).unwrap().len();
    assert_eq!(hints as usize, 3 * HINT_SIZE);
}

// =============================================================================
// Dropped Record Tests
// =============================================================================

#[test]
fn test_hint_past_end_of_segment_is_dropped() {
    let (_temp, layout) = populated_layout();
    append_bytes(&layout.hint_path(1), &Hint::new(9, 4096, hash(b"ghost")).encode());

    let (mut keydir, mut result) = rebuild_index(&layout, 1).unwrap();
    assert_eq!(keydir.len(), 3);

    let manager = SegmentManager::resume(layout, 1 << 20, 1, vec![1]).unwrap();
    resolve_sizes(&mut keydir, &manager, &mut result).unwrap();

    assert_eq!(result.records_dropped, 1);
    assert_eq!(keydir.len(), 2);
    assert!(!keydir.contains(hash(b"ghost")));
}

#[test]
fn test_hint_into_missing_segment_is_dropped() {
    let (_temp, layout) = populated_layout();
    fs::write(layout.hint_path(2), Hint::new(9, 0, hash(b"lost")).encode()).unwrap();

    let (mut keydir, mut result) = rebuild_index(&layout, 1).unwrap();
    assert_eq!(keydir.get(hash(b"lost")).unwrap().segment_id, 2);

    let referenced: Vec<u64> = keydir.iter().map(|(_, r)| r.segment_id).collect();
    let manager = SegmentManager::resume(layout, 1 << 20, 1, referenced).unwrap();
    resolve_sizes(&mut keydir, &manager, &mut result).unwrap();

    assert_eq!(result.records_dropped, 1);
    assert!(!keydir.contains(hash(b"lost")));
    assert_eq!(keydir.len(), 2);
}
