//! Tests for SegmentManager
//!
//! These tests verify:
//! - Cold start creates the layout and segment 1
//! - Appends land at increasing offsets with one hint each
//! - Rotation at the size cap, with old segments kept readable
//! - Resuming appends at the end of an existing segment

use std::fs;

use flowdb::format::{Entry, HINT_SIZE};
use flowdb::hash::hash;
use flowdb::storage::{Layout, SegmentManager};
use flowdb::FlowError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_layout() -> (TempDir, Layout) {
    let temp_dir = TempDir::new().unwrap();
    let layout = Layout::new(temp_dir.path().join("db"));
    (temp_dir, layout)
}

fn entry(i: usize) -> Entry {
    Entry::new(
        i as u64,
        format!("key{}", i).into_bytes(),
        format!("value{}", i).into_bytes(),
    )
}

// =============================================================================
// Create Tests
// =============================================================================

#[test]
fn test_create_makes_first_segment() {
    let (_temp, layout) = setup_temp_layout();

    let manager = SegmentManager::create(layout.clone(), 1024).unwrap();

    assert!(layout.segment_path(1).exists());
    assert!(layout.hint_path(1).exists());
    assert_eq!(manager.active_id(), 1);
    assert_eq!(manager.active_offset(), 0);
    assert_eq!(manager.segment_count(), 1);
    assert!(manager.segment(1).unwrap().is_writable());
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_append_positions_and_sizes() {
    let (_temp, layout) = setup_temp_layout();
    let mut manager = SegmentManager::create(layout.clone(), 1 << 20).unwrap();

    let first = entry(1);
    let second = entry(2);
    let a = manager.append(&first, hash(&first.key)).unwrap();
    let b = manager.append(&second, hash(&second.key)).unwrap();

    assert_eq!(a.segment_id, 1);
    assert_eq!(a.position, 0);
    assert_eq!(a.size as usize, first.encoded_len());
    assert_eq!(b.position, a.size as u64);
    assert_eq!(manager.active_offset(), (a.size + b.size) as u64);

    let on_disk = fs::metadata(layout.segment_path(1)).unwrap().len();
    assert_eq!(on_disk, manager.active_offset());
}

#[test]
fn test_append_writes_one_hint_per_entry() {
    let (_temp, layout) = setup_temp_layout();
    let mut manager = SegmentManager::create(layout.clone(), 1 << 20).unwrap();

    for i in 0..5 {
        let e = entry(i);
        manager.append(&e, hash(&e.key)).unwrap();
    }
    manager.sync().unwrap();

    let hints = fs::metadata(layout.hint_path(1)).unwrap().len();
    assert_eq!(hints as usize, 5 * HINT_SIZE);
}

#[test]
fn test_read_back_appended_entries() {
    let (_temp, layout) = setup_temp_layout();
    let mut manager = SegmentManager::create(layout, 1 << 20).unwrap();

    let mut placed = Vec::new();
    for i in 0..10 {
        let e = entry(i);
        let at = manager.append(&e, hash(&e.key)).unwrap();
        placed.push((e, at));
    }

    for (e, at) in placed {
        let read = manager.read_entry(at.segment_id, at.position).unwrap();
        assert_eq!(read, e);
    }
}

#[test]
fn test_read_unknown_segment() {
    let (_temp, layout) = setup_temp_layout();
    let manager = SegmentManager::create(layout, 1024).unwrap();

    let result = manager.read_entry(9, 0);

    assert!(matches!(result, Err(FlowError::SegmentMissing(9))));
}

#[test]
fn test_read_past_end_is_truncated() {
    let (_temp, layout) = setup_temp_layout();
    let mut manager = SegmentManager::create(layout, 1024).unwrap();
    let e = entry(1);
    manager.append(&e, hash(&e.key)).unwrap();

    let result = manager.read_entry(1, 1000);

    assert!(matches!(result, Err(FlowError::Truncated(_))));
}

// =============================================================================
// Rotation Tests
// =============================================================================

#[test]
fn test_rotation_at_cap() {
    let (_temp, layout) = setup_temp_layout();
    // Each entry is 24 + 4 + 6 = 34 bytes; three fill past 100
    let mut manager = SegmentManager::create(layout.clone(), 100).unwrap();

    let mut placed = Vec::new();
    for i in 0..7 {
        let e = entry(i);
        let at = manager.append(&e, hash(&e.key)).unwrap();
        placed.push((e, at));
    }

    assert_eq!(manager.active_id(), 3);
    assert_eq!(manager.segment_count(), 3);
    assert!(!manager.segment(1).unwrap().is_writable());
    assert!(!manager.segment(2).unwrap().is_writable());
    assert!(manager.segment(3).unwrap().is_writable());

    // Rotation happens between entries, so each segment holds whole entries
    let segment_ids: Vec<u64> = placed.iter().map(|(_, at)| at.segment_id).collect();
    assert_eq!(segment_ids, vec![1, 1, 1, 2, 2, 2, 3]);
    assert_eq!(fs::metadata(layout.segment_path(1)).unwrap().len(), 102);

    for (e, at) in placed {
        assert_eq!(manager.read_entry(at.segment_id, at.position).unwrap(), e);
    }
}

#[test]
fn test_rotation_creates_matching_hint_files() {
    let (_temp, layout) = setup_temp_layout();
    let mut manager = SegmentManager::create(layout.clone(), 100).unwrap();

    for i in 0..4 {
        let e = entry(i);
        manager.append(&e, hash(&e.key)).unwrap();
    }
    manager.sync().unwrap();

    assert_eq!(layout.hint_ids().unwrap(), vec![1, 2]);
    assert_eq!(fs::metadata(layout.hint_path(1)).unwrap().len() as usize, 3 * HINT_SIZE);
    assert_eq!(fs::metadata(layout.hint_path(2)).unwrap().len() as usize, HINT_SIZE);
}

#[test]
fn test_manual_rotate() {
    let (_temp, layout) = setup_temp_layout();
    let mut manager = SegmentManager::create(layout, 1 << 20).unwrap();
    let e = entry(1);
    manager.append(&e, hash(&e.key)).unwrap();

    manager.rotate().unwrap();

    assert_eq!(manager.active_id(), 2);
    assert_eq!(manager.active_offset(), 0);
    assert_eq!(manager.read_entry(1, 0).unwrap(), e);
}

// =============================================================================
// Resume Tests
// =============================================================================

#[test]
fn test_resume_appends_at_end_of_file() {
    let (_temp, layout) = setup_temp_layout();
    let first_end;
    {
        let mut manager = SegmentManager::create(layout.clone(), 1 << 20).unwrap();
        for i in 0..3 {
            let e = entry(i);
            manager.append(&e, hash(&e.key)).unwrap();
        }
        first_end = manager.active_offset();
        manager.close().unwrap();
    }

    let mut manager = SegmentManager::resume(layout.clone(), 1 << 20, 1, vec![1]).unwrap();
    assert_eq!(manager.active_id(), 1);
    assert_eq!(manager.active_offset(), first_end);

    let e = entry(3);
    let at = manager.append(&e, hash(&e.key)).unwrap();
    assert_eq!(at.position, first_end);
    assert_eq!(manager.read_entry(1, 0).unwrap(), entry(0));
    assert_eq!(manager.read_entry(1, first_end).unwrap(), e);
}

#[test]
fn test_resume_skips_missing_referenced_segment() {
    let (_temp, layout) = setup_temp_layout();
    layout.create_dirs().unwrap();
    fs::write(layout.segment_path(2), b"").unwrap();

    let manager = SegmentManager::resume(layout, 1024, 2, vec![1, 2]).unwrap();

    assert!(!manager.contains(1));
    assert!(manager.contains(2));
    assert_eq!(manager.active_id(), 2);
}

// =============================================================================
// Failed Write Tests
// =============================================================================

/// Point `path` at a device where every write fails with "no space"
#[cfg(target_os = "linux")]
fn link_to_full_device(path: &std::path::Path) -> bool {
    let device = std::path::Path::new("/dev/full");
    device.exists() && std::os::unix::fs::symlink(device, path).is_ok()
}

#[cfg(target_os = "linux")]
#[test]
fn test_failed_hint_write_removes_entry() {
    let (_temp, layout) = setup_temp_layout();
    layout.create_dirs().unwrap();
    if !link_to_full_device(&layout.hint_path(1)) {
        return;
    }
    let mut manager = SegmentManager::create(layout.clone(), 1 << 20).unwrap();

    let e = entry(1);
    let result = manager.append(&e, hash(&e.key));

    assert!(matches!(result, Err(FlowError::Io(_))));
    assert_eq!(manager.active_offset(), 0);
    assert_eq!(fs::metadata(layout.segment_path(1)).unwrap().len(), 0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_failed_entry_write_keeps_offset_at_file_end() {
    let (_temp, layout) = setup_temp_layout();
    layout.create_dirs().unwrap();
    if !link_to_full_device(&layout.segment_path(2)) {
        return;
    }
    let mut manager = SegmentManager::create(layout.clone(), 100).unwrap();
    for i in 0..3 {
        let e = entry(i);
        manager.append(&e, hash(&e.key)).unwrap();
    }

    // The fourth entry rotates into segment 2, which cannot take writes
    let e = entry(3);
    let result = manager.append(&e, hash(&e.key));

    assert!(matches!(result, Err(FlowError::Io(_))));
    assert_eq!(manager.active_id(), 2);
    assert_eq!(manager.active_offset(), 0);
    assert_eq!(fs::metadata(layout.hint_path(2)).unwrap().len(), 0);
    assert_eq!(manager.read_entry(1, 0).unwrap(), entry(0));
}
