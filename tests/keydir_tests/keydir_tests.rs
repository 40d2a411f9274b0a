//! Tests for KeyDir

use flowdb::keydir::{KeyDir, KeyDirRecord};

fn record(segment_id: u64, value_position: u64, timestamp: u64) -> KeyDirRecord {
    KeyDirRecord {
        segment_id,
        value_size: 40,
        value_position,
        timestamp,
    }
}

#[test]
fn test_new_keydir_is_empty() {
    let keydir = KeyDir::new();

    assert!(keydir.is_empty());
    assert_eq!(keydir.len(), 0);
    assert_eq!(keydir.get(1), None);
}

#[test]
fn test_set_and_get() {
    let mut keydir = KeyDir::new();

    assert_eq!(keydir.set(10, record(1, 0, 100)), None);

    assert!(keydir.contains(10));
    assert_eq!(keydir.get(10), Some(&record(1, 0, 100)));
    assert!(!keydir.contains(11));
}

#[test]
fn test_set_overwrites_previous_record() {
    let mut keydir = KeyDir::new();
    keydir.set(10, record(1, 0, 100));

    let previous = keydir.set(10, record(2, 80, 200));

    assert_eq!(previous, Some(record(1, 0, 100)));
    assert_eq!(keydir.len(), 1);
    assert_eq!(keydir.get(10), Some(&record(2, 80, 200)));
}

#[test]
fn test_iterate_all_records() {
    let mut keydir = KeyDir::new();
    for i in 0..10u64 {
        keydir.set(i, record(1, i * 40, i));
    }

    let mut positions: Vec<u64> = keydir.iter().map(|(_, r)| r.value_position).collect();
    positions.sort_unstable();

    assert_eq!(positions, (0..10u64).map(|i| i * 40).collect::<Vec<_>>());
    assert_eq!((&keydir).into_iter().count(), 10);
}

#[test]
fn test_clone_compares_equal() {
    let mut keydir = KeyDir::new();
    keydir.set(1, record(1, 0, 1));
    keydir.set(2, record(1, 40, 2));

    let snapshot = keydir.clone();
    assert_eq!(snapshot, keydir);

    keydir.set(2, record(1, 80, 3));
    assert_ne!(snapshot, keydir);
}
