//! KeyDir implementation

use std::collections::hash_map::{self, HashMap};

use super::KeyDirRecord;

/// Hash-keyed index of live records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDir {
    records: HashMap<u64, KeyDirRecord>,
}

impl KeyDir {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key_hash: u64) -> Option<&KeyDirRecord> {
        self.records.get(&key_hash)
    }

    /// Insert or overwrite the record for a hash, returning the previous one
    pub fn set(&mut self, key_hash: u64, record: KeyDirRecord) -> Option<KeyDirRecord> {
        self.records.insert(key_hash, record)
    }

    /// Drop a record. Only recovery uses this, for pointers into missing bytes.
    pub(crate) fn remove(&mut self, key_hash: u64) -> Option<KeyDirRecord> {
        self.records.remove(&key_hash)
    }

    pub(crate) fn get_mut(&mut self, key_hash: u64) -> Option<&mut KeyDirRecord> {
        self.records.get_mut(&key_hash)
    }

    pub fn contains(&self, key_hash: u64) -> bool {
        self.records.contains_key(&key_hash)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over `(key_hash, record)` pairs in no particular order
    pub fn iter(&self) -> hash_map::Iter<'_, u64, KeyDirRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a KeyDir {
    type Item = (&'a u64, &'a KeyDirRecord);
    type IntoIter = hash_map::Iter<'a, u64, KeyDirRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
