//! KeyDir Module
//!
//! In-memory index from key hash to the location of the newest entry.
//!
//! ## Responsibilities
//! - Point reads: hash → (segment, offset, size, timestamp)
//! - Overwrite on every put (no tombstones, keys are never removed)
//! - Rebuilt from hint files on startup, never persisted itself
//!
//! ## Data Structure Choice
//! A plain `HashMap<u64, KeyDirRecord>`:
//! - No ordering is needed (no range scans)
//! - No internal locking; the engine's RwLock guards it

mod table;

pub use table::KeyDir;

/// Location of the newest entry for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDirRecord {
    /// Segment holding the entry
    pub segment_id: u64,

    /// Encoded size of the whole entry (header + key + value)
    pub value_size: u32,

    /// Offset of the start of the entry within the segment
    pub value_position: u64,

    /// Write time in microseconds
    pub timestamp: u64,
}
