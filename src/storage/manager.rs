//! Segment Manager
//!
//! Owns the directory layout, the active segment and its hint file, and the
//! registry of every open segment.
//!
//! ## Responsibilities
//! - Cold start: create `data/`, `hint/` and segment 1
//! - Resume: reopen the segments an index refers to, then the latest one
//!   as the active file, appending from its current end
//! - Append an entry and its hint; rotate at the size cap
//! - Positional reads from any open segment

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};

use tracing::{debug, info, warn};

use crate::error::{FlowError, Result};
use crate::format::{Entry, Hint, HINT_SIZE};

use super::append_log::append_record;
use super::{Layout, Segment};

/// Where an appended entry landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendResult {
    pub segment_id: u64,
    pub position: u64,
    pub size: u32,
}

/// Manages the segment files of one database
///
/// ## Concurrency:
/// No internal locking. The engine wraps the manager in its RwLock; reads
/// take `&self`, appends and rotation take `&mut self`.
#[derive(Debug)]
pub struct SegmentManager {
    layout: Layout,

    /// Rotation cap for the active segment
    max_segment_size: u64,

    /// Every open segment, keyed by id. The highest id is the active one.
    segments: BTreeMap<u64, Segment>,

    /// Id of the segment accepting appends
    active_id: u64,

    /// Write offset in the active segment (its current length)
    active_offset: u64,

    /// Hint file paired with the active segment
    active_hint: File,

    /// Length of the active hint file (always whole records)
    hint_len: u64,
}

impl SegmentManager {
    /// Cold start: create the layout and segment 1
    pub fn create(layout: Layout, max_segment_size: u64) -> Result<Self> {
        layout.create_dirs()?;

        let active = Segment::open_append(&layout.segment_path(1), 1)?;
        let active_offset = active.len()?;
        let (active_hint, hint_len) = open_hint(&layout, 1)?;

        let mut segments = BTreeMap::new();
        segments.insert(1, active);

        debug!(root = %layout.root().display(), "Created segment 1");

        Ok(Self {
            layout,
            max_segment_size,
            segments,
            active_id: 1,
            active_offset,
            active_hint,
            hint_len,
        })
    }

    /// Reopen an existing database after its index has been rebuilt
    ///
    /// `referenced` are the segment ids the index points into. Those that
    /// still exist on disk are opened read-only; `latest_id` is reopened in
    /// append mode and writes continue at its end-of-file offset.
    pub fn resume(
        layout: Layout,
        max_segment_size: u64,
        latest_id: u64,
        referenced: impl IntoIterator<Item = u64>,
    ) -> Result<Self> {
        layout.create_dirs()?;

        let mut segments = BTreeMap::new();
        for id in referenced {
            if id == latest_id || segments.contains_key(&id) {
                continue;
            }
            let path = layout.segment_path(id);
            if !path.exists() {
                warn!(segment = id, "Index refers to a segment that is missing on disk");
                continue;
            }
            segments.insert(id, Segment::open_read_only(&path, id)?);
        }

        let active = Segment::open_append(&layout.segment_path(latest_id), latest_id)?;
        let active_offset = active.len()?;
        segments.insert(latest_id, active);
        let (active_hint, hint_len) = open_hint(&layout, latest_id)?;

        info!(
            active_segment = latest_id,
            active_offset,
            open_segments = segments.len(),
            "Resumed segments"
        );

        Ok(Self {
            layout,
            max_segment_size,
            segments,
            active_id: latest_id,
            active_offset,
            active_hint,
            hint_len,
        })
    }

    /// Append an entry to the active segment and its hint to the hint file
    ///
    /// Rotates first if the active segment has reached the cap, so an entry
    /// never straddles two segments. A failed write leaves neither file with
    /// a partial record.
    pub fn append(&mut self, entry: &Entry, key_hash: u64) -> Result<AppendResult> {
        if self.active_offset >= self.max_segment_size {
            self.rotate()?;
        }

        let bytes = entry.encode()?;
        let size = u32::try_from(bytes.len()).map_err(|_| {
            FlowError::CapacityExceeded(format!("entry of {} bytes", bytes.len()))
        })?;
        if u64::from(size) > self.max_segment_size {
            warn!(
                size,
                max_segment_size = self.max_segment_size,
                "Entry is larger than the segment cap"
            );
        }

        let position = self.active_offset;
        let active_id = self.active_id;
        let write = self.active_mut()?.append(position, &bytes);
        if let Err(e) = write {
            self.resync_offset();
            return Err(e);
        }
        self.active_offset += u64::from(size);

        let hint = Hint::new(entry.timestamp, position, key_hash);
        if let Err(e) = append_record(&mut self.active_hint, self.hint_len, &hint.encode()) {
            // An entry without a hint is skipped on reload; remove it so the
            // segment and its hint file stay in step.
            if let Err(cut) = self.active_mut().and_then(|segment| segment.truncate(position)) {
                warn!(segment = active_id, position, error = %cut, "Could not remove unhinted entry");
            }
            self.resync_offset();
            return Err(e.into());
        }
        self.hint_len += HINT_SIZE as u64;

        Ok(AppendResult {
            segment_id: active_id,
            position,
            size,
        })
    }

    /// Close the active segment for writes and start the next one
    pub fn rotate(&mut self) -> Result<()> {
        let old_id = self.active_id;
        let old_size = self.active_offset;

        self.sync()?;
        let read_only = Segment::open_read_only(&self.layout.segment_path(old_id), old_id)?;
        self.segments.insert(old_id, read_only);

        let new_id = old_id + 1;
        let active = Segment::open_append(&self.layout.segment_path(new_id), new_id)?;
        let active_offset = active.len()?;
        let (active_hint, hint_len) = open_hint(&self.layout, new_id)?;
        self.active_hint = active_hint;
        self.hint_len = hint_len;
        self.segments.insert(new_id, active);
        self.active_id = new_id;
        self.active_offset = active_offset;

        info!(old_segment = old_id, old_size, new_segment = new_id, "Rotated active segment");
        Ok(())
    }

    /// fsync the active segment and its hint file
    pub fn sync(&self) -> Result<()> {
        self.active()?.sync()?;
        self.active_hint.sync_data()?;
        Ok(())
    }

    /// Read the entry at `position` in segment `segment_id`
    pub fn read_entry(&self, segment_id: u64, position: u64) -> Result<Entry> {
        self.segment(segment_id)?.read_entry(position)
    }

    pub fn segment(&self, id: u64) -> Result<&Segment> {
        self.segments.get(&id).ok_or(FlowError::SegmentMissing(id))
    }

    pub fn contains(&self, id: u64) -> bool {
        self.segments.contains_key(&id)
    }

    /// Sync and release every handle
    pub fn close(self) -> Result<()> {
        self.sync()?;
        debug!(segments = self.segments.len(), "Closing segments");
        Ok(())
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn active_id(&self) -> u64 {
        self.active_id
    }

    pub fn active_offset(&self) -> u64 {
        self.active_offset
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn max_segment_size(&self) -> u64 {
        self.max_segment_size
    }

    /// Re-read the active offset after a failed write, so it matches the
    /// bytes actually on disk
    fn resync_offset(&mut self) {
        match self.active().and_then(Segment::len) {
            Ok(len) => self.active_offset = len,
            Err(e) => warn!(segment = self.active_id, error = %e, "Could not read segment length"),
        }
    }

    fn active(&self) -> Result<&Segment> {
        self.segment(self.active_id)
    }

    fn active_mut(&mut self) -> Result<&mut Segment> {
        self.segments
            .get_mut(&self.active_id)
            .ok_or(FlowError::SegmentMissing(self.active_id))
    }
}

fn open_hint(layout: &Layout, id: u64) -> Result<(File, u64)> {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(layout.hint_path(id))?;
    let len = file.metadata()?.len();
    Ok((file, len))
}
