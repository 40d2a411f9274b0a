//! Index recovery
//!
//! Rebuilds the KeyDir from on-disk state after a restart.
//!
//! Hint files are the fast path: one fixed-size record per write, replayed
//! in segment order so later writes overwrite earlier ones. A segment whose
//! hint file is missing is scanned entry by entry instead, and its hint file
//! is regenerated.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read};

use tracing::{debug, info, warn};

use crate::error::{FlowError, Result};
use crate::format::{Entry, EntryHeader, Hint, ENTRY_HEADER_SIZE, HINT_SIZE};
use crate::hash;
use crate::keydir::{KeyDir, KeyDirRecord};

use super::{Layout, SegmentManager};

/// Statistics from one recovery run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Hint files replayed
    pub hint_files: usize,

    /// Segments rebuilt by a full scan (no hint file)
    pub segments_scanned: usize,

    /// Hint or entry records applied to the index
    pub records_applied: u64,

    /// Hint files whose partial tail was cut off
    pub torn_hint_files: usize,

    /// Index records dropped because their entry could not be read
    pub records_dropped: usize,
}

/// Replay hint files (or scan segments) for ids `1..=latest`
pub fn rebuild_index(layout: &Layout, latest_segment: u64) -> Result<(KeyDir, RecoveryResult)> {
    let latest_hint = layout.latest_hint_id()?.unwrap_or(0);
    let upper = latest_segment.max(latest_hint);

    let mut keydir = KeyDir::new();
    let mut result = RecoveryResult::default();

    for id in 1..=upper {
        let hint_path = layout.hint_path(id);
        if hint_path.exists() {
            replay_hint_file(layout, id, &mut keydir, &mut result)?;
        } else if layout.segment_path(id).exists() {
            scan_segment(layout, id, &mut keydir, &mut result)?;
        } else {
            debug!(segment = id, "No hint file or segment for id");
        }
    }

    info!(
        keys = keydir.len(),
        hint_files = result.hint_files,
        segments_scanned = result.segments_scanned,
        records = result.records_applied,
        "Rebuilt index"
    );
    Ok((keydir, result))
}

/// Fill in `value_size` for every record by reading its entry header
///
/// Hints carry no lengths, so the size is re-derived from the segment.
/// Records that point past the end of a segment, or into a segment that is
/// gone, are dropped.
pub fn resolve_sizes(
    keydir: &mut KeyDir,
    segments: &SegmentManager,
    result: &mut RecoveryResult,
) -> Result<()> {
    let mut resolved = Vec::new();

    for (&key_hash, record) in keydir.iter() {
        if record.value_size != 0 {
            continue;
        }
        let header = segments
            .segment(record.segment_id)
            .and_then(|segment| segment.read_header(record.value_position));
        match header {
            Ok(header) => resolved.push((key_hash, Some(header))),
            Err(FlowError::Truncated(_)) | Err(FlowError::SegmentMissing(_)) => {
                resolved.push((key_hash, None))
            }
            Err(e) => return Err(e),
        }
    }

    for (key_hash, header) in resolved {
        match header.and_then(|h| u32::try_from(h.entry_len()).ok()) {
            Some(size) => {
                if let Some(record) = keydir.get_mut(key_hash) {
                    record.value_size = size;
                }
            }
            None => {
                if let Some(record) = keydir.remove(key_hash) {
                    warn!(
                        segment = record.segment_id,
                        position = record.value_position,
                        "Dropping index record with unreadable entry"
                    );
                }
                result.records_dropped += 1;
            }
        }
    }
    Ok(())
}

fn replay_hint_file(
    layout: &Layout,
    id: u64,
    keydir: &mut KeyDir,
    result: &mut RecoveryResult,
) -> Result<()> {
    let path = layout.hint_path(id);
    let bytes = fs::read(&path)?;

    let chunks = bytes.chunks_exact(HINT_SIZE);
    let torn = chunks.remainder().len();
    for chunk in chunks {
        let hint = Hint::decode(chunk)?;
        keydir.set(
            hint.key_hash,
            KeyDirRecord {
                segment_id: id,
                value_size: 0,
                value_position: hint.value_position,
                timestamp: hint.timestamp,
            },
        );
        result.records_applied += 1;
    }

    if torn > 0 {
        let whole = (bytes.len() - torn) as u64;
        warn!(hint = id, torn_bytes = torn, "Cutting partial record from hint file");
        OpenOptions::new().write(true).open(&path)?.set_len(whole)?;
        result.torn_hint_files += 1;
    }

    result.hint_files += 1;
    debug!(hint = id, records = bytes.len() / HINT_SIZE, "Replayed hint file");
    Ok(())
}

fn scan_segment(
    layout: &Layout,
    id: u64,
    keydir: &mut KeyDir,
    result: &mut RecoveryResult,
) -> Result<()> {
    warn!(segment = id, "Hint file missing, scanning segment");

    let file = File::open(layout.segment_path(id))?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut hints = Vec::new();
    let mut position = 0u64;

    loop {
        let mut header_buf = [0u8; ENTRY_HEADER_SIZE];
        let read = read_full(&mut reader, &mut header_buf)?;
        if read == 0 {
            break;
        }
        if read < ENTRY_HEADER_SIZE {
            warn!(segment = id, position, "Partial entry header at end of segment");
            break;
        }

        let header = EntryHeader::decode(&header_buf)?;
        let entry_len = header.entry_len();
        if position + entry_len > file_len {
            warn!(segment = id, position, entry_len, "Entry runs past end of segment");
            break;
        }
        let mut record = header_buf.to_vec();
        record.resize(entry_len as usize, 0);
        let body_read = read_full(&mut reader, &mut record[ENTRY_HEADER_SIZE..])?;
        if body_read < record.len() - ENTRY_HEADER_SIZE {
            warn!(segment = id, position, "Partial entry at end of segment");
            break;
        }

        let entry = match Entry::decode(&record) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(segment = id, position, error = %e, "Stopping scan at unreadable entry");
                break;
            }
        };

        let key_hash = hash::hash(&entry.key);
        keydir.set(
            key_hash,
            KeyDirRecord {
                segment_id: id,
                value_size: entry_len as u32,
                value_position: position,
                timestamp: entry.timestamp,
            },
        );
        hints.push(Hint::new(entry.timestamp, position, key_hash));
        result.records_applied += 1;
        position += entry_len;
    }

    let mut encoded = Vec::with_capacity(hints.len() * HINT_SIZE);
    for hint in &hints {
        encoded.extend_from_slice(&hint.encode());
    }
    fs::write(layout.hint_path(id), encoded)?;

    result.segments_scanned += 1;
    debug!(segment = id, records = hints.len(), "Regenerated hint file");
    Ok(())
}

/// Read until `buf` is full or EOF; returns bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
