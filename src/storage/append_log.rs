//! Record appends
//!
//! Segments and hint files are both sequences of whole records. A write that
//! fails partway must not leave a fragment behind: the next record would
//! start mid-record and every later hint would be read at the wrong offset.

use std::fs::File;
use std::io::{self, Write};

use tracing::warn;

/// An append-only log that can be cut back to a record boundary
pub trait AppendLog: Write {
    /// Shrink the log to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;
}

impl AppendLog for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Append one whole record to a log whose committed length is `committed`
///
/// On a failed write the log is cut back to `committed` and the write error
/// is returned. If the cut itself fails the fragment stays and a warning is
/// logged.
pub fn append_record<L: AppendLog + ?Sized>(
    log: &mut L,
    committed: u64,
    record: &[u8],
) -> io::Result<()> {
    if let Err(e) = log.write_all(record) {
        if let Err(cut) = log.truncate(committed) {
            warn!(committed, error = %cut, "Could not remove partial record");
        }
        return Err(e);
    }
    Ok(())
}
