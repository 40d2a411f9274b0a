//! Segment file handle
//!
//! One append-only data file. The active segment is opened read+append; every
//! older segment is reopened read-only after rotation.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{FlowError, Result};
use crate::format::{Entry, EntryHeader, ENTRY_HEADER_SIZE};

use super::append_log::append_record;

/// An open segment file
#[derive(Debug)]
pub struct Segment {
    id: u64,
    path: PathBuf,
    file: File,
    writable: bool,
}

impl Segment {
    /// Open (creating if needed) a segment for appends and positional reads
    pub fn open_append(path: &Path, id: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file,
            writable: true,
        })
    }

    /// Open an existing segment for reads only
    pub fn open_read_only(path: &Path, id: u64) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file,
            writable: false,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Current on-disk length
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Append one encoded entry at `end`, the current length of the file
    ///
    /// A failed write is cut back to `end`.
    pub fn append(&mut self, end: u64, bytes: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        append_record(&mut self.file, end, bytes)?;
        Ok(())
    }

    /// Drop everything from `len` onwards
    pub(crate) fn truncate(&mut self, len: u64) -> Result<()> {
        self.ensure_writable()?;
        self.file.set_len(len)?;
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if !self.writable {
            return Err(FlowError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("segment {} is read-only", self.id),
            )));
        }
        Ok(())
    }

    /// fsync file contents
    pub fn sync(&self) -> Result<()> {
        if self.writable {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Read and parse the fixed entry header at `offset`
    pub fn read_header(&self, offset: u64) -> Result<EntryHeader> {
        let mut header = [0u8; ENTRY_HEADER_SIZE];
        self.read_at(&mut header, offset)?;
        EntryHeader::decode(&header)
    }

    /// Read the entry starting at `offset`
    ///
    /// The header is read first to learn the record length; the full record
    /// is then read and checksum-verified.
    pub fn read_entry(&self, offset: u64) -> Result<Entry> {
        let header = self.read_header(offset)?;
        let entry_len = header.entry_len();

        let available = self.len()?.saturating_sub(offset);
        if entry_len > available {
            return Err(FlowError::Truncated(format!(
                "entry at {}:{} claims {} bytes, only {} remain",
                self.id, offset, entry_len, available
            )));
        }

        let mut record = vec![0u8; entry_len as usize];
        self.read_at(&mut record, offset)?;
        Entry::decode(&record)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        match read_exact_at(&self.file, buf, offset) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FlowError::Truncated(
                format!("segment {} ends before offset {}", self.id, offset + buf.len() as u64),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
