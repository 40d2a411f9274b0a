//! Entry encoding
//!
//! A full key-value record as it is appended to a segment.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FlowError, Result};

/// Fixed header size: crc(4) + ts slot(10) + key_len slot(5) + value_len slot(5)
pub const ENTRY_HEADER_SIZE: usize = 24;

/// Offset where the checksummed region starts
const CHECKSUM_END: usize = 4;

/// A single key-value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Write time in microseconds since the unix epoch
    pub timestamp: u64,

    pub key: Vec<u8>,

    pub value: Vec<u8>,
}

/// The fixed-size prefix of an encoded entry
///
/// Parsing a header does not verify the checksum; the lengths it carries are
/// only trustworthy once the full record has been checked with
/// [`Entry::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub checksum: u32,
    pub timestamp: u64,
    pub key_len: u32,
    pub value_len: u32,
}

impl EntryHeader {
    /// Parse the first `ENTRY_HEADER_SIZE` bytes of an encoded entry
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ENTRY_HEADER_SIZE {
            return Err(FlowError::Truncated(format!(
                "entry header needs {} bytes, got {}",
                ENTRY_HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut buf = &bytes[..ENTRY_HEADER_SIZE];
        let checksum = buf.get_u32();
        let timestamp = buf.get_u64();
        buf.advance(2);
        let key_len = buf.get_u32();
        buf.advance(1);
        let value_len = buf.get_u32();

        Ok(Self {
            checksum,
            timestamp,
            key_len,
            value_len,
        })
    }

    /// Total encoded size of the entry this header belongs to
    pub fn entry_len(&self) -> u64 {
        ENTRY_HEADER_SIZE as u64 + u64::from(self.key_len) + u64::from(self.value_len)
    }
}

impl Entry {
    pub fn new(timestamp: u64, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            timestamp,
            key,
            value,
        }
    }

    /// Size of this entry once encoded
    pub fn encoded_len(&self) -> usize {
        ENTRY_HEADER_SIZE + self.key.len() + self.value.len()
    }

    /// Encode into the on-disk layout
    ///
    /// Fails with `CapacityExceeded` if the key or value length does not fit
    /// the 32-bit length fields.
    pub fn encode(&self) -> Result<Bytes> {
        let key_len = length_field("key", self.key.len())?;
        let value_len = length_field("value", self.value.len())?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u32(0); // checksum, filled in below
        buf.put_u64(self.timestamp);
        buf.put_bytes(0, 2);
        buf.put_u32(key_len);
        buf.put_u8(0);
        buf.put_u32(value_len);
        buf.put_u8(0);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);

        let checksum = crc32fast::hash(&buf[CHECKSUM_END..]);
        buf[..CHECKSUM_END].copy_from_slice(&checksum.to_be_bytes());

        Ok(buf.freeze())
    }

    /// Decode a complete encoded entry, verifying its checksum
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = EntryHeader::decode(bytes)?;

        let actual = crc32fast::hash(&bytes[CHECKSUM_END..]);
        if actual != header.checksum {
            return Err(FlowError::CorruptEntry {
                expected: header.checksum,
                actual,
            });
        }

        if header.entry_len() != bytes.len() as u64 {
            return Err(FlowError::Truncated(format!(
                "entry lengths describe {} bytes, record holds {}",
                header.entry_len(),
                bytes.len()
            )));
        }

        let key_end = ENTRY_HEADER_SIZE + header.key_len as usize;
        Ok(Self {
            timestamp: header.timestamp,
            key: bytes[ENTRY_HEADER_SIZE..key_end].to_vec(),
            value: bytes[key_end..].to_vec(),
        })
    }
}

fn length_field(what: &str, len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| {
        FlowError::CapacityExceeded(format!("{} of {} bytes exceeds the u32 length field", what, len))
    })
}
