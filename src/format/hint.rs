//! Hint encoding
//!
//! A hint is a pointer to an entry. Hints carry no checksum and no lengths;
//! they can always be regenerated from the segment they describe.

use bytes::{Buf, BufMut};

use crate::error::{FlowError, Result};

/// Three 10-byte slots, each a big-endian u64 plus two bytes of padding
pub const HINT_SIZE: usize = 30;

const SLOT_PADDING: usize = 2;

/// A pointer record for fast index rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    /// Write time of the entry, in microseconds
    pub timestamp: u64,

    /// Byte offset of the entry within its segment
    pub value_position: u64,

    /// FNV-1a digest of the entry's key
    pub key_hash: u64,
}

impl Hint {
    pub fn new(timestamp: u64, value_position: u64, key_hash: u64) -> Self {
        Self {
            timestamp,
            value_position,
            key_hash,
        }
    }

    pub fn encode(&self) -> [u8; HINT_SIZE] {
        let mut out = [0u8; HINT_SIZE];
        let mut buf = &mut out[..];
        for field in [self.timestamp, self.value_position, self.key_hash] {
            buf.put_u64(field);
            buf.put_bytes(0, SLOT_PADDING);
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HINT_SIZE {
            return Err(FlowError::Truncated(format!(
                "hint needs {} bytes, got {}",
                HINT_SIZE,
                bytes.len()
            )));
        }

        let mut buf = &bytes[..HINT_SIZE];
        let timestamp = buf.get_u64();
        buf.advance(SLOT_PADDING);
        let value_position = buf.get_u64();
        buf.advance(SLOT_PADDING);
        let key_hash = buf.get_u64();

        Ok(Self {
            timestamp,
            value_position,
            key_hash,
        })
    }
}
