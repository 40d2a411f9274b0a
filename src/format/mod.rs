//! On-disk Record Formats
//!
//! Binary layouts for the two append-only logs.
//!
//! ## Responsibilities
//! - Encode/decode full key-value entries (segment files)
//! - CRC32 checksums for corruption detection on entries
//! - Encode/decode fixed-size hint records (hint files)
//!
//! ## Entry Format (`data/<id>.data`)
//! ```text
//! ┌─────────┬──────────────┬─────────────┬─────────────┬───────┬─────────┐
//! │ CRC (4) │ TS (8) + 2   │ KLen (4) + 1│ VLen (4) + 1│  Key  │  Value  │
//! └─────────┴──────────────┴─────────────┴─────────────┴───────┴─────────┘
//!   0..4      4..12 pad..14  14..18 pad 18  19..23 pad 23  24..
//! ```
//! All integers big-endian. The CRC covers every byte after itself.
//!
//! ## Hint Format (`hint/<id>.hint`)
//! ```text
//! ┌──────────────┬──────────────┬──────────────┐
//! │ TS (8) + 2   │ Pos (8) + 2  │ Hash (8) + 2 │   30 bytes, no checksum
//! └──────────────┴──────────────┴──────────────┘
//! ```

mod entry;
mod hint;

pub use entry::{Entry, EntryHeader, ENTRY_HEADER_SIZE};
pub use hint::{Hint, HINT_SIZE};
