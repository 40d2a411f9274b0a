//! Storage Module
//!
//! Segment files, their on-disk layout, and index recovery.
//!
//! ## Responsibilities
//! - Directory bootstrap (`data/`, `hint/`)
//! - Append entries to the active segment, hints to its hint file
//! - Rotate the active segment at the size cap
//! - Serve positional reads from any open segment
//! - Rebuild the index from hint files after a restart
//!
//! ## Directory Layout
//! ```text
//! {root}/
//!   ├── data/
//!   │     ├── 1.data      (read-only once rotated)
//!   │     └── 2.data      (active, append-only)
//!   └── hint/
//!         ├── 1.hint
//!         └── 2.hint
//! ```

mod append_log;
mod layout;
mod segment;
mod manager;
pub mod recovery;

pub use layout::Layout;
pub use segment::Segment;
pub use manager::{AppendResult, SegmentManager};
pub use recovery::RecoveryResult;
