//! # FlowDB
//!
//! An embeddable, Bitcask-style key-value store with:
//! - Append-only segment files with CRC32-checked entries
//! - An in-memory index from key hash to entry location
//! - Hint files for fast index rebuilds after a restart
//! - Single-writer/multi-reader concurrency model
//! - A small length-prefixed TCP protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TCP Server (optional)                        │
//! │              (worker pool, framed messages)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     FlowDb engine                            │
//! │         (one RwLock: shared get / exclusive put)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌──────────────────┐
//!   │   KeyDir    │          │ Segment Manager  │
//!   │ hash → loc  │          │ data/ + hint/    │
//!   └─────────────┘          └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use flowdb::{Config, FlowDb};
//!
//! let db = FlowDb::new(Config::builder().data_dir("./my_db").build());
//! db.load()?;
//! db.put(b"k:1", b"hello")?;
//! assert_eq!(db.get(b"k:1")?, b"hello".to_vec());
//! db.sync()?;
//! db.close()?;
//! # Ok::<(), flowdb::FlowError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod hash;
pub mod format;
pub mod keydir;
pub mod storage;
pub mod network;
pub mod protocol;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FlowError, Result};
pub use config::{Config, SyncStrategy};
pub use engine::FlowDb;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of FlowDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
