//! Engine Module
//!
//! The storage engine that ties the index to the segment files.
//!
//! ## Responsibilities
//! - Cold start or crash recovery on `load`
//! - Append-then-index on `put`, index-then-read on `get`
//! - Segment rotation, sync, and shutdown
//! - The Unloaded → Loaded → Closed lifecycle

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{Config, SyncStrategy};
use crate::error::{FlowError, Result};
use crate::format::Entry;
use crate::hash;
use crate::keydir::{KeyDir, KeyDirRecord};
use crate::protocol::Command;
use crate::storage::{recovery, Layout, SegmentManager};

/// The main storage engine
///
/// ## Concurrency Model: one RwLock over all mutable state
///
/// - **Reads** (`get`): shared lock. Segment reads are positional, so any
///   number of readers can use the same file handles at once.
/// - **Writes** (`put`, rotation, `sync`, `close`): exclusive lock. The
///   append, the hint, and the index update happen under a single guard,
///   so a reader never sees an index record whose bytes are not yet written.
pub struct FlowDb {
    config: Config,
    state: RwLock<State>,
}

enum State {
    Unloaded,
    Loaded(Store),
    Closed,
}

/// Everything that exists only while the engine is loaded
struct Store {
    keydir: KeyDir,
    segments: SegmentManager,
    writes_since_sync: usize,
}

impl State {
    fn loaded(&self) -> Result<&Store> {
        match self {
            State::Loaded(store) => Ok(store),
            State::Unloaded => Err(FlowError::NotLoaded),
            State::Closed => Err(FlowError::Closed),
        }
    }

    fn loaded_mut(&mut self) -> Result<&mut Store> {
        match self {
            State::Loaded(store) => Ok(store),
            State::Unloaded => Err(FlowError::NotLoaded),
            State::Closed => Err(FlowError::Closed),
        }
    }
}

impl FlowDb {
    /// Create an engine in the Unloaded state. Nothing touches the disk
    /// until [`FlowDb::load`].
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: RwLock::new(State::Unloaded),
        }
    }

    /// Create and load an engine
    pub fn open(config: Config) -> Result<Self> {
        let db = Self::new(config);
        db.load()?;
        Ok(db)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Initialise or recover on-disk state
    ///
    /// A directory without any data segment is initialised fresh: `data/`
    /// and `hint/` are created, stale hint files are removed, and segment 1
    /// becomes the active file.
    /// Otherwise the index is rebuilt from the hint files, every segment it
    /// refers to is opened for reads, and the newest segment is reopened as
    /// the active file at its current end.
    pub fn load(&self) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            State::Unloaded => {}
            State::Loaded(_) => return Err(FlowError::AlreadyLoaded),
            State::Closed => return Err(FlowError::Closed),
        }
        self.config.validate()?;

        let layout = Layout::new(&self.config.data_dir);
        let latest = if self.config.data_dir.exists() {
            layout.latest_segment_id()?
        } else {
            None
        };

        let store = match latest {
            Some(latest) => self.recover(layout, latest)?,
            None => self.initialize(layout)?,
        };

        *state = State::Loaded(store);
        Ok(())
    }

    fn initialize(&self, layout: Layout) -> Result<Store> {
        info!(data_dir = %self.config.data_dir.display(), "Initializing new database");

        // Hints without segments point at nothing; left in place they would
        // be replayed against the new segments on the next load.
        for id in layout.hint_ids()? {
            warn!(hint = id, "Removing hint file with no data segment");
            std::fs::remove_file(layout.hint_path(id))?;
        }

        let segments = SegmentManager::create(layout, self.config.max_segment_size)?;
        Ok(Store {
            keydir: KeyDir::new(),
            segments,
            writes_since_sync: 0,
        })
    }

    fn recover(&self, layout: Layout, latest: u64) -> Result<Store> {
        info!(
            data_dir = %self.config.data_dir.display(),
            latest_segment = latest,
            "Recovering database"
        );

        let (mut keydir, mut result) = recovery::rebuild_index(&layout, latest)?;
        let referenced: BTreeSet<u64> = keydir.iter().map(|(_, r)| r.segment_id).collect();
        let segments =
            SegmentManager::resume(layout, self.config.max_segment_size, latest, referenced)?;
        recovery::resolve_sizes(&mut keydir, &segments, &mut result)?;

        info!(
            keys = keydir.len(),
            dropped = result.records_dropped,
            torn_hint_files = result.torn_hint_files,
            "Recovery complete"
        );

        Ok(Store {
            keydir,
            segments,
            writes_since_sync: 0,
        })
    }

    /// Get the value stored for a key
    ///
    /// Returns `KeyNotFound` if the key was never written.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let state = self.state.read();
        let store = state.loaded()?;

        let key_hash = hash::hash(key);
        let record = store.keydir.get(key_hash).ok_or(FlowError::KeyNotFound)?;
        let entry = store
            .segments
            .read_entry(record.segment_id, record.value_position)?;
        Ok(entry.value)
    }

    /// Put a key-value pair
    ///
    /// Steps (under the write lock):
    /// 1. Rotate if the active segment is at the cap
    /// 2. Append the entry, then its hint
    /// 3. Point the index at the new entry
    /// 4. Apply the sync strategy
    ///
    /// If the append fails the index is left untouched.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        let store = state.loaded_mut()?;

        let timestamp = now_micros();
        let key_hash = hash::hash(key);
        let entry = Entry::new(timestamp, key.to_vec(), value.to_vec());
        let appended = store.segments.append(&entry, key_hash)?;

        store.keydir.set(
            key_hash,
            KeyDirRecord {
                segment_id: appended.segment_id,
                value_size: appended.size,
                value_position: appended.position,
                timestamp,
            },
        );

        store.after_write(self.config.sync_strategy)
    }

    /// Force the active segment to stable storage
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.write();
        let store = state.loaded_mut()?;
        store.segments.sync()?;
        store.writes_since_sync = 0;
        debug!(segment = store.segments.active_id(), "Synced active segment");
        Ok(())
    }

    /// Reserved for compaction. Reads and writes nothing.
    pub fn merge(&self) -> Result<()> {
        debug!("Merge requested; compaction is not implemented");
        Ok(())
    }

    /// Sync the active segment and close every segment handle
    ///
    /// A second close returns `Closed`.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.write();
        match std::mem::replace(&mut *state, State::Closed) {
            State::Loaded(store) => {
                let keys = store.keydir.len();
                store.segments.close()?;
                info!(keys, "Closed database");
                Ok(())
            }
            State::Unloaded => {
                *state = State::Unloaded;
                Err(FlowError::NotLoaded)
            }
            State::Closed => Err(FlowError::Closed),
        }
    }

    /// Execute a command
    ///
    /// Routes protocol commands to the engine API
    pub fn execute(&self, command: Command) -> Result<Option<Vec<u8>>> {
        match command {
            Command::Get { key } => self.get(&key).map(Some),
            Command::Put { key, value } => {
                self.put(&key, &value)?;
                Ok(None)
            }
            Command::Sync => {
                self.sync()?;
                Ok(None)
            }
            Command::Ping => Ok(Some(b"PONG".to_vec())),
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.read(), State::Loaded(_))
    }

    /// Number of live keys (0 unless loaded)
    pub fn key_count(&self) -> usize {
        self.state
            .read()
            .loaded()
            .map(|store| store.keydir.len())
            .unwrap_or(0)
    }

    pub fn active_segment_id(&self) -> Option<u64> {
        let state = self.state.read();
        state.loaded().ok().map(|store| store.segments.active_id())
    }

    pub fn active_offset(&self) -> Option<u64> {
        let state = self.state.read();
        state.loaded().ok().map(|store| store.segments.active_offset())
    }

    /// Number of open segment handles, including the active one
    pub fn segment_count(&self) -> usize {
        self.state
            .read()
            .loaded()
            .map(|store| store.segments.segment_count())
            .unwrap_or(0)
    }

    /// Path of the active segment file
    pub fn active_segment_path(&self) -> Option<PathBuf> {
        let state = self.state.read();
        state.loaded().ok().map(|store| {
            store
                .segments
                .layout()
                .segment_path(store.segments.active_id())
        })
    }

    /// A copy of the current index
    pub fn keydir_snapshot(&self) -> Option<KeyDir> {
        let state = self.state.read();
        state.loaded().ok().map(|store| store.keydir.clone())
    }
}

impl Store {
    fn after_write(&mut self, strategy: SyncStrategy) -> Result<()> {
        self.writes_since_sync += 1;
        let due = match strategy {
            SyncStrategy::Manual => false,
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNWrites { count } => self.writes_since_sync >= count,
        };
        if due {
            self.segments.sync()?;
            self.writes_since_sync = 0;
        }
        Ok(())
    }
}

/// Microseconds since the unix epoch
fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}
