//! Configuration for FlowDB
//!
//! Centralized configuration with sensible defaults. A `Config` is handed to
//! the engine (and the server) explicitly; there is no process-wide state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// Default rotation cap for the active segment (512 MiB)
pub const DEFAULT_MAX_SEGMENT_SIZE: u64 = 512 << 20;

/// Main configuration for a FlowDB instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── data/<id>.data   (append-only entry segments)
    ///     └── hint/<id>.hint   (pointer log, one per segment)
    pub data_dir: PathBuf,

    /// Size at which the active segment is rotated (in bytes)
    pub max_segment_size: u64,

    /// How often the active segment is fsynced
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Largest accepted message body (in bytes)
    pub max_packet_size: u32,

    /// Number of connection worker threads
    pub worker_pool_size: usize,

    /// Accepted connections that may queue for a free worker
    pub max_worker_task_len: usize,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,
}

/// Segment sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// fsync only when `FlowDb::sync` is called
    Manual,

    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N writes
    EveryNWrites { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./flowdb_data"),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            sync_strategy: SyncStrategy::Manual,
            listen_addr: "127.0.0.1:5678".to_string(),
            max_connections: 1000,
            max_packet_size: 4096,
            worker_pool_size: 10,
            max_worker_task_len: 1024,
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Reject settings the engine or server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_segment_size == 0 {
            return Err(FlowError::Config(
                "max_segment_size must be greater than zero".to_string(),
            ));
        }
        if let SyncStrategy::EveryNWrites { count: 0 } = self.sync_strategy {
            return Err(FlowError::Config(
                "sync_strategy every_n_writes needs a count greater than zero".to_string(),
            ));
        }
        if self.worker_pool_size == 0 {
            return Err(FlowError::Config(
                "worker_pool_size must be greater than zero".to_string(),
            ));
        }
        if self.max_packet_size == 0 {
            return Err(FlowError::Config(
                "max_packet_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the segment rotation cap (in bytes)
    pub fn max_segment_size(mut self, size: u64) -> Self {
        self.config.max_segment_size = size;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the largest accepted message body
    pub fn max_packet_size(mut self, size: u32) -> Self {
        self.config.max_packet_size = size;
        self
    }

    /// Set the number of worker threads
    pub fn worker_pool_size(mut self, count: usize) -> Self {
        self.config.worker_pool_size = count;
        self
    }

    /// Set the worker queue length
    pub fn max_worker_task_len(mut self, len: usize) -> Self {
        self.config.max_worker_task_len = len;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
