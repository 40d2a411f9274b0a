//! Error types for FlowDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

/// Unified error type for FlowDB operations
#[derive(Debug, Error)]
pub enum FlowError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt entry: checksum mismatch (stored {expected:#010x}, computed {actual:#010x})")]
    CorruptEntry { expected: u32, actual: u32 },

    #[error("Truncated record: {0}")]
    Truncated(String),

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Segment {0} is referenced by the index but not open")]
    SegmentMissing(u64),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Engine not loaded")]
    NotLoaded,

    #[error("Engine already loaded")]
    AlreadyLoaded,

    #[error("Engine closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Server error: {0}")]
    Remote(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
