//! Error types for spacedrep
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// A prompt task identifier that could not be decoded.
///
/// Returned by the reducer instead of panicking; callers log it and skip the
/// offending action log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Couldn't decode prompt task ID {task_id}: {message}")]
pub struct DecodeError {
    /// The raw task ID as it appeared in the log
    pub task_id: String,
    /// Why decoding failed
    pub message: String,
}

impl DecodeError {
    pub fn new(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            message: message.into(),
        }
    }
}

/// All error types that can occur in spacedrep
#[derive(Debug, Error)]
pub enum SpacedRepError {
    /// Malformed prompt task identifier
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The due-timestamp index references a task with no primary record
    #[error("Inconsistent index: contains entry for prompt state {task_id}, which doesn't exist")]
    StoreCorruption { task_id: String },

    /// The underlying byte-storage engine failed
    #[error("Storage engine error: {0}")]
    Transport(String),

    /// The store has been closed and no longer accepts operations
    #[error("Prompt state store is closed")]
    StoreClosed,

    /// The remote action log source failed
    #[error("Log source error: {0}")]
    Source(String),

    /// The external content resolver failed as a whole
    #[error("Content resolver error: {0}")]
    Resolver(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for SpacedRepError {
    fn from(err: rusqlite::Error) -> Self {
        SpacedRepError::Transport(err.to_string())
    }
}

/// Result type alias for spacedrep operations
pub type Result<T> = std::result::Result<T, SpacedRepError>;
