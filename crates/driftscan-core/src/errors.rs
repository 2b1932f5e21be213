//! Error types for the incremental clustering engine.

use thiserror::Error;

/// Unified error type for engine operations.
///
/// Everything not covered here is an invariant violation (programmer error)
/// and panics rather than surfacing as a recoverable error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriftscanError {
    /// A point arrived with a time strictly earlier than the latest ingested
    /// time. The engine state is unchanged; the caller may skip the point
    /// and continue.
    #[error("out-of-order ingest: time {time} is earlier than latest time {latest}")]
    OutOfOrder { time: f64, latest: f64 },

    /// The fixed-capacity hit arena is full and trimming could not free a
    /// slot. The engine state is unchanged apart from the trim itself.
    #[error("hit arena exhausted: all {capacity} slots are live")]
    ArenaExhausted { capacity: usize },

    /// Invalid engine parameters.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DriftscanError {
    /// Creates an out-of-order ingest error.
    pub fn out_of_order(time: f64, latest: f64) -> Self {
        DriftscanError::OutOfOrder { time, latest }
    }

    /// Creates an arena-exhausted error.
    pub fn arena_exhausted(capacity: usize) -> Self {
        DriftscanError::ArenaExhausted { capacity }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        DriftscanError::Config(message.into())
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, DriftscanError>;
