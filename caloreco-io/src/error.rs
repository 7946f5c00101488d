//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A line of an event file that does not hold a valid event.
    #[error("invalid event on line {line}: {message}")]
    InvalidFormat {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        message: String,
    },

    /// Another read of the same source is still in flight.
    #[error("event source busy: a read is already in flight")]
    Busy,

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] caloreco_core::Error),
}
