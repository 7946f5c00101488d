//! Error types for caloreco-core.

use crate::hit::McId;
use thiserror::Error;

/// Result type alias for caloreco operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for reconstruction.
///
/// Only structural problems are errors. Sparse or empty per-event data
/// (empty proto-clusters, zero-energy clusters, unmatched truth) is filtered
/// silently by the stages that encounter it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed or inconsistent configuration. Fatal to the run.
    #[error("configuration error: {0}")]
    Config(String),

    /// A truth reference that does not resolve in the event's truth table.
    #[error("truth particle {0} not found in truth table")]
    UnknownTruthId(McId),

    /// Two parallel collections that must be index-aligned differ in length.
    #[error("{what}: expected {expected} entries, got {actual}")]
    LengthMismatch {
        /// Which pair of collections disagreed.
        what: &'static str,
        /// Length of the reference collection.
        expected: usize,
        /// Length of the collection that should match it.
        actual: usize,
    },
}

impl Error {
    /// Shorthand for a [`Error::Config`] built from anything printable.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if this error is fatal at initialization time.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::LengthMismatch { .. })
    }
}
