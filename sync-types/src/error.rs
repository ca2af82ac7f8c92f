//! Error types for albumsync data.

use thiserror::Error;

/// Errors that can occur when building or decoding albumsync types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Identifier is empty or contains characters that cannot appear in a URL segment
    #[error("invalid identifier {value:?}: {reason}")]
    InvalidId {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Two nodes in one listing share an identifier
    #[error("duplicate node id {id:?} in listing")]
    DuplicateNode {
        /// The repeated identifier.
        id: String,
    },
}
