//! Error types for EduMesh.

use thiserror::Error;

/// Caller-facing classification of every EduMesh failure.
///
/// Each crate keeps its own error enum; all of them map onto this set so
/// a UI layer can decide how to present a failure without matching on
/// crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad chunk size, malformed id, out-of-range value, malformed blob.
    InvalidArgument,
    /// A session operation that requires `Idle` was called on a used session.
    AlreadyActive,
    /// A host-only or joiner-only operation was called in the other role.
    WrongRole,
    /// A send was attempted outside the `Connected` phase.
    ChannelNotReady,
    /// The session is `Closed` and cannot be reused.
    SessionClosed,
    /// Reassembly found missing or duplicate chunks.
    IncompleteTransfer,
    /// Reassembled length differs from the declared size.
    SizeMismatch,
    /// Sync attempted without an authorized actor.
    NotAuthorized,
    /// A push is already draining the queue.
    DrainInProgress,
    /// Local persistence failed.
    StorageFailure,
    /// Network or remote-store failure.
    RemoteFailure,
}

/// Errors encoding, decoding, or validating records and wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// JSON deserialization failed.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// A bounded numeric field is out of range.
    #[error("{field} out of range: {value} (max {max})")]
    OutOfRange {
        /// Field name as it appears on the wire.
        field: &'static str,
        /// Offending value.
        value: u64,
        /// Inclusive upper bound.
        max: u64,
    },

    /// A required field is missing or empty.
    #[error("missing field: {0}")]
    MissingField(&'static str),
}

impl WireError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}
