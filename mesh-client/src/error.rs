//! Error types for mesh-client.

use mesh_core::{CodecError, PeerPhase, Role, SignalError};
use mesh_store::StorageError;
use mesh_types::{ErrorKind, WireError};
use thiserror::Error;

use crate::channel::ChannelError;
use crate::remote::RemoteError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad caller input (blank room id, empty title, unknown lesson, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The session has already left `Idle`.
    #[error("session already active ({0:?})")]
    AlreadyActive(PeerPhase),

    /// A host-only or joiner-only operation was called in the other role.
    #[error("operation requires the {expected} role")]
    WrongRole {
        /// Role the operation needs.
        expected: Role,
    },

    /// A transfer was attempted outside `Connected`.
    #[error("channel not ready ({0:?})")]
    ChannelNotReady(PeerPhase),

    /// The session is closed and cannot be reused.
    #[error("session closed")]
    SessionClosed,

    /// Sync attempted without an authorized actor.
    #[error("not authorized")]
    NotAuthorized,

    /// Another push is already draining the queue.
    #[error("a drain is already in progress")]
    DrainInProgress,

    /// Chunking or reassembly error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Malformed or mismatched signaling blob.
    #[error("signal error: {0}")]
    Signal(#[from] SignalError),

    /// Data channel error.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Local storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote store error.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Record or message validation / serialization error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

impl ClientError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ClientError::AlreadyActive(_) => ErrorKind::AlreadyActive,
            ClientError::WrongRole { .. } => ErrorKind::WrongRole,
            ClientError::ChannelNotReady(_) => ErrorKind::ChannelNotReady,
            ClientError::SessionClosed => ErrorKind::SessionClosed,
            ClientError::NotAuthorized => ErrorKind::NotAuthorized,
            ClientError::DrainInProgress => ErrorKind::DrainInProgress,
            ClientError::Codec(e) => e.kind(),
            ClientError::Signal(e) => e.kind(),
            ClientError::Channel(e) => e.kind(),
            ClientError::Storage(e) => e.kind(),
            ClientError::Remote(e) => e.kind(),
            ClientError::Wire(e) => e.kind(),
        }
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
