//! Data channel abstraction for peer sessions.
//!
//! A [`DataChannel`] is one peer connection: it negotiates through an
//! offer/answer exchange, then carries discrete, ordered text messages in
//! both directions. Lifecycle changes (open, closed) arrive on the same
//! event stream as messages, so a session can process them in order.
//!
//! # Design
//!
//! - `create_offer()` produces the host's transport description
//! - `accept_offer()` consumes it on the joiner and produces the answer
//! - `apply_answer()` finishes negotiation on the host
//! - `send()` / `recv()` move frames and lifecycle events
//! - `close()` releases the connection
//!
//! [`LoopbackChannel`] connects two sessions in one process and doubles
//! as the test double.

mod loopback;

pub use loopback::{LoopbackChannel, LoopbackNetwork};

use async_trait::async_trait;
use mesh_core::SessionDescription;
use mesh_types::{ErrorKind, RoomId};
use thiserror::Error;

/// Data channel errors.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Offer/answer negotiation failed.
    #[error("negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The channel has not opened yet.
    #[error("channel not open")]
    NotOpen,

    /// The channel was closed.
    #[error("channel closed")]
    Closed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),
}

impl ChannelError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChannelError::NegotiationFailed(_) => ErrorKind::InvalidArgument,
            ChannelError::NotOpen | ChannelError::Closed | ChannelError::SendFailed(_) => {
                ErrorKind::ChannelNotReady
            }
        }
    }
}

/// Something that happened on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel reported "open".
    Open,
    /// A text frame from the peer.
    Message(String),
    /// The channel reported "closed" or an error.
    Closed {
        /// Reason for the closure.
        reason: String,
    },
}

/// One ordered, message-oriented peer connection.
///
/// Implementations must deliver messages in send order.
#[async_trait]
pub trait DataChannel: Send + Sync {
    /// Host: produce the local transport description for a new negotiation.
    async fn create_offer(&self, room_id: &RoomId, session_id: &str)
        -> Result<String, ChannelError>;

    /// Joiner: consume the host's offer and produce the answer description.
    async fn accept_offer(&self, offer: &SessionDescription) -> Result<String, ChannelError>;

    /// Host: apply the joiner's answer. The channel opens asynchronously.
    async fn apply_answer(&self, answer: &SessionDescription) -> Result<(), ChannelError>;

    /// Send one text frame to the peer.
    async fn send(&self, frame: &str) -> Result<(), ChannelError>;

    /// Wait for the next channel event.
    ///
    /// Returns `Err(ChannelError::Closed)` once the event stream has ended.
    async fn recv(&self) -> Result<ChannelEvent, ChannelError>;

    /// Release the connection. Idempotent.
    async fn close(&self) -> Result<(), ChannelError>;
}
