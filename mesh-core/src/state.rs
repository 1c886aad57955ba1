//! Peer session phase machine for EduMesh.
//!
//! This module provides a pure, side-effect-free state machine for one peer
//! connection attempt. The state machine takes events as input and produces
//! a new phase plus a list of actions to execute.
//!
//! The actual I/O (creating offers, opening the data channel, sending
//! frames) is performed by mesh-client, not by this module.
//!
//! ```text
//! Idle ──create──► Offering ──answer──► Negotiating ──open──► Connected
//!   └───join────► Answering ─────────────────────────open──────┘
//! any ──closed / disconnect──► Closed (terminal)
//! ```
//!
//! The joiner has no answer to apply, so it skips `Negotiating`: it waits
//! in `Answering` until its channel reports open.

/// Which side of the connection this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Creates the room and the offer.
    Host,
    /// Consumes the offer and produces the answer.
    Joiner,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Host => f.write_str("host"),
            Role::Joiner => f.write_str("joiner"),
        }
    }
}

/// Session phase - NO I/O, just state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerPhase {
    /// Fresh session; no room created or joined.
    Idle,
    /// Host generated an offer and waits for the answer.
    Offering,
    /// Joiner produced an answer and waits for the channel to open.
    Answering,
    /// Host applied the answer and waits for the channel to open.
    Negotiating,
    /// Data channel is open. The only phase in which transfers may start.
    Connected,
    /// Terminal. The session cannot be reused.
    Closed,
}

impl PeerPhase {
    /// Create a new state machine in the Idle phase.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new phase plus actions to execute.
    ///
    /// This is a pure function - no side effects. Events that are not valid
    /// in the current phase leave it unchanged and produce no actions.
    pub fn on_event(self, event: PeerEvent) -> (Self, Vec<Action>) {
        match (self, event) {
            // Closed is terminal
            (Self::Closed, _) => (Self::Closed, vec![]),

            // From Idle
            (Self::Idle, PeerEvent::CreateRequested) => (Self::Offering, vec![Action::CreateOffer]),
            (Self::Idle, PeerEvent::JoinRequested) => (Self::Answering, vec![Action::CreateAnswer]),

            // From Offering
            (Self::Offering, PeerEvent::AnswerReceived) => {
                (Self::Negotiating, vec![Action::ApplyAnswer])
            }

            // Channel opens on both sides
            (Self::Negotiating | Self::Answering, PeerEvent::ChannelOpened) => (
                Self::Connected,
                vec![Action::EmitEvent(SessionNotice::PeerConnected)],
            ),

            // Channel failure from any live phase
            (_, PeerEvent::ChannelClosed { reason }) => (
                Self::Closed,
                vec![
                    Action::DiscardTransfers,
                    Action::ReleaseChannel,
                    Action::EmitEvent(SessionNotice::PeerDisconnected { reason }),
                ],
            ),

            // Explicit disconnect from any live phase
            (Self::Connected, PeerEvent::DisconnectRequested) => (
                Self::Closed,
                vec![
                    Action::DiscardTransfers,
                    Action::ReleaseChannel,
                    Action::EmitEvent(SessionNotice::PeerDisconnected {
                        reason: "user requested".into(),
                    }),
                ],
            ),
            (_, PeerEvent::DisconnectRequested) => (
                Self::Closed,
                vec![Action::DiscardTransfers, Action::ReleaseChannel],
            ),

            // Invalid transitions - stay in current phase
            (phase, _) => (phase, vec![]),
        }
    }

    /// Check if the data channel is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the session is terminal.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Check if negotiation is under way.
    pub fn is_negotiating(&self) -> bool {
        matches!(self, Self::Offering | Self::Answering | Self::Negotiating)
    }
}

impl Default for PeerPhase {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Host asked to create a room.
    CreateRequested,
    /// Joiner asked to join a room with a remote offer.
    JoinRequested,
    /// Host received the joiner's answer.
    AnswerReceived,
    /// The data channel reported "open".
    ChannelOpened,
    /// The data channel reported "closed" or an error.
    ChannelClosed {
        /// Reason for the closure.
        reason: String,
    },
    /// Caller requested disconnect.
    DisconnectRequested,
}

/// Actions to be executed by mesh-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Generate the local offer description.
    CreateOffer,
    /// Consume the remote offer and generate the local answer.
    CreateAnswer,
    /// Apply the remote answer to finish negotiation.
    ApplyAnswer,
    /// Release the channel and connection resources.
    ReleaseChannel,
    /// Drop every partially received transfer.
    DiscardTransfers,
    /// Notify the application.
    EmitEvent(SessionNotice),
}

/// Lifecycle notices emitted to the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The data channel opened.
    PeerConnected,
    /// The peer went away.
    PeerDisconnected {
        /// Reason for disconnection.
        reason: String,
    },
}
