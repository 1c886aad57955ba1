//! PeerSession - one peer-to-peer connection and its file transfers.
//!
//! # Architecture
//!
//! PeerSession uses the pure phase machine from mesh-core for lifecycle
//! logic and interprets its actions to perform I/O on a [`DataChannel`].
//!
//! ```text
//! Application → PeerSession → DataChannel → Peer
//!                   ↓
//!              mesh-core (phase machine, chunk codec, transfer buffer)
//! ```
//!
//! Notifications (peer connected, file received, ...) are values yielded
//! by [`PeerSession::next_event`], not callbacks.
//!
//! # Example
//!
//! ```ignore
//! let host = PeerSession::new(LoopbackChannel::new(&network), TransferConfig::default());
//! let offer = host.create_room("R1").await?;
//! // ... deliver `offer` to the joiner, receive `answer` back ...
//! host.complete_connection(&answer).await?;
//! host.send_file(&file).await?;
//! ```

use std::collections::VecDeque;
use std::fmt;

use mesh_core::{
    split, Action, CodecError, CompletedTransfer, PeerEvent, PeerPhase, Role, SessionDescription,
    SessionNotice, TransferBuffer, TransferOutcome,
};
use mesh_types::{
    FileChunk, FileComplete, FileId, FileRecord, FileStart, PeerMessage, RoomId, Timestamp,
};
use tokio::sync::{watch, Mutex};

use crate::channel::{ChannelEvent, DataChannel};
use crate::config::TransferConfig;
use crate::error::{ClientError, ClientResult};

/// A file reconstructed from an inbound transfer.
#[derive(Clone, PartialEq, Eq)]
pub struct ReceivedFile {
    /// Transfer id, reused as the stored file id when it is free.
    pub id: FileId,
    /// File name.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl ReceivedFile {
    /// Convert into a storable record.
    pub fn into_record(self, created_at: Timestamp) -> FileRecord {
        FileRecord::new(self.id, self.name, self.mime_type, self.bytes, created_at)
    }
}

impl From<CompletedTransfer> for ReceivedFile {
    fn from(done: CompletedTransfer) -> Self {
        Self {
            id: done.file_id,
            name: done.file_name,
            mime_type: done.file_type,
            bytes: done.bytes,
        }
    }
}

impl fmt::Debug for ReceivedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceivedFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &format!("[{} bytes REDACTED]", self.bytes.len()))
            .finish()
    }
}

/// Notifications surfaced to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The data channel opened; transfers may start.
    PeerConnected,
    /// The peer went away or the channel failed.
    PeerDisconnected {
        /// Reason for disconnection.
        reason: String,
    },
    /// An inbound transfer completed and reassembled cleanly.
    FileReceived(ReceivedFile),
    /// An inbound transfer failed integrity checks and was discarded.
    TransferFailed {
        /// The discarded transfer.
        file_id: FileId,
        /// Why reassembly failed.
        error: CodecError,
    },
}

struct SessionState {
    phase: PeerPhase,
    role: Option<Role>,
    room_id: Option<RoomId>,
    session_id: Option<String>,
    transfers: TransferBuffer,
    events: VecDeque<SessionEvent>,
}

impl SessionState {
    /// Feed an event to the phase machine and apply the local actions.
    ///
    /// Returns `true` if the channel must be released.
    fn transition(&mut self, event: PeerEvent) -> bool {
        let from = self.phase;
        let (phase, actions) = from.on_event(event);
        self.phase = phase;
        if from != phase {
            tracing::debug!("Peer session {:?} -> {:?}", from, phase);
        }

        let mut release = false;
        for action in actions {
            match action {
                Action::DiscardTransfers => {
                    if !self.transfers.is_empty() {
                        tracing::debug!("Discarding {} partial transfers", self.transfers.len());
                    }
                    self.transfers.clear();
                }
                Action::ReleaseChannel => release = true,
                Action::EmitEvent(SessionNotice::PeerConnected) => {
                    self.events.push_back(SessionEvent::PeerConnected)
                }
                Action::EmitEvent(SessionNotice::PeerDisconnected { reason }) => self
                    .events
                    .push_back(SessionEvent::PeerDisconnected { reason }),
                // Negotiation steps are performed by the caller right after
                // the transition.
                Action::CreateOffer | Action::CreateAnswer | Action::ApplyAnswer => {}
            }
        }
        release
    }

    fn ensure_idle(&self) -> ClientResult<()> {
        match self.phase {
            PeerPhase::Idle => Ok(()),
            PeerPhase::Closed => Err(ClientError::SessionClosed),
            phase => Err(ClientError::AlreadyActive(phase)),
        }
    }

    fn accept_message(&mut self, message: PeerMessage) {
        match self.transfers.accept(message) {
            TransferOutcome::Buffered => {}
            TransferOutcome::Completed(done) => {
                tracing::info!(
                    "Received file {} ({}, {} bytes)",
                    done.file_id,
                    done.file_name,
                    done.bytes.len()
                );
                self.events
                    .push_back(SessionEvent::FileReceived(ReceivedFile::from(done)));
            }
            TransferOutcome::Failed { file_id, error } => {
                tracing::warn!("Discarded transfer {}: {}", file_id, error);
                self.events
                    .push_back(SessionEvent::TransferFailed { file_id, error });
            }
        }
    }
}

/// One peer-to-peer connection attempt.
///
/// A session is single-use: once `Closed` it cannot be reopened.
pub struct PeerSession<C: DataChannel> {
    channel: C,
    config: TransferConfig,
    state: Mutex<SessionState>,
    /// Flips to `true` once the session reaches `Closed`; wakes event waiters.
    closed: watch::Sender<bool>,
}

impl<C: DataChannel> PeerSession<C> {
    /// Create an idle session over `channel`.
    pub fn new(channel: C, config: TransferConfig) -> Self {
        Self {
            channel,
            config,
            state: Mutex::new(SessionState {
                phase: PeerPhase::new(),
                role: None,
                room_id: None,
                session_id: None,
                transfers: TransferBuffer::new(),
                events: VecDeque::new(),
            }),
            closed: watch::Sender::new(false),
        }
    }

    /// Host: open a room and return the offer blob to hand to the joiner.
    ///
    /// Moves `Idle -> Offering`.
    pub async fn create_room(&self, room_id: &str) -> ClientResult<String> {
        let room_id = parse_room(room_id)?;
        let session_id = uuid::Uuid::new_v4().to_string();

        let mut state = self.state.lock().await;
        state.ensure_idle()?;
        state.transition(PeerEvent::CreateRequested);
        state.role = Some(Role::Host);
        state.room_id = Some(room_id.clone());
        state.session_id = Some(session_id.clone());

        let sdp = match self.channel.create_offer(&room_id, &session_id).await {
            Ok(sdp) => sdp,
            Err(e) => {
                let release = state.transition(PeerEvent::ChannelClosed {
                    reason: e.to_string(),
                });
                drop(state);
                self.release(release).await;
                return Err(e.into());
            }
        };

        tracing::info!("Created room {} (session {})", room_id, session_id);
        let offer = SessionDescription::offer(room_id, session_id, sdp);
        Ok(offer.to_blob()?)
    }

    /// Joiner: consume the host's offer blob and return the answer blob.
    ///
    /// Moves `Idle -> Answering`; the session connects once the channel
    /// reports open (observed through [`next_event`](Self::next_event)).
    pub async fn join_room(&self, room_id: &str, offer_blob: &str) -> ClientResult<String> {
        let room_id = parse_room(room_id)?;

        let mut state = self.state.lock().await;
        state.ensure_idle()?;

        let offer = SessionDescription::from_blob(offer_blob)?;
        offer.expect_offer_for(&room_id)?;

        state.transition(PeerEvent::JoinRequested);
        state.role = Some(Role::Joiner);
        state.room_id = Some(room_id.clone());
        state.session_id = Some(offer.session_id.clone());

        let sdp = match self.channel.accept_offer(&offer).await {
            Ok(sdp) => sdp,
            Err(e) => {
                let release = state.transition(PeerEvent::ChannelClosed {
                    reason: e.to_string(),
                });
                drop(state);
                self.release(release).await;
                return Err(e.into());
            }
        };

        tracing::info!("Joined room {} (session {})", room_id, offer.session_id);
        let answer = SessionDescription::answer_to(&offer, sdp);
        Ok(answer.to_blob()?)
    }

    /// Host: apply the joiner's answer and wait for the channel to open.
    ///
    /// On "open" the session moves to `Connected` and queues
    /// [`SessionEvent::PeerConnected`]; on "closed" it moves to `Closed`
    /// and queues [`SessionEvent::PeerDisconnected`]. Either way the outcome
    /// is reported through [`next_event`](Self::next_event).
    pub async fn complete_connection(&self, answer_blob: &str) -> ClientResult<()> {
        {
            let mut state = self.state.lock().await;
            match (state.phase, state.role) {
                (PeerPhase::Closed, _) => return Err(ClientError::SessionClosed),
                (_, Some(Role::Joiner)) | (PeerPhase::Idle, _) => {
                    return Err(ClientError::WrongRole {
                        expected: Role::Host,
                    })
                }
                (PeerPhase::Offering, _) => {}
                (phase, _) => return Err(ClientError::AlreadyActive(phase)),
            }

            let answer = SessionDescription::from_blob(answer_blob)?;
            let session_id = state.session_id.clone().unwrap_or_default();
            answer.expect_answer_for(&session_id)?;

            state.transition(PeerEvent::AnswerReceived);

            if let Err(e) = self.channel.apply_answer(&answer).await {
                let release = state.transition(PeerEvent::ChannelClosed {
                    reason: e.to_string(),
                });
                drop(state);
                self.release(release).await;
                return Err(e.into());
            }
        }

        // Wait for the channel's verdict.
        loop {
            let event = self.channel.recv().await;
            self.handle(event).await;

            let state = self.state.lock().await;
            if !state.phase.is_negotiating() {
                return Ok(());
            }
        }
    }

    /// Send a file to the peer.
    ///
    /// Emits one `fileStart`, one `file` message per chunk, then one
    /// `fileComplete`, pausing between chunks to pace the channel.
    ///
    /// # Errors
    ///
    /// `ChannelNotReady` unless the session is `Connected`; nothing is sent
    /// in that case.
    pub async fn send_file(&self, file: &FileRecord) -> ClientResult<()> {
        {
            let state = self.state.lock().await;
            match state.phase {
                PeerPhase::Connected => {}
                PeerPhase::Closed => return Err(ClientError::SessionClosed),
                phase => return Err(ClientError::ChannelNotReady(phase)),
            }
        }

        let chunks = split(&file.bytes, self.config.chunk_size)?;
        let total = chunks.len() as u32;
        let interval = self.config.send_interval();

        let complete = PeerMessage::FileComplete(FileComplete {
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            file_type: file.mime_type.clone(),
            file_size: file.size_bytes,
        });

        self.send_message(&PeerMessage::FileStart(FileStart {
            file_id: file.id.clone(),
            file_name: file.name.clone(),
            file_type: file.mime_type.clone(),
            file_size: file.size_bytes,
            total_chunks: total,
        }))
        .await?;

        for (i, chunk) in chunks.into_iter().enumerate() {
            if i > 0 && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
            let sent = self
                .send_message(&PeerMessage::File(FileChunk {
                    file_id: file.id.clone(),
                    chunk: chunk.payload,
                    index: chunk.index,
                    total,
                    file_name: file.name.clone(),
                    file_type: file.mime_type.clone(),
                }))
                .await;

            if let Err(e) = sent {
                // The peer fails reassembly on fileComplete and frees its buffer.
                if self.send_message(&complete).await.is_ok() {
                    tracing::debug!("Abandoned transfer {} after chunk {}", file.id, i);
                }
                return Err(e);
            }
        }

        self.send_message(&complete).await?;

        tracing::info!(
            "Sent file {} ({} bytes, {} chunks)",
            file.id,
            file.size_bytes,
            total
        );
        Ok(())
    }

    /// Wait for the next notification.
    ///
    /// Returns `None` once the session is closed and every queued
    /// notification has been delivered, or if the session never started.
    /// A waiting call wakes as soon as the session is closed, including by
    /// a local [`disconnect`](Self::disconnect).
    pub async fn next_event(&self) -> Option<SessionEvent> {
        let mut closed = self.closed.subscribe();
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(event) = state.events.pop_front() {
                    return Some(event);
                }
                if matches!(state.phase, PeerPhase::Idle | PeerPhase::Closed) {
                    return None;
                }
            }

            tokio::select! {
                event = self.channel.recv() => self.handle(event).await,
                _ = closed.changed() => {}
            }
        }
    }

    /// Close the session. Idempotent.
    pub async fn disconnect(&self) {
        let release = self
            .state
            .lock()
            .await
            .transition(PeerEvent::DisconnectRequested);
        self.release(release).await;
    }

    /// Current phase.
    pub async fn phase(&self) -> PeerPhase {
        self.state.lock().await.phase
    }

    /// Role, once a room has been created or joined.
    pub async fn role(&self) -> Option<Role> {
        self.state.lock().await.role
    }

    /// Room, once a room has been created or joined.
    pub async fn room_id(&self) -> Option<RoomId> {
        self.state.lock().await.room_id.clone()
    }

    /// Check if transfers may start.
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.phase.is_connected()
    }

    /// Get a reference to the underlying channel (for testing).
    pub fn channel(&self) -> &C {
        &self.channel
    }

    async fn send_message(&self, message: &PeerMessage) -> ClientResult<()> {
        let frame = message.to_json()?;
        self.channel.send(&frame).await?;
        Ok(())
    }

    async fn handle(&self, event: Result<ChannelEvent, crate::channel::ChannelError>) {
        let release = {
            let mut state = self.state.lock().await;
            match event {
                Ok(ChannelEvent::Open) => state.transition(PeerEvent::ChannelOpened),
                Ok(ChannelEvent::Message(text)) => {
                    match PeerMessage::from_json(&text) {
                        Ok(message) => state.accept_message(message),
                        Err(e) => tracing::warn!("Skipping unreadable peer message: {}", e),
                    }
                    false
                }
                Ok(ChannelEvent::Closed { reason }) => {
                    state.transition(PeerEvent::ChannelClosed { reason })
                }
                Err(e) => state.transition(PeerEvent::ChannelClosed {
                    reason: e.to_string(),
                }),
            }
        };
        self.release(release).await;
    }

    async fn release(&self, release: bool) {
        if release {
            if let Err(e) = self.channel.close().await {
                tracing::debug!("Channel close failed: {}", e);
            }
            self.closed.send_replace(true);
        }
    }
}

fn parse_room(room_id: &str) -> ClientResult<RoomId> {
    RoomId::new(room_id).ok_or_else(|| ClientError::InvalidArgument("room id is empty".into()))
}
