//! In-process loopback data channel.
//!
//! Two [`LoopbackChannel`]s created from the same [`LoopbackNetwork`]
//! negotiate through it exactly like two real peers would, then exchange
//! frames over unbounded tokio channels. Sent frames are captured for
//! verification and failures can be injected.

use super::{ChannelError, ChannelEvent, DataChannel};
use async_trait::async_trait;
use mesh_core::SessionDescription;
use mesh_types::RoomId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Rendezvous point shared by loopback peers.
///
/// Plays the part of the out-of-band signaling path plus the network.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

#[derive(Default)]
struct NetworkInner {
    /// Host inbound queues, by session id.
    offers: HashMap<String, Endpoint>,
    /// Joiner inbound queues, by session id.
    answers: HashMap<String, Endpoint>,
}

#[derive(Clone)]
struct Endpoint {
    inbound: UnboundedSender<ChannelEvent>,
    state: Arc<Mutex<LoopbackInner>>,
}

impl LoopbackNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of offers still waiting for an answer.
    pub fn pending_offers(&self) -> usize {
        lock(&self.inner).offers.len()
    }
}

/// One side of a loopback connection.
///
/// Clones share the same connection, so a test can keep a handle to
/// inspect traffic after moving one into a session.
#[derive(Clone)]
pub struct LoopbackChannel {
    network: LoopbackNetwork,
    inbound_tx: UnboundedSender<ChannelEvent>,
    inbound_rx: Arc<tokio::sync::Mutex<UnboundedReceiver<ChannelEvent>>>,
    inner: Arc<Mutex<LoopbackInner>>,
}

#[derive(Default)]
struct LoopbackInner {
    peer: Option<UnboundedSender<ChannelEvent>>,
    session_id: Option<String>,
    open: bool,
    closed: bool,
    sent: Vec<String>,
    /// Successful sends left before the injected failure, and its error.
    fail_send: Option<(usize, String)>,
    fail_next_negotiation: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LoopbackChannel {
    /// Create a channel attached to `network`.
    pub fn new(network: &LoopbackNetwork) -> Self {
        let (inbound_tx, inbound_rx) = unbounded_channel();
        Self {
            network: network.clone(),
            inbound_tx,
            inbound_rx: Arc::new(tokio::sync::Mutex::new(inbound_rx)),
            inner: Arc::default(),
        }
    }

    /// Get every frame that was sent successfully, in order.
    pub fn sent_frames(&self) -> Vec<String> {
        lock(&self.inner).sent.clone()
    }

    /// Check if the channel is open.
    pub fn is_open(&self) -> bool {
        lock(&self.inner).open
    }

    /// Cause the next send() to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.fail_send_after(0, error);
    }

    /// Let `sends` more sends through, then fail the one after.
    pub fn fail_send_after(&self, sends: usize, error: &str) {
        lock(&self.inner).fail_send = Some((sends, error.to_string()));
    }

    /// Cause the next negotiation step to fail with the given error.
    pub fn fail_next_negotiation(&self, error: &str) {
        lock(&self.inner).fail_next_negotiation = Some(error.to_string());
    }

    /// Deliver an event to this side as if it came from the network.
    pub fn inject(&self, event: ChannelEvent) {
        // The receiver lives as long as `self`.
        let _ = self.inbound_tx.send(event);
    }

    fn endpoint(&self) -> Endpoint {
        Endpoint {
            inbound: self.inbound_tx.clone(),
            state: Arc::clone(&self.inner),
        }
    }

    fn check_negotiation(&self) -> Result<(), ChannelError> {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return Err(ChannelError::Closed);
        }
        if let Some(error) = inner.fail_next_negotiation.take() {
            return Err(ChannelError::NegotiationFailed(error));
        }
        Ok(())
    }
}

#[async_trait]
impl DataChannel for LoopbackChannel {
    async fn create_offer(
        &self,
        room_id: &RoomId,
        session_id: &str,
    ) -> Result<String, ChannelError> {
        self.check_negotiation()?;

        lock(&self.network.inner)
            .offers
            .insert(session_id.to_string(), self.endpoint());
        lock(&self.inner).session_id = Some(session_id.to_string());

        Ok(format!("loopback-offer:{}:{}", room_id, session_id))
    }

    async fn accept_offer(&self, offer: &SessionDescription) -> Result<String, ChannelError> {
        self.check_negotiation()?;

        let host = {
            let mut network = lock(&self.network.inner);
            let host = network.offers.remove(&offer.session_id).ok_or_else(|| {
                ChannelError::NegotiationFailed(format!(
                    "no host is offering session {}",
                    offer.session_id
                ))
            })?;
            network
                .answers
                .insert(offer.session_id.clone(), self.endpoint());
            host
        };

        let mut inner = lock(&self.inner);
        inner.peer = Some(host.inbound);
        inner.session_id = Some(offer.session_id.clone());

        Ok(format!("loopback-answer:{}", offer.session_id))
    }

    async fn apply_answer(&self, answer: &SessionDescription) -> Result<(), ChannelError> {
        self.check_negotiation()?;

        let joiner = lock(&self.network.inner)
            .answers
            .remove(&answer.session_id)
            .ok_or_else(|| {
                ChannelError::NegotiationFailed(format!(
                    "no joiner answered session {}",
                    answer.session_id
                ))
            })?;

        {
            let mut inner = lock(&self.inner);
            inner.peer = Some(joiner.inbound.clone());
            inner.open = true;
        }
        lock(&joiner.state).open = true;

        // Both ends observe "open" on their own event stream.
        let _ = self.inbound_tx.send(ChannelEvent::Open);
        let _ = joiner.inbound.send(ChannelEvent::Open);
        Ok(())
    }

    async fn send(&self, frame: &str) -> Result<(), ChannelError> {
        let mut inner = lock(&self.inner);

        if inner.closed {
            return Err(ChannelError::Closed);
        }
        if !inner.open {
            return Err(ChannelError::NotOpen);
        }

        // Check for forced failure
        match inner.fail_send.take() {
            Some((0, error)) => return Err(ChannelError::SendFailed(error)),
            Some((left, error)) => inner.fail_send = Some((left - 1, error)),
            None => {}
        }

        let peer = inner.peer.as_ref().ok_or(ChannelError::NotOpen)?;
        peer.send(ChannelEvent::Message(frame.to_string()))
            .map_err(|_| ChannelError::Closed)?;
        inner.sent.push(frame.to_string());
        Ok(())
    }

    async fn recv(&self) -> Result<ChannelEvent, ChannelError> {
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or(ChannelError::Closed)
    }

    async fn close(&self) -> Result<(), ChannelError> {
        let (peer, session_id) = {
            let mut inner = lock(&self.inner);
            if inner.closed {
                return Ok(());
            }
            inner.closed = true;
            inner.open = false;
            (inner.peer.take(), inner.session_id.take())
        };

        if let Some(session_id) = session_id {
            let mut network = lock(&self.network.inner);
            network.offers.remove(&session_id);
            network.answers.remove(&session_id);
        }
        if let Some(peer) = peer {
            let _ = peer.send(ChannelEvent::Closed {
                reason: "peer closed the channel".into(),
            });
        }
        Ok(())
    }
}
