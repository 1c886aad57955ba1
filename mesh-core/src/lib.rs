//! # mesh-core
//!
//! Pure logic for EduMesh (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms behind peer
//! transfers and queued sync without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`chunk`] splits and reassembles byte buffers
//! - [`transfer`] demultiplexes inbound peer messages into files
//! - [`state`] drives one peer session through its phases
//! - [`signal`] encodes the offer/answer blobs exchanged out of band
//! - [`retry`] decides when a queued item is due
//!
//! The actual I/O (data channels, storage, remote calls) is performed by
//! `mesh-client`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod retry;
pub mod signal;
pub mod state;
pub mod transfer;

pub use chunk::{chunk_count, reassemble, split, Chunk, CodecError, DEFAULT_CHUNK_SIZE};
pub use retry::{Backoff, RetryDecision, RetryPolicy};
pub use signal::{DescriptionKind, SessionDescription, SignalError, DESCRIPTION_VERSION};
pub use state::{Action, PeerEvent, PeerPhase, Role, SessionNotice};
pub use transfer::{CompletedTransfer, TransferBuffer, TransferOutcome};
