//! # mesh-types
//!
//! Data model and wire format types for EduMesh, an offline-first learning
//! content exchange.
//!
//! This crate provides the foundational types used across all EduMesh crates:
//! - [`FileId`], [`LessonId`], [`QuizResultId`], [`QueueItemId`], [`ActorId`],
//!   [`RoomId`] - Identity types
//! - [`FileRecord`], [`Lesson`], [`ProgressRecord`], [`QuizResult`],
//!   [`SyncQueueItem`] - Persisted records
//! - [`PeerMessage`] - File transfer framing carried over a peer data channel
//! - [`ErrorKind`], [`WireError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;
mod records;

pub use error::{ErrorKind, WireError};
pub use ids::{now_millis, ActorId, FileId, LessonId, QueueItemId, QuizResultId, RoomId, Timestamp};
pub use messages::{FileChunk, FileComplete, FileStart, PeerMessage};
pub use records::{
    FileRecord, FileRef, Lesson, ProgressRecord, ProgressUpdate, QuizResult, SyncKind,
    SyncPayload, SyncQueueItem, MAX_PERCENT, PASSING_SCORE,
};
