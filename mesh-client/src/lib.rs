//! # mesh-client
//!
//! Client library for EduMesh: direct peer file transfer and offline-first
//! sync of learner data.
//!
//! ## Features
//!
//! - **Peer transfer**: [`PeerSession`] frames files as `fileStart` / chunk /
//!   `fileComplete` messages over any [`DataChannel`]
//! - **Outbox**: [`SyncQueue`] records local mutations durably and drains
//!   them oldest first, removing only confirmed items
//! - **Reconciliation**: [`SyncEngine`] pulls new remote lessons and pushes
//!   the outbox on behalf of an explicit actor
//! - **Pure State Machine**: Uses mesh-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use mesh_client::{SyncEngine, SyncQueue, MemoryRemote};
//! use mesh_store::SqliteStore;
//!
//! let store = Arc::new(SqliteStore::new(path).await?);
//! let engine = SyncEngine::new(SyncQueue::new(store), remote);
//!
//! engine.queue().record_progress(&lesson_id, ProgressUpdate::percent(40)).await?;
//! let summary = engine.sync(Some(&actor)).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod library;
pub mod queue;
pub mod remote;
pub mod session;

pub use channel::{ChannelError, ChannelEvent, DataChannel, LoopbackChannel, LoopbackNetwork};
pub use config::{BackoffKind, ClientConfig, ConfigError, StorageConfig, SyncConfig, TransferConfig};
pub use engine::{SyncEngine, SyncSummary, LESSON_ORDER_FIELD};
pub use error::{ClientError, ClientResult};
pub use library::LessonLibrary;
pub use queue::{DrainReport, ItemSender, SyncQueue};
pub use remote::{sort_newest_first, Collection, MemoryRemote, RemoteError, RemoteStore};
pub use session::{PeerSession, ReceivedFile, SessionEvent};
