//! # mesh-store
//!
//! Durable local collections for EduMesh.
//!
//! The store holds five keyed collections:
//! - `lessons(id)` - lesson metadata
//! - `files(id)` - raw file blobs
//! - `progress(lessonId)` - one progress record per lesson
//! - `quizResults(id)` - quiz submissions
//! - `syncQueue(id)` - outbound mutations, kept in insertion order
//!
//! Writes are atomic per key; there are no cross-record transactions.
//! [`SqliteStore`] is the durable backend, [`MemoryStore`] backs tests and
//! throwaway sessions.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod memory;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use mesh_types::{
    FileId, FileRecord, Lesson, LessonId, ProgressRecord, QueueItemId, QuizResult, QuizResultId,
    SyncQueueItem,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Trait for local storage backends.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Lock held while the sync queue is being drained.
    ///
    /// Every handle onto the same store returns the same lock, so at most
    /// one drain runs over the stored queue at a time.
    fn drain_lock(&self) -> Arc<Mutex<()>>;

    // ===== Lessons =====

    /// Insert a lesson unless one with the same id exists.
    ///
    /// Returns `true` if the lesson was inserted.
    async fn put_lesson_if_absent(&self, lesson: &Lesson) -> StorageResult<bool>;

    /// Insert or replace a lesson.
    async fn put_lesson(&self, lesson: &Lesson) -> StorageResult<()>;

    /// Get a lesson by id.
    async fn get_lesson(&self, id: &LessonId) -> StorageResult<Option<Lesson>>;

    /// All lessons, newest first.
    async fn list_lessons(&self) -> StorageResult<Vec<Lesson>>;

    /// Ids of every stored lesson.
    async fn lesson_ids(&self) -> StorageResult<HashSet<LessonId>>;

    // ===== Files =====

    /// Store a file blob unless one with the same id exists.
    ///
    /// File records are immutable: returns `true` if the file was written,
    /// `false` if the id was already taken (the stored blob is untouched).
    /// Refuses records whose declared size is wrong.
    async fn put_file(&self, file: &FileRecord) -> StorageResult<bool>;

    /// Get a file blob by id.
    async fn get_file(&self, id: &FileId) -> StorageResult<Option<FileRecord>>;

    // ===== Progress =====

    /// Insert or replace the progress record for its lesson.
    async fn put_progress(&self, record: &ProgressRecord) -> StorageResult<()>;

    /// Get the progress record for a lesson.
    async fn get_progress(&self, lesson_id: &LessonId) -> StorageResult<Option<ProgressRecord>>;

    /// All progress records.
    async fn list_progress(&self) -> StorageResult<Vec<ProgressRecord>>;

    /// Set `synced = true` on a progress record.
    ///
    /// Returns `false` if no record exists. Marking an already-synced
    /// record succeeds without a write.
    async fn mark_progress_synced(&self, lesson_id: &LessonId) -> StorageResult<bool>;

    // ===== Quiz results =====

    /// Store a quiz submission.
    async fn put_quiz_result(&self, result: &QuizResult) -> StorageResult<()>;

    /// All quiz submissions, oldest first.
    async fn list_quiz_results(&self) -> StorageResult<Vec<QuizResult>>;

    /// Set `synced = true` on a quiz submission.
    ///
    /// Returns `false` if no submission exists.
    async fn mark_quiz_result_synced(&self, id: &QuizResultId) -> StorageResult<bool>;

    // ===== Sync queue =====

    /// Append an item to the sync queue.
    async fn push_queue_item(&self, item: &SyncQueueItem) -> StorageResult<()>;

    /// Every queued item in insertion order.
    async fn list_queue(&self) -> StorageResult<Vec<SyncQueueItem>>;

    /// Replace a queued item in place, keeping its queue position.
    async fn update_queue_item(&self, item: &SyncQueueItem) -> StorageResult<()>;

    /// Remove a queued item. Returns `true` if it was present.
    async fn remove_queue_item(&self, id: &QueueItemId) -> StorageResult<bool>;

    /// Number of queued items.
    async fn queue_len(&self) -> StorageResult<usize>;
}

pub(crate) fn check_file(file: &FileRecord) -> StorageResult<()> {
    if !file.is_consistent() {
        return Err(StorageError::Invalid {
            collection: "files",
            reason: format!(
                "declared size {} but {} bytes present",
                file.size_bytes,
                file.bytes.len()
            ),
        });
    }
    Ok(())
}

/// Newest first; ties broken by id so the order is stable.
pub(crate) fn sort_lessons(lessons: &mut [Lesson]) {
    lessons.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
