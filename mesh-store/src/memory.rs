//! In-memory local store.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use mesh_types::{
    FileId, FileRecord, Lesson, LessonId, ProgressRecord, QueueItemId, QuizResult, QuizResultId,
    SyncQueueItem,
};

use crate::{check_file, sort_lessons, LocalStore, StorageError, StorageResult};

#[derive(Default)]
struct Collections {
    lessons: HashMap<LessonId, Lesson>,
    files: HashMap<FileId, FileRecord>,
    progress: HashMap<LessonId, ProgressRecord>,
    quiz_results: Vec<QuizResult>,
    queue: Vec<SyncQueueItem>,
}

/// In-memory store for tests and throwaway sessions.
///
/// Clones share the same collections. Not persistent - all data is lost
/// when the last clone is dropped.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Collections>>,
    drain_lock: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        // A panic mid-write cannot leave a half-written record: every
        // mutation is a single insert or remove.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    fn drain_lock(&self) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(&self.drain_lock)
    }

    async fn put_lesson_if_absent(&self, lesson: &Lesson) -> StorageResult<bool> {
        let mut inner = self.lock();
        if inner.lessons.contains_key(&lesson.id) {
            return Ok(false);
        }
        inner.lessons.insert(lesson.id.clone(), lesson.clone());
        Ok(true)
    }

    async fn put_lesson(&self, lesson: &Lesson) -> StorageResult<()> {
        self.lock().lessons.insert(lesson.id.clone(), lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: &LessonId) -> StorageResult<Option<Lesson>> {
        Ok(self.lock().lessons.get(id).cloned())
    }

    async fn list_lessons(&self) -> StorageResult<Vec<Lesson>> {
        let mut lessons: Vec<Lesson> = self.lock().lessons.values().cloned().collect();
        sort_lessons(&mut lessons);
        Ok(lessons)
    }

    async fn lesson_ids(&self) -> StorageResult<HashSet<LessonId>> {
        Ok(self.lock().lessons.keys().cloned().collect())
    }

    async fn put_file(&self, file: &FileRecord) -> StorageResult<bool> {
        check_file(file)?;
        let mut inner = self.lock();
        if inner.files.contains_key(&file.id) {
            return Ok(false);
        }
        inner.files.insert(file.id.clone(), file.clone());
        Ok(true)
    }

    async fn get_file(&self, id: &FileId) -> StorageResult<Option<FileRecord>> {
        Ok(self.lock().files.get(id).cloned())
    }

    async fn put_progress(&self, record: &ProgressRecord) -> StorageResult<()> {
        self.lock()
            .progress
            .insert(record.lesson_id.clone(), record.clone());
        Ok(())
    }

    async fn get_progress(&self, lesson_id: &LessonId) -> StorageResult<Option<ProgressRecord>> {
        Ok(self.lock().progress.get(lesson_id).cloned())
    }

    async fn list_progress(&self) -> StorageResult<Vec<ProgressRecord>> {
        let mut records: Vec<ProgressRecord> = self.lock().progress.values().cloned().collect();
        records.sort_by(|a, b| a.lesson_id.cmp(&b.lesson_id));
        Ok(records)
    }

    async fn mark_progress_synced(&self, lesson_id: &LessonId) -> StorageResult<bool> {
        match self.lock().progress.get_mut(lesson_id) {
            Some(record) => {
                record.synced = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn put_quiz_result(&self, result: &QuizResult) -> StorageResult<()> {
        let mut inner = self.lock();
        match inner.quiz_results.iter_mut().find(|q| q.id == result.id) {
            Some(existing) => *existing = result.clone(),
            None => inner.quiz_results.push(result.clone()),
        }
        Ok(())
    }

    async fn list_quiz_results(&self) -> StorageResult<Vec<QuizResult>> {
        Ok(self.lock().quiz_results.clone())
    }

    async fn mark_quiz_result_synced(&self, id: &QuizResultId) -> StorageResult<bool> {
        match self.lock().quiz_results.iter_mut().find(|q| &q.id == id) {
            Some(result) => {
                result.synced = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn push_queue_item(&self, item: &SyncQueueItem) -> StorageResult<()> {
        let mut inner = self.lock();
        if inner.queue.iter().any(|q| q.id == item.id) {
            return Err(StorageError::Invalid {
                collection: "syncQueue",
                reason: format!("duplicate queue item {}", item.id),
            });
        }
        inner.queue.push(item.clone());
        Ok(())
    }

    async fn list_queue(&self) -> StorageResult<Vec<SyncQueueItem>> {
        Ok(self.lock().queue.clone())
    }

    async fn update_queue_item(&self, item: &SyncQueueItem) -> StorageResult<()> {
        match self.lock().queue.iter_mut().find(|q| q.id == item.id) {
            Some(existing) => {
                *existing = item.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound {
                collection: "syncQueue",
                key: item.id.to_string(),
            }),
        }
    }

    async fn remove_queue_item(&self, id: &QueueItemId) -> StorageResult<bool> {
        let mut inner = self.lock();
        let before = inner.queue.len();
        inner.queue.retain(|q| &q.id != id);
        Ok(inner.queue.len() != before)
    }

    async fn queue_len(&self) -> StorageResult<usize> {
        Ok(self.lock().queue.len())
    }
}
