//! SyncQueue - the durable outbox of local mutations.
//!
//! Every local progress or quiz write appends a [`SyncQueueItem`] holding a
//! snapshot of the record. [`SyncQueue::drain`] walks the queue oldest
//! first and hands each due item to an [`ItemSender`]. An item leaves the
//! queue only after its send is confirmed; failures bump `attempts` and
//! the walk continues with the next item.
//!
//! At most one drain runs over a stored queue at a time. The lock lives on
//! the store ([`LocalStore::drain_lock`]), so separate `SyncQueue` handles
//! over one store exclude each other.

use std::sync::Arc;

use async_trait::async_trait;
use mesh_core::{RetryDecision, RetryPolicy};
use mesh_store::LocalStore;
use mesh_types::{
    now_millis, LessonId, ProgressRecord, ProgressUpdate, QueueItemId, QuizResult, SyncPayload,
    SyncQueueItem, Timestamp,
};

use crate::error::{ClientError, ClientResult};
use crate::remote::RemoteError;

/// Delivers one queued item to its destination.
#[async_trait]
pub trait ItemSender: Send + Sync {
    /// Send an item. `Ok` means the destination accepted it.
    async fn send(&self, item: &SyncQueueItem) -> Result<(), RemoteError>;
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items confirmed and removed.
    pub confirmed: usize,
    /// Items whose send failed; they stay queued.
    pub failed: usize,
    /// Items not attempted (parked or still backing off).
    pub skipped: usize,
}

impl DrainReport {
    /// Number of items still queued after the pass.
    pub fn remaining(&self) -> usize {
        self.failed + self.skipped
    }
}

/// Outbox of pending local mutations.
pub struct SyncQueue<S: LocalStore> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S: LocalStore> Clone for SyncQueue<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S: LocalStore> SyncQueue<S> {
    /// Create a queue over `store` that retries forever.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_policy(store, RetryPolicy::unbounded())
    }

    /// Create a queue with an explicit retry policy.
    pub fn with_policy(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The retry policy in force.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Append a mutation. Needs no network.
    pub async fn enqueue(&self, payload: SyncPayload) -> ClientResult<QueueItemId> {
        let item = SyncQueueItem::new(payload, now_millis());
        self.store.push_queue_item(&item).await?;
        tracing::debug!("Queued {} item {}", item.kind(), item.id);
        Ok(item.id)
    }

    /// Merge `update` into the lesson's progress record and queue the result.
    ///
    /// The record is created if missing and always ends up unsynced.
    pub async fn record_progress(
        &self,
        lesson_id: &LessonId,
        update: ProgressUpdate,
    ) -> ClientResult<ProgressRecord> {
        if lesson_id.is_empty() {
            return Err(ClientError::InvalidArgument("lesson id is empty".into()));
        }

        let now = now_millis();
        let mut record = self
            .store
            .get_progress(lesson_id)
            .await?
            .unwrap_or_else(|| ProgressRecord::new(lesson_id.clone(), now));
        record.apply(&update, now)?;

        self.store.put_progress(&record).await?;
        self.enqueue(SyncPayload::Progress(record.clone())).await?;
        Ok(record)
    }

    /// Store a quiz submission, queue it, then fold its score into the
    /// lesson's progress (which queues a progress snapshot as well).
    pub async fn record_quiz_result(&self, result: QuizResult) -> ClientResult<ProgressRecord> {
        result.validate()?;
        if result.lesson_id.is_empty() {
            return Err(ClientError::InvalidArgument("lesson id is empty".into()));
        }

        self.store.put_quiz_result(&result).await?;
        self.enqueue(SyncPayload::QuizResult(result.clone())).await?;

        self.record_progress(&result.lesson_id, ProgressUpdate::quiz(result.score))
            .await
    }

    /// Every queued item, oldest first.
    pub async fn pending(&self) -> ClientResult<Vec<SyncQueueItem>> {
        Ok(self.store.list_queue().await?)
    }

    /// Number of queued items.
    pub async fn len(&self) -> ClientResult<usize> {
        Ok(self.store.queue_len().await?)
    }

    /// Check if nothing is queued.
    pub async fn is_empty(&self) -> ClientResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Attempt every due item once, oldest first.
    ///
    /// # Errors
    ///
    /// `DrainInProgress` if another drain is running on the same store. Storage
    /// failures abort the pass; items already confirmed stay confirmed.
    pub async fn drain(&self, sender: &dyn ItemSender) -> ClientResult<DrainReport> {
        self.drain_at(sender, now_millis()).await
    }

    /// [`drain`](Self::drain) with an explicit clock reading for backoff
    /// decisions.
    pub async fn drain_at(
        &self,
        sender: &dyn ItemSender,
        now: Timestamp,
    ) -> ClientResult<DrainReport> {
        let _guard = self
            .store
            .drain_lock()
            .try_lock_owned()
            .map_err(|_| ClientError::DrainInProgress)?;

        let items = self.store.list_queue().await?;
        let mut report = DrainReport::default();

        for mut item in items {
            match self.policy.decide(item.attempts, item.last_attempt_at, now) {
                RetryDecision::Attempt => {}
                RetryDecision::Wait { until } => {
                    tracing::debug!("Item {} backing off until {}", item.id, until);
                    report.skipped += 1;
                    continue;
                }
                RetryDecision::Parked => {
                    tracing::debug!("Item {} parked after {} attempts", item.id, item.attempts);
                    report.skipped += 1;
                    continue;
                }
            }

            match sender.send(&item).await {
                Ok(()) => {
                    self.confirm(&item).await?;
                    self.store.remove_queue_item(&item.id).await?;
                    report.confirmed += 1;
                }
                Err(e) => {
                    item.attempts += 1;
                    item.last_attempt_at = Some(now);
                    self.store.update_queue_item(&item).await?;
                    tracing::warn!(
                        "Push of {} item {} failed (attempt {}): {}",
                        item.kind(),
                        item.id,
                        item.attempts,
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        if report != DrainReport::default() {
            tracing::info!(
                "Drain finished: {} confirmed, {} failed, {} skipped",
                report.confirmed,
                report.failed,
                report.skipped
            );
        }
        Ok(report)
    }

    /// Mark the local record behind a confirmed item as synced.
    async fn confirm(&self, item: &SyncQueueItem) -> ClientResult<()> {
        match &item.payload {
            SyncPayload::Progress(snapshot) => {
                if self.store.get_progress(&snapshot.lesson_id).await?.is_none() {
                    tracing::warn!(
                        "Progress for lesson {} vanished before confirmation",
                        snapshot.lesson_id
                    );
                } else if self.other_snapshot_queued(item, &snapshot.lesson_id).await? {
                    tracing::debug!(
                        "Progress for lesson {} has another queued snapshot; left unsynced",
                        snapshot.lesson_id
                    );
                } else {
                    self.store.mark_progress_synced(&snapshot.lesson_id).await?;
                }
            }
            SyncPayload::QuizResult(result) => {
                if !self.store.mark_quiz_result_synced(&result.id).await? {
                    tracing::warn!("Quiz result {} vanished before confirmation", result.id);
                }
            }
        }
        Ok(())
    }

    /// Check if a progress snapshot for `lesson_id` other than `item` is
    /// still waiting in the queue.
    async fn other_snapshot_queued(
        &self,
        item: &SyncQueueItem,
        lesson_id: &LessonId,
    ) -> ClientResult<bool> {
        let queued = self.store.list_queue().await?;
        Ok(queued.iter().any(|other| {
            other.id != item.id
                && matches!(&other.payload, SyncPayload::Progress(p) if &p.lesson_id == lesson_id)
        }))
    }
}
