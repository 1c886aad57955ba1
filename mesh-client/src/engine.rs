//! SyncEngine - pull remote lessons, push the local outbox.
//!
//! Both directions require an authorized actor, passed explicitly.
//! Pull is strictly additive: a lesson already known locally is never
//! overwritten. Push drains the [`SyncQueue`] through a sender that
//! forwards each payload to the matching remote collection. Publishing
//! copies one local lesson's metadata to the remote `lessons` collection
//! so other devices can pull it.

use async_trait::async_trait;
use mesh_store::LocalStore;
use mesh_types::{ActorId, FileRef, Lesson, LessonId, SyncKind, SyncQueueItem, Timestamp};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ClientError, ClientResult};
use crate::queue::{DrainReport, ItemSender, SyncQueue};
use crate::remote::{Collection, RemoteError, RemoteStore};

/// Field the remote lesson listing is ordered by.
pub const LESSON_ORDER_FIELD: &str = "createdAt";

/// Result of a full [`SyncEngine::sync`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Lessons newly imported by the pull.
    pub imported: usize,
    /// Outcome of the push.
    pub push: DrainReport,
}

/// Lesson document as published remotely.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteLesson {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    topic: String,
    #[serde(default, alias = "fileURL")]
    file_url: Option<String>,
    #[serde(default)]
    created_at: Timestamp,
}

impl RemoteLesson {
    fn into_lesson(self) -> Lesson {
        Lesson {
            id: LessonId::from(self.id),
            title: self.title,
            topic: self.topic,
            file_ref: self.file_url.filter(|u| !u.is_empty()).map(FileRef::Remote),
            created_at: self.created_at,
        }
    }
}

/// Forwards queue items to the remote store on behalf of an actor.
struct RemoteSender<'a, R: RemoteStore> {
    remote: &'a R,
    actor: &'a ActorId,
}

#[async_trait]
impl<R: RemoteStore> ItemSender for RemoteSender<'_, R> {
    async fn send(&self, item: &SyncQueueItem) -> Result<(), RemoteError> {
        let mut document = item
            .payload
            .to_document()
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        if let Some(fields) = document.as_object_mut() {
            fields.insert("userId".into(), Value::from(self.actor.as_str()));
        }

        let collection = match item.kind() {
            SyncKind::Progress => Collection::Progress,
            SyncKind::QuizResult => Collection::QuizResults,
        };
        let remote_id = self.remote.add_record(collection, document).await?;
        tracing::debug!("Pushed item {} to {} as {}", item.id, collection, remote_id);
        Ok(())
    }
}

/// Reconciles the local store with a remote store.
pub struct SyncEngine<S: LocalStore, R: RemoteStore> {
    queue: SyncQueue<S>,
    remote: R,
}

impl<S: LocalStore, R: RemoteStore> SyncEngine<S, R> {
    /// Create an engine over a queue and a remote.
    pub fn new(queue: SyncQueue<S>, remote: R) -> Self {
        Self { queue, remote }
    }

    /// The outbox.
    pub fn queue(&self) -> &SyncQueue<S> {
        &self.queue
    }

    /// The remote store.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Import remote lessons unknown locally. Returns how many were added.
    pub async fn pull(&self, actor: Option<&ActorId>) -> ClientResult<usize> {
        authorize(actor)?;

        let records = self
            .remote
            .list_records(Collection::Lessons, LESSON_ORDER_FIELD)
            .await?;
        let store = self.queue.store();
        let known = store.lesson_ids().await?;

        let mut imported = 0;
        for record in records {
            let lesson = match serde_json::from_value::<RemoteLesson>(record) {
                Ok(remote) if !remote.id.trim().is_empty() => remote.into_lesson(),
                Ok(_) => {
                    tracing::warn!("Skipping remote lesson without an id");
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable remote lesson: {}", e);
                    continue;
                }
            };

            if known.contains(&lesson.id) {
                continue;
            }
            if store.put_lesson_if_absent(&lesson).await? {
                imported += 1;
            }
        }

        tracing::info!("Pull imported {} lessons", imported);
        Ok(imported)
    }

    /// Drain the outbox to the remote store.
    ///
    /// # Errors
    ///
    /// `NotAuthorized` without an actor; `DrainInProgress` if another push
    /// is running. Per-item remote failures are counted in the report.
    pub async fn push(&self, actor: Option<&ActorId>) -> ClientResult<DrainReport> {
        let actor = authorize(actor)?;
        let sender = RemoteSender {
            remote: &self.remote,
            actor,
        };
        self.queue.drain(&sender).await
    }

    /// Publish a local lesson to the remote `lessons` collection.
    ///
    /// Sends the lesson's metadata (a remote file URL, or the local file's
    /// name, size and type) stamped with the actor's id. Returns the id the
    /// remote assigned. The local lesson is left unchanged either way.
    pub async fn publish_lesson(
        &self,
        actor: Option<&ActorId>,
        lesson_id: &LessonId,
    ) -> ClientResult<String> {
        let actor = authorize(actor)?;
        let store = self.queue.store();
        let lesson = store
            .get_lesson(lesson_id)
            .await?
            .ok_or_else(|| ClientError::InvalidArgument(format!("unknown lesson {}", lesson_id)))?;

        let mut document = json!({
            "id": lesson.id.as_str(),
            "title": lesson.title,
            "topic": lesson.topic,
            "createdAt": lesson.created_at,
            "userId": actor.as_str(),
        });
        match &lesson.file_ref {
            Some(FileRef::Remote(url)) => document["fileUrl"] = Value::from(url.as_str()),
            Some(FileRef::Local(file_id)) => {
                if let Some(file) = store.get_file(file_id).await? {
                    document["fileName"] = Value::from(file.name);
                    document["fileSize"] = Value::from(file.size_bytes);
                    document["fileType"] = Value::from(file.mime_type);
                }
            }
            None => {}
        }

        let remote_id = self.remote.add_record(Collection::Lessons, document).await?;
        tracing::info!("Published lesson {} as {}", lesson.id, remote_id);
        Ok(remote_id)
    }

    /// Pull, then push.
    pub async fn sync(&self, actor: Option<&ActorId>) -> ClientResult<SyncSummary> {
        let imported = self.pull(actor).await?;
        let push = self.push(actor).await?;
        Ok(SyncSummary { imported, push })
    }
}

fn authorize(actor: Option<&ActorId>) -> ClientResult<&ActorId> {
    match actor {
        Some(actor) if !actor.is_empty() => Ok(actor),
        _ => Err(ClientError::NotAuthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use mesh_store::MemoryStore;
    use mesh_types::{ErrorKind, ProgressUpdate, QuizResult};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn engine() -> SyncEngine<MemoryStore, MemoryRemote> {
        SyncEngine::new(
            SyncQueue::new(Arc::new(MemoryStore::new())),
            MemoryRemote::new(),
        )
    }

    fn actor() -> ActorId {
        ActorId::from("instructor-1")
    }

    fn lesson(id: &str, title: &str) -> Lesson {
        Lesson {
            id: id.into(),
            title: title.into(),
            topic: "math".into(),
            file_ref: None,
            created_at: 1,
        }
    }

    #[tokio::test]
    async fn unauthorized_calls_fail_fast() {
        let engine = engine();
        engine
            .queue()
            .record_progress(&"L1".into(), ProgressUpdate::percent(10))
            .await
            .unwrap();

        assert_eq!(
            engine.pull(None).await.unwrap_err().kind(),
            ErrorKind::NotAuthorized
        );
        let blank = ActorId::from(" ");
        assert_eq!(
            engine.push(Some(&blank)).await.unwrap_err().kind(),
            ErrorKind::NotAuthorized
        );
        assert!(engine.remote().records(Collection::Progress).is_empty());
        assert_eq!(engine.queue().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pull_never_overwrites_local_lessons() {
        let engine = engine();
        let store = engine.queue().store();
        store.put_lesson(&lesson("L1", "Draft")).await.unwrap();

        engine.remote().insert(
            Collection::Lessons,
            json!({"id": "L1", "title": "Final", "topic": "math", "createdAt": 5}),
        );
        engine.remote().insert(
            Collection::Lessons,
            json!({"id": "L2", "title": "Fractions", "topic": "math",
                   "fileUrl": "https://cdn.example/l2.pdf", "createdAt": 6}),
        );

        let imported = engine.pull(Some(&actor())).await.unwrap();
        assert_eq!(imported, 1);

        let l1 = store.get_lesson(&"L1".into()).await.unwrap().unwrap();
        assert_eq!(l1.title, "Draft");
        let l2 = store.get_lesson(&"L2".into()).await.unwrap().unwrap();
        assert_eq!(
            l2.file_ref,
            Some(FileRef::Remote("https://cdn.example/l2.pdf".into()))
        );

        // A second pull finds nothing new.
        assert_eq!(engine.pull(Some(&actor())).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn pull_reads_legacy_file_url_field() {
        let engine = engine();
        engine.remote().insert(
            Collection::Lessons,
            json!({"id": "L7", "title": "Plants", "topic": "Biology",
                   "fileURL": "https://cdn.example/plants.pdf", "createdAt": 2}),
        );

        assert_eq!(engine.pull(Some(&actor())).await.unwrap(), 1);
        let lesson = engine
            .queue()
            .store()
            .get_lesson(&"L7".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            lesson.file_ref,
            Some(FileRef::Remote("https://cdn.example/plants.pdf".into()))
        );
    }

    #[tokio::test]
    async fn published_lesson_can_be_pulled_elsewhere() {
        let engine = engine();
        let store = engine.queue().store();
        let file = mesh_types::FileRecord::new(
            "f1".into(),
            "fractions.pdf",
            "application/pdf",
            vec![0; 12],
            3,
        );
        store.put_file(&file).await.unwrap();
        let mut local = lesson("L1", "Fractions");
        local.file_ref = Some(FileRef::Local(file.id.clone()));
        store.put_lesson(&local).await.unwrap();

        engine
            .publish_lesson(Some(&actor()), &"L1".into())
            .await
            .unwrap();

        let published = engine.remote().records(Collection::Lessons);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["id"], "L1");
        assert_eq!(published[0]["userId"], "instructor-1");
        assert_eq!(published[0]["fileName"], "fractions.pdf");
        assert_eq!(published[0]["fileSize"], 12);

        // A second device pulls the published lesson.
        let other = SyncEngine::new(
            SyncQueue::new(Arc::new(MemoryStore::new())),
            engine.remote().clone(),
        );
        assert_eq!(other.pull(Some(&actor())).await.unwrap(), 1);
        let pulled = other
            .queue()
            .store()
            .get_lesson(&"L1".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pulled.title, "Fractions");
    }

    #[tokio::test]
    async fn publish_requires_actor_and_known_lesson() {
        let engine = engine();
        assert_eq!(
            engine
                .publish_lesson(None, &"L1".into())
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotAuthorized
        );
        assert_eq!(
            engine
                .publish_lesson(Some(&actor()), &"missing".into())
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidArgument
        );

        engine
            .queue()
            .store()
            .put_lesson(&lesson("L1", "Draft"))
            .await
            .unwrap();
        engine.remote().set_offline(true);
        assert_eq!(
            engine
                .publish_lesson(Some(&actor()), &"L1".into())
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::RemoteFailure
        );
        assert!(engine.remote().records(Collection::Lessons).is_empty());
    }

    #[tokio::test]
    async fn pull_skips_unreadable_documents() {
        let engine = engine();
        engine
            .remote()
            .insert(Collection::Lessons, json!({"title": "no id"}));
        engine
            .remote()
            .insert(Collection::Lessons, json!({"id": "", "title": "blank"}));
        engine
            .remote()
            .insert(Collection::Lessons, json!({"id": "L3", "title": "ok"}));

        assert_eq!(engine.pull(Some(&actor())).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pull_reports_remote_failure() {
        let engine = engine();
        engine.remote().set_offline(true);

        let err = engine.pull(Some(&actor())).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
    }

    #[tokio::test]
    async fn push_routes_by_kind_and_stamps_actor() {
        let engine = engine();
        let result = QuizResult::new("L1".into(), 90, BTreeMap::new(), 45, 10);
        engine.queue().record_quiz_result(result).await.unwrap();

        let report = engine.push(Some(&actor())).await.unwrap();
        assert_eq!(report.confirmed, 2);

        let quizzes = engine.remote().records(Collection::QuizResults);
        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0]["userId"], "instructor-1");
        assert_eq!(quizzes[0]["score"], 90);
        assert!(quizzes[0]["syncedAt"].is_u64());

        let progress = engine.remote().records(Collection::Progress);
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0]["lessonId"], "L1");
        assert_eq!(progress[0]["completed"], true);

        let local = engine
            .queue()
            .store()
            .get_progress(&"L1".into())
            .await
            .unwrap()
            .unwrap();
        assert!(local.synced);
    }

    #[tokio::test]
    async fn rejected_items_stay_queued() {
        let engine = engine();
        engine
            .queue()
            .record_progress(&"bad".into(), ProgressUpdate::percent(10))
            .await
            .unwrap();
        engine
            .queue()
            .record_progress(&"good".into(), ProgressUpdate::percent(20))
            .await
            .unwrap();
        engine.remote().reject_when("lessonId", json!("bad"));

        let report = engine.push(Some(&actor())).await.unwrap();
        assert_eq!(report.confirmed, 1);
        assert_eq!(report.failed, 1);

        let pending = engine.queue().pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload.record_key(), "bad");
        assert_eq!(pending[0].attempts, 1);
    }

    #[tokio::test]
    async fn sync_pulls_then_pushes() {
        let engine = engine();
        engine
            .remote()
            .insert(Collection::Lessons, json!({"id": "R1", "title": "Remote"}));
        engine
            .queue()
            .record_progress(&"R1".into(), ProgressUpdate::completed())
            .await
            .unwrap();

        let summary = engine.sync(Some(&actor())).await.unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.push.confirmed, 1);
    }
}
