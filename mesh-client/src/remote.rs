//! Remote store contract.
//!
//! The remote store is an external collaborator: an authoritative document
//! database reachable only when the device is online. EduMesh needs two
//! calls from it, `add_record` and `list_records`.

use async_trait::async_trait;
use mesh_types::{now_millis, ErrorKind};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Remote collections EduMesh reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Published lessons (pulled).
    Lessons,
    /// Learner progress (pushed).
    Progress,
    /// Quiz submissions (pushed).
    QuizResults,
}

impl Collection {
    /// Wire name of the collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Lessons => "lessons",
            Collection::Progress => "progress",
            Collection::QuizResults => "quizResults",
        }
    }

    /// Every collection.
    pub fn all() -> [Collection; 3] {
        [Collection::Lessons, Collection::Progress, Collection::QuizResults]
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote store errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The remote refused the record.
    #[error("remote rejected record: {0}")]
    Rejected(String),

    /// The remote returned something unusable.
    #[error("malformed remote data: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::RemoteFailure
    }
}

/// Authoritative remote document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Append a document to a collection and return its remote id.
    ///
    /// The remote stamps the document with a server-side `syncedAt`.
    async fn add_record(&self, collection: Collection, record: Value)
        -> Result<String, RemoteError>;

    /// List every document in a collection, newest first by `order_by`.
    async fn list_records(
        &self,
        collection: Collection,
        order_by: &str,
    ) -> Result<Vec<Value>, RemoteError>;
}

/// Order documents newest first by a numeric field. Documents missing the
/// field sort last.
pub fn sort_newest_first(records: &mut [Value], order_by: &str) {
    records.sort_by(|a, b| {
        let a = a.get(order_by).and_then(Value::as_u64);
        let b = b.get(order_by).and_then(Value::as_u64);
        b.cmp(&a)
    });
}

/// In-memory remote store for testing.
///
/// Captures added documents and allows failure injection.
#[derive(Debug, Default, Clone)]
pub struct MemoryRemote {
    inner: Arc<Mutex<MemoryRemoteInner>>,
}

#[derive(Debug, Default)]
struct MemoryRemoteInner {
    collections: HashMap<Collection, Vec<Value>>,
    next_id: u64,
    offline: bool,
    fail_next_add: Option<String>,
    reject_when: Option<(String, Value)>,
}

impl MemoryRemote {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRemoteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a document without stamping it.
    pub fn insert(&self, collection: Collection, record: Value) {
        self.lock()
            .collections
            .entry(collection)
            .or_default()
            .push(record);
    }

    /// Every document in a collection, in insertion order.
    pub fn records(&self, collection: Collection) -> Vec<Value> {
        self.lock()
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every call fail with `Unavailable` until set back to `false`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Cause the next add_record() to fail with the given error.
    pub fn fail_next_add(&self, error: &str) {
        self.lock().fail_next_add = Some(error.to_string());
    }

    /// Reject every added document whose `field` equals `value`.
    pub fn reject_when(&self, field: &str, value: Value) {
        self.lock().reject_when = Some((field.to_string(), value));
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn add_record(
        &self,
        collection: Collection,
        mut record: Value,
    ) -> Result<String, RemoteError> {
        let mut inner = self.lock();

        if inner.offline {
            return Err(RemoteError::Unavailable("offline".into()));
        }
        if let Some(error) = inner.fail_next_add.take() {
            return Err(RemoteError::Unavailable(error));
        }
        if let Some((field, value)) = &inner.reject_when {
            if record.get(field) == Some(value) {
                return Err(RemoteError::Rejected(format!("{} = {}", field, value)));
            }
        }

        let Some(doc) = record.as_object_mut() else {
            return Err(RemoteError::Rejected("record is not an object".into()));
        };
        inner.next_id += 1;
        let remote_id = format!("remote-{}", inner.next_id);
        doc.insert("remoteId".into(), Value::from(remote_id.clone()));
        doc.insert("syncedAt".into(), Value::from(now_millis()));

        inner.collections.entry(collection).or_default().push(record);
        Ok(remote_id)
    }

    async fn list_records(
        &self,
        collection: Collection,
        order_by: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        let inner = self.lock();
        if inner.offline {
            return Err(RemoteError::Unavailable("offline".into()));
        }

        let mut records = inner
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default();
        sort_newest_first(&mut records, order_by);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn add_stamps_synced_at_and_remote_id() {
        let remote = MemoryRemote::new();
        let id = remote
            .add_record(Collection::Progress, json!({"lessonId": "L1"}))
            .await
            .unwrap();

        let stored = remote.records(Collection::Progress);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["remoteId"], id);
        assert!(stored[0]["syncedAt"].as_u64().is_some());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let remote = MemoryRemote::new();
        remote.insert(Collection::Lessons, json!({"id": "a", "createdAt": 1}));
        remote.insert(Collection::Lessons, json!({"id": "b", "createdAt": 3}));
        remote.insert(Collection::Lessons, json!({"id": "c"}));
        remote.insert(Collection::Lessons, json!({"id": "d", "createdAt": 2}));

        let ids: Vec<String> = remote
            .list_records(Collection::Lessons, "createdAt")
            .await
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[tokio::test]
    async fn offline_and_injected_failures() {
        let remote = MemoryRemote::new();

        remote.set_offline(true);
        let err = remote
            .list_records(Collection::Lessons, "createdAt")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
        remote.set_offline(false);

        remote.fail_next_add("timeout");
        assert!(remote
            .add_record(Collection::Progress, json!({}))
            .await
            .is_err());
        assert!(remote
            .add_record(Collection::Progress, json!({}))
            .await
            .is_ok());

        remote.reject_when("lessonId", json!("bad"));
        assert!(matches!(
            remote
                .add_record(Collection::Progress, json!({"lessonId": "bad"}))
                .await,
            Err(RemoteError::Rejected(_))
        ));
    }

    #[test]
    fn collection_wire_names() {
        assert_eq!(Collection::QuizResults.to_string(), "quizResults");
        assert_eq!(Collection::all().len(), 3);
    }
}
