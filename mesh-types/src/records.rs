//! Persisted records: files, lessons, learner progress, quiz results and
//! outbound sync queue items.
//!
//! All records serialize as camelCase JSON so the same documents can be
//! written to the local store and forwarded to the remote store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{FileId, LessonId, QueueItemId, QuizResultId, Timestamp, WireError};

/// Score at or above which a quiz marks its lesson as completed.
pub const PASSING_SCORE: u8 = 70;

/// Upper bound for percentages and scores.
pub const MAX_PERCENT: u8 = 100;

fn check_percent(field: &'static str, value: u8) -> Result<(), WireError> {
    if value > MAX_PERCENT {
        return Err(WireError::OutOfRange {
            field,
            value: value as u64,
            max: MAX_PERCENT as u64,
        });
    }
    Ok(())
}

/// A raw file blob held by the local store. Immutable once written.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Unique file id; lessons reference it through [`FileRef::Local`].
    pub id: FileId,
    /// Original file name.
    pub name: String,
    /// MIME type, as reported by the sender.
    pub mime_type: String,
    /// Declared size. Always equal to `bytes.len()` for a valid record.
    pub size_bytes: u64,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Creation time.
    pub created_at: Timestamp,
}

impl FileRecord {
    /// Build a record whose declared size matches its contents.
    pub fn new(
        id: FileId,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
            bytes,
            created_at,
        }
    }

    /// Check the size invariant.
    pub fn is_consistent(&self) -> bool {
        self.size_bytes == self.bytes.len() as u64
    }
}

impl fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.size_bytes)
            .field("bytes", &format!("[{} bytes REDACTED]", self.bytes.len()))
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Weak reference from a lesson to its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileRef {
    /// A [`FileRecord`] in the local store.
    Local(FileId),
    /// A remotely resolved URL.
    Remote(String),
}

/// A lesson. Never mutated after creation except to attach a `file_ref`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Lesson id (remote lessons keep their remote id).
    pub id: LessonId,
    /// Display title.
    pub title: String,
    /// Topic or subject.
    pub topic: String,
    /// Where the lesson content lives, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<FileRef>,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Learner progress for one lesson, keyed by `lesson_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// The lesson this record tracks.
    pub lesson_id: LessonId,
    /// Whether the lesson is completed.
    pub completed: bool,
    /// Completion percentage, 0..=100.
    pub percent: u8,
    /// Whether the lesson quiz has been taken.
    #[serde(default)]
    pub quiz_completed: bool,
    /// Latest quiz score, 0..=100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<u8>,
    /// When the lesson was first completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    /// Last local modification.
    pub last_updated: Timestamp,
    /// Whether the latest state has been confirmed by the remote store.
    pub synced: bool,
}

impl ProgressRecord {
    /// A fresh, unsynced record with no progress.
    pub fn new(lesson_id: LessonId, now: Timestamp) -> Self {
        Self {
            lesson_id,
            completed: false,
            percent: 0,
            quiz_completed: false,
            quiz_score: None,
            completed_at: None,
            last_updated: now,
            synced: false,
        }
    }

    /// Merge an update into this record.
    ///
    /// The record becomes unsynced. Completing a lesson pins `percent` to
    /// 100 and stamps `completed_at` the first time.
    pub fn apply(&mut self, update: &ProgressUpdate, now: Timestamp) -> Result<(), WireError> {
        update.validate()?;

        if let Some(percent) = update.percent {
            self.percent = percent;
        }
        if let Some(score) = update.quiz_score {
            self.quiz_completed = true;
            self.quiz_score = Some(score);
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if self.completed {
            self.percent = MAX_PERCENT;
            self.completed_at.get_or_insert(now);
        }

        self.last_updated = now;
        self.synced = false;
        Ok(())
    }
}

/// A partial change to a [`ProgressRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// New completion flag.
    pub completed: Option<bool>,
    /// New percentage.
    pub percent: Option<u8>,
    /// Quiz score to record.
    pub quiz_score: Option<u8>,
}

impl ProgressUpdate {
    /// Set the completion percentage.
    pub fn percent(percent: u8) -> Self {
        Self {
            percent: Some(percent),
            ..Self::default()
        }
    }

    /// Mark the lesson completed.
    pub fn completed() -> Self {
        Self {
            completed: Some(true),
            ..Self::default()
        }
    }

    /// Record a quiz outcome. A passing score also completes the lesson.
    pub fn quiz(score: u8) -> Self {
        Self {
            quiz_score: Some(score),
            completed: (score >= PASSING_SCORE).then_some(true),
            ..Self::default()
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), WireError> {
        if let Some(percent) = self.percent {
            check_percent("percent", percent)?;
        }
        if let Some(score) = self.quiz_score {
            check_percent("quizScore", score)?;
        }
        Ok(())
    }
}

/// One quiz submission. Append-only apart from the `synced` flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    /// Submission id.
    pub id: QuizResultId,
    /// The lesson the quiz belongs to.
    pub lesson_id: LessonId,
    /// Score, 0..=100.
    pub score: u8,
    /// Chosen answer index per question id.
    pub answers: BTreeMap<String, u32>,
    /// Time spent answering.
    pub time_spent_seconds: u32,
    /// Submission time.
    pub completed_at: Timestamp,
    /// Whether the remote store has confirmed this result.
    pub synced: bool,
}

impl QuizResult {
    /// Create an unsynced submission with a fresh id.
    pub fn new(
        lesson_id: LessonId,
        score: u8,
        answers: BTreeMap<String, u32>,
        time_spent_seconds: u32,
        completed_at: Timestamp,
    ) -> Self {
        Self {
            id: QuizResultId::random(),
            lesson_id,
            score,
            answers,
            time_spent_seconds,
            completed_at,
            synced: false,
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), WireError> {
        check_percent("score", self.score)
    }

    /// Whether this score completes the lesson.
    pub fn passed(&self) -> bool {
        self.score >= PASSING_SCORE
    }
}

/// Kind of mutation carried by a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncKind {
    /// A [`ProgressRecord`] snapshot.
    Progress,
    /// A [`QuizResult`].
    QuizResult,
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncKind::Progress => f.write_str("progress"),
            SyncKind::QuizResult => f.write_str("quizResult"),
        }
    }
}

/// The record snapshot a queue item will push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum SyncPayload {
    /// Progress snapshot.
    Progress(ProgressRecord),
    /// Quiz submission.
    QuizResult(QuizResult),
}

impl SyncPayload {
    /// The kind of this payload.
    pub fn kind(&self) -> SyncKind {
        match self {
            SyncPayload::Progress(_) => SyncKind::Progress,
            SyncPayload::QuizResult(_) => SyncKind::QuizResult,
        }
    }

    /// Key of the local record this payload mirrors.
    pub fn record_key(&self) -> &str {
        match self {
            SyncPayload::Progress(p) => p.lesson_id.as_str(),
            SyncPayload::QuizResult(q) => q.id.as_str(),
        }
    }

    /// The payload as a JSON object, ready for the remote store.
    pub fn to_document(&self) -> Result<serde_json::Value, WireError> {
        let value = match self {
            SyncPayload::Progress(p) => serde_json::to_value(p),
            SyncPayload::QuizResult(q) => serde_json::to_value(q),
        };
        value.map_err(WireError::Encode)
    }
}

/// A pending local mutation awaiting remote confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    /// Queue item id.
    pub id: QueueItemId,
    /// What to push.
    pub payload: SyncPayload,
    /// Enqueue time.
    pub created_at: Timestamp,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// Time of the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<Timestamp>,
}

impl SyncQueueItem {
    /// A new item with zero attempts.
    pub fn new(payload: SyncPayload, created_at: Timestamp) -> Self {
        Self {
            id: QueueItemId::random(),
            payload,
            created_at,
            attempts: 0,
            last_attempt_at: None,
        }
    }

    /// The kind of mutation.
    pub fn kind(&self) -> SyncKind {
        self.payload.kind()
    }
}
