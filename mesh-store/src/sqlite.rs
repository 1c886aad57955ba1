//! SQLite storage backend for mesh-store.

use crate::{check_file, LocalStore, StorageError, StorageResult};
use async_trait::async_trait;
use mesh_types::{
    FileId, FileRecord, Lesson, LessonId, ProgressRecord, QueueItemId, QuizResult, QuizResultId,
    SyncQueueItem,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// SQLite-based local store.
///
/// Records are kept as JSON documents keyed by id, so the schema does not
/// change when a record gains an optional field. File blobs are stored as
/// raw BLOB columns. Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    drain_lock: Arc<Mutex<()>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub async fn new(path: &Path) -> StorageResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            drain_lock: Arc::default(),
        };
        store.run_migrations().await?;
        tracing::debug!("Opened local store at {}", path.display());
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // One long-lived connection: each new :memory: connection is a
        // separate empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            drain_lock: Arc::default(),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS lessons (
                id TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                bytes BLOB NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS progress (
                lesson_id TEXT PRIMARY KEY,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quiz_results (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_queue (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                doc TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_lessons_created ON lessons(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn docs<T: DeserializeOwned>(
        &self,
        collection: &'static str,
        sql: &'static str,
    ) -> StorageResult<Vec<T>> {
        let docs: Vec<String> = sqlx::query_scalar(sql).fetch_all(&self.pool).await?;
        docs.iter().map(|doc| decode(collection, doc)).collect()
    }
}

fn encode<T: Serialize>(collection: &'static str, value: &T) -> StorageResult<String> {
    serde_json::to_string(value).map_err(StorageError::document(collection))
}

fn decode<T: DeserializeOwned>(collection: &'static str, doc: &str) -> StorageResult<T> {
    serde_json::from_str(doc).map_err(StorageError::document(collection))
}

#[async_trait]
impl LocalStore for SqliteStore {
    fn drain_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.drain_lock)
    }

    async fn put_lesson_if_absent(&self, lesson: &Lesson) -> StorageResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO lessons (id, created_at, doc) VALUES (?1, ?2, ?3)",
        )
        .bind(lesson.id.as_str())
        .bind(lesson.created_at as i64)
        .bind(encode("lessons", lesson)?)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn put_lesson(&self, lesson: &Lesson) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO lessons (id, created_at, doc) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET created_at = ?2, doc = ?3
            "#,
        )
        .bind(lesson.id.as_str())
        .bind(lesson.created_at as i64)
        .bind(encode("lessons", lesson)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_lesson(&self, id: &LessonId) -> StorageResult<Option<Lesson>> {
        let doc: Option<String> = sqlx::query_scalar("SELECT doc FROM lessons WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        doc.map(|d| decode("lessons", &d)).transpose()
    }

    async fn list_lessons(&self) -> StorageResult<Vec<Lesson>> {
        self.docs(
            "lessons",
            "SELECT doc FROM lessons ORDER BY created_at DESC, id ASC",
        )
        .await
    }

    async fn lesson_ids(&self) -> StorageResult<HashSet<LessonId>> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM lessons")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().map(LessonId::from).collect())
    }

    async fn put_file(&self, file: &FileRecord) -> StorageResult<bool> {
        check_file(file)?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO files (id, name, mime_type, size_bytes, bytes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(file.id.as_str())
        .bind(&file.name)
        .bind(&file.mime_type)
        .bind(file.size_bytes as i64)
        .bind(&file.bytes)
        .bind(file.created_at as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("File {} already stored", file.id);
            return Ok(false);
        }
        tracing::debug!("Stored file {} ({} bytes)", file.id, file.size_bytes);
        Ok(true)
    }

    async fn get_file(&self, id: &FileId) -> StorageResult<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, name, mime_type, size_bytes, bytes, created_at
            FROM files
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(FileRecord::try_from).transpose()
    }

    async fn put_progress(&self, record: &ProgressRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO progress (lesson_id, doc) VALUES (?1, ?2)
            ON CONFLICT(lesson_id) DO UPDATE SET doc = ?2
            "#,
        )
        .bind(record.lesson_id.as_str())
        .bind(encode("progress", record)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_progress(&self, lesson_id: &LessonId) -> StorageResult<Option<ProgressRecord>> {
        let doc: Option<String> =
            sqlx::query_scalar("SELECT doc FROM progress WHERE lesson_id = ?1")
                .bind(lesson_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        doc.map(|d| decode("progress", &d)).transpose()
    }

    async fn list_progress(&self) -> StorageResult<Vec<ProgressRecord>> {
        self.docs("progress", "SELECT doc FROM progress ORDER BY lesson_id ASC")
            .await
    }

    async fn mark_progress_synced(&self, lesson_id: &LessonId) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let doc: Option<String> =
            sqlx::query_scalar("SELECT doc FROM progress WHERE lesson_id = ?1")
                .bind(lesson_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;

        let Some(doc) = doc else {
            return Ok(false);
        };
        let mut record: ProgressRecord = decode("progress", &doc)?;
        if !record.synced {
            record.synced = true;
            sqlx::query("UPDATE progress SET doc = ?2 WHERE lesson_id = ?1")
                .bind(lesson_id.as_str())
                .bind(encode("progress", &record)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn put_quiz_result(&self, result: &QuizResult) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quiz_results (id, doc) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET doc = ?2
            "#,
        )
        .bind(result.id.as_str())
        .bind(encode("quizResults", result)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_quiz_results(&self) -> StorageResult<Vec<QuizResult>> {
        self.docs("quizResults", "SELECT doc FROM quiz_results ORDER BY seq ASC")
            .await
    }

    async fn mark_quiz_result_synced(&self, id: &QuizResultId) -> StorageResult<bool> {
        let mut tx = self.pool.begin().await?;

        let doc: Option<String> = sqlx::query_scalar("SELECT doc FROM quiz_results WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(doc) = doc else {
            return Ok(false);
        };
        let mut result: QuizResult = decode("quizResults", &doc)?;
        if !result.synced {
            result.synced = true;
            sqlx::query("UPDATE quiz_results SET doc = ?2 WHERE id = ?1")
                .bind(id.as_str())
                .bind(encode("quizResults", &result)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn push_queue_item(&self, item: &SyncQueueItem) -> StorageResult<()> {
        sqlx::query("INSERT INTO sync_queue (id, doc) VALUES (?1, ?2)")
            .bind(item.id.as_str())
            .bind(encode("syncQueue", item)?)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_queue(&self) -> StorageResult<Vec<SyncQueueItem>> {
        self.docs("syncQueue", "SELECT doc FROM sync_queue ORDER BY seq ASC")
            .await
    }

    async fn update_queue_item(&self, item: &SyncQueueItem) -> StorageResult<()> {
        let result = sqlx::query("UPDATE sync_queue SET doc = ?2 WHERE id = ?1")
            .bind(item.id.as_str())
            .bind(encode("syncQueue", item)?)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                collection: "syncQueue",
                key: item.id.to_string(),
            });
        }
        Ok(())
    }

    async fn remove_queue_item(&self, id: &QueueItemId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn queue_len(&self) -> StorageResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }
}

/// Internal row type for file queries.
#[derive(sqlx::FromRow)]
struct FileRow {
    id: String,
    name: String,
    mime_type: String,
    size_bytes: i64,
    bytes: Vec<u8>,
    created_at: i64,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = StorageError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        let record = FileRecord {
            id: FileId::from(row.id),
            name: row.name,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes as u64,
            bytes: row.bytes,
            created_at: row.created_at as u64,
        };
        check_file(&record)?;
        Ok(record)
    }
}
