//! Lesson library - lessons and their file blobs in the local store.
//!
//! Lessons come from three places: a local upload, a completed peer
//! transfer, or a remote pull (see [`crate::SyncEngine::pull`]). After
//! creation the only permitted change is attaching a file reference.

use std::sync::Arc;

use mesh_store::LocalStore;
use mesh_types::{now_millis, FileId, FileRecord, FileRef, Lesson, LessonId};

use crate::error::{ClientError, ClientResult};
use crate::session::ReceivedFile;

/// Reads and writes lessons.
pub struct LessonLibrary<S: LocalStore> {
    store: Arc<S>,
}

impl<S: LocalStore> LessonLibrary<S> {
    /// Create a library over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Store an uploaded file and create a lesson pointing at it.
    pub async fn add_upload(
        &self,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        title: &str,
        topic: &str,
    ) -> ClientResult<Lesson> {
        require("file name", name)?;
        let now = now_millis();
        let file = FileRecord::new(FileId::random(), name, mime_type, bytes, now);
        self.add_file_lesson(file, title, topic).await
    }

    /// Store a file received from a peer and create a lesson for it.
    ///
    /// The transfer's file id is kept as the stored file id unless a file
    /// with that id already exists, in which case a fresh id is minted.
    /// Stored files are never replaced.
    pub async fn import_received(
        &self,
        received: ReceivedFile,
        title: &str,
        topic: &str,
    ) -> ClientResult<Lesson> {
        require("file name", &received.name)?;
        let file = received.into_record(now_millis());
        self.add_file_lesson(file, title, topic).await
    }

    async fn add_file_lesson(
        &self,
        file: FileRecord,
        title: &str,
        topic: &str,
    ) -> ClientResult<Lesson> {
        require("title", title)?;
        require("topic", topic)?;

        let mut file = file;
        if !self.store.put_file(&file).await? {
            let taken = std::mem::replace(&mut file.id, FileId::random());
            tracing::debug!("File id {} already stored; using {}", taken, file.id);
            if !self.store.put_file(&file).await? {
                return Err(ClientError::InvalidArgument(format!(
                    "file id {} already stored",
                    file.id
                )));
            }
        }
        let lesson = Lesson {
            id: LessonId::random(),
            title: title.trim().to_string(),
            topic: topic.trim().to_string(),
            file_ref: Some(FileRef::Local(file.id.clone())),
            created_at: file.created_at,
        };
        self.store.put_lesson(&lesson).await?;

        tracing::info!(
            "Added lesson {} ({}, {} bytes)",
            lesson.id,
            file.name,
            file.size_bytes
        );
        Ok(lesson)
    }

    /// Attach or replace a lesson's file reference.
    pub async fn attach_file_ref(
        &self,
        lesson_id: &LessonId,
        file_ref: FileRef,
    ) -> ClientResult<Lesson> {
        let mut lesson = self.require_lesson(lesson_id).await?;
        lesson.file_ref = Some(file_ref);
        self.store.put_lesson(&lesson).await?;
        Ok(lesson)
    }

    /// Every lesson, newest first.
    pub async fn list_lessons(&self) -> ClientResult<Vec<Lesson>> {
        Ok(self.store.list_lessons().await?)
    }

    /// Get a lesson by id.
    pub async fn get_lesson(&self, lesson_id: &LessonId) -> ClientResult<Option<Lesson>> {
        Ok(self.store.get_lesson(lesson_id).await?)
    }

    /// The locally stored file behind a lesson, if it has one.
    ///
    /// Returns `None` for lessons without a reference, with a remote URL,
    /// or whose file is missing.
    pub async fn file_for(&self, lesson: &Lesson) -> ClientResult<Option<FileRecord>> {
        match &lesson.file_ref {
            Some(FileRef::Local(file_id)) => Ok(self.store.get_file(file_id).await?),
            _ => Ok(None),
        }
    }

    async fn require_lesson(&self, lesson_id: &LessonId) -> ClientResult<Lesson> {
        self.store
            .get_lesson(lesson_id)
            .await?
            .ok_or_else(|| ClientError::InvalidArgument(format!("unknown lesson {}", lesson_id)))
    }
}

fn require(field: &str, value: &str) -> ClientResult<()> {
    if value.trim().is_empty() {
        return Err(ClientError::InvalidArgument(format!("{} is empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_store::MemoryStore;
    use mesh_types::ErrorKind;

    fn library() -> LessonLibrary<MemoryStore> {
        LessonLibrary::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn upload_creates_file_and_lesson() {
        let lib = library();
        let lesson = lib
            .add_upload("intro.pdf", "application/pdf", vec![1, 2, 3], "Intro", "Science")
            .await
            .unwrap();

        let file = lib.file_for(&lesson).await.unwrap().unwrap();
        assert_eq!(file.bytes, vec![1, 2, 3]);
        assert_eq!(file.name, "intro.pdf");
        assert_eq!(lib.list_lessons().await.unwrap(), vec![lesson]);
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let lib = library();
        for (name, title, topic) in [("", "t", "p"), ("a", " ", "p"), ("a", "t", "")] {
            let err = lib
                .add_upload(name, "text/plain", vec![], title, topic)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
        assert!(lib.list_lessons().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn received_file_keeps_its_id() {
        let lib = library();
        let received = ReceivedFile {
            id: FileId::from("transfer-1"),
            name: "notes.txt".into(),
            mime_type: "text/plain".into(),
            bytes: b"hello".to_vec(),
        };

        let lesson = lib
            .import_received(received, "Notes", "English")
            .await
            .unwrap();
        assert_eq!(
            lesson.file_ref,
            Some(FileRef::Local(FileId::from("transfer-1")))
        );
        assert_eq!(lib.file_for(&lesson).await.unwrap().unwrap().bytes, b"hello");
    }

    #[tokio::test]
    async fn reused_transfer_id_never_replaces_a_stored_file() {
        let lib = library();
        let first = ReceivedFile {
            id: FileId::from("f1"),
            name: "fractions.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: vec![1; 64],
        };
        let second = ReceivedFile {
            id: FileId::from("f1"),
            name: "other.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: vec![2; 3],
        };

        let a = lib.import_received(first, "Fractions", "Math").await.unwrap();
        let b = lib.import_received(second, "Other", "Math").await.unwrap();

        let file_a = lib.file_for(&a).await.unwrap().unwrap();
        assert_eq!(file_a.id, FileId::from("f1"));
        assert_eq!(file_a.name, "fractions.pdf");
        assert_eq!(file_a.bytes, vec![1; 64]);

        let file_b = lib.file_for(&b).await.unwrap().unwrap();
        assert_ne!(file_b.id, FileId::from("f1"));
        assert_eq!(file_b.name, "other.pdf");
        assert_eq!(file_b.bytes, vec![2; 3]);
    }

    #[tokio::test]
    async fn attach_file_ref_updates_only_the_reference() {
        let lib = library();
        let lesson = lib
            .add_upload("a.pdf", "application/pdf", vec![0], "A", "B")
            .await
            .unwrap();

        let url = FileRef::Remote("https://cdn.example/a.pdf".into());
        let updated = lib.attach_file_ref(&lesson.id, url.clone()).await.unwrap();
        assert_eq!(updated.file_ref, Some(url));
        assert_eq!(updated.title, lesson.title);
        assert_eq!(lib.file_for(&updated).await.unwrap(), None);

        let err = lib
            .attach_file_ref(&"missing".into(), FileRef::Remote("x".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
