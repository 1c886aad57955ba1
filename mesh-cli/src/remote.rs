//! Directory-backed remote store.
//!
//! Each collection is one JSON array file (`lessons.json`, `progress.json`,
//! `quizResults.json`) in the remote directory. Good enough to hand
//! lessons between machines on a shared drive or USB stick, and to
//! exercise the sync engine without a server.

use async_trait::async_trait;
use mesh_client::{sort_newest_first, Collection, RemoteError, RemoteStore};
use mesh_types::now_millis;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Remote store kept as JSON files in a directory.
#[derive(Debug, Clone)]
pub struct FileRemote {
    dir: PathBuf,
}

impl FileRemote {
    /// Use `dir` as the remote. The directory must exist.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection))
    }

    async fn read(&self, collection: Collection) -> Result<Vec<Value>, RemoteError> {
        if !self.dir.is_dir() {
            return Err(RemoteError::Unavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }

        let path = self.path(collection);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RemoteError::Unavailable(e.to_string())),
        };
        serde_json::from_str(&contents)
            .map_err(|e| RemoteError::Malformed(format!("{}: {}", path.display(), e)))
    }

    async fn write(&self, collection: Collection, records: &[Value]) -> Result<(), RemoteError> {
        let contents = serde_json::to_string_pretty(records)
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;

        // Write then rename so a reader never sees half a file.
        let path = self.path(collection);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for FileRemote {
    async fn add_record(
        &self,
        collection: Collection,
        mut record: Value,
    ) -> Result<String, RemoteError> {
        let mut records = self.read(collection).await?;

        let Some(doc) = record.as_object_mut() else {
            return Err(RemoteError::Rejected("record is not an object".into()));
        };
        let remote_id = next_remote_id(collection, records.len());
        doc.insert("remoteId".into(), Value::from(remote_id.clone()));
        doc.insert("syncedAt".into(), Value::from(now_millis()));

        records.push(record);
        self.write(collection, &records).await?;
        Ok(remote_id)
    }

    async fn list_records(
        &self,
        collection: Collection,
        order_by: &str,
    ) -> Result<Vec<Value>, RemoteError> {
        let mut records = self.read(collection).await?;
        sort_newest_first(&mut records, order_by);
        Ok(records)
    }
}

fn next_remote_id(collection: Collection, position: usize) -> String {
    format!("{}-{}-{}", collection, position + 1, now_millis())
}
