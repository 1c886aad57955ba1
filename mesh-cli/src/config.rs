//! Data directory handling for edumesh.

use anyhow::{Context, Result};
use mesh_client::{ClientConfig, LessonLibrary, SyncQueue};
use mesh_store::SqliteStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the optional configuration file inside the data directory.
pub const CONFIG_FILE: &str = "edumesh.toml";

/// Everything a command needs: configuration and the open local store.
pub struct AppContext {
    /// The data directory.
    pub data_dir: PathBuf,
    /// Loaded configuration (defaults if no file exists).
    pub config: ClientConfig,
    /// The local store.
    pub store: Arc<SqliteStore>,
    queue: SyncQueue<SqliteStore>,
}

impl AppContext {
    /// Load configuration and open the database in `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let config = load_config(data_dir)?;

        let db_path = data_dir.join(&config.storage.database);
        let store = SqliteStore::new(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;

        let store = Arc::new(store);
        let queue = SyncQueue::with_policy(Arc::clone(&store), config.sync.retry_policy());

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            config,
            store,
            queue,
        })
    }

    /// The sync queue, with the configured retry policy.
    pub fn queue(&self) -> &SyncQueue<SqliteStore> {
        &self.queue
    }

    /// The lesson library.
    pub fn library(&self) -> LessonLibrary<SqliteStore> {
        LessonLibrary::new(Arc::clone(&self.store))
    }
}

/// Read `edumesh.toml` from `data_dir`, falling back to defaults.
pub fn load_config(data_dir: &Path) -> Result<ClientConfig> {
    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        tracing::debug!("No {} in {}; using defaults", CONFIG_FILE, data_dir.display());
        return Ok(ClientConfig::default());
    }
    ClientConfig::from_file(&path).context("Invalid configuration")
}
