use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mediarelay_core::ApiKeyRecord;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{KeyStore, StoreError};

/// Key store backed by a single pretty-printed JSON array on disk.
pub struct LocalKeyStore {
    path: PathBuf,
    // Held across every read-modify-write and across first-time init.
    write_lock: Mutex<()>,
}

impl LocalKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_existing(&self) -> Result<Option<Vec<ApiKeyRecord>>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| StoreError::Corrupt(format!("{}: {e}", self.path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(format!(
                "read {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Caller must hold `write_lock`.
    async fn read_or_init(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        match self.read_existing().await? {
            Some(records) => Ok(records),
            None => {
                self.write_all(&[]).await?;
                info!("initialized empty key store at {}", self.path.display());
                Ok(Vec::new())
            }
        }
    }

    /// Write the collection to a sibling temp file, then rename it over the
    /// target so readers never observe a partial document.
    async fn write_all(&self, records: &[ApiKeyRecord]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(format!("mkdir {}: {e}", parent.display())))?;
        }
        let data = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::Io(format!("serialize: {e}")))?;

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| StoreError::Io(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            StoreError::Io(format!(
                "rename {} -> {}: {e}",
                tmp.display(),
                self.path.display()
            ))
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "apiKeys.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl KeyStore for LocalKeyStore {
    async fn load(&self) -> Result<Vec<ApiKeyRecord>, StoreError> {
        if let Some(records) = self.read_existing().await? {
            return Ok(records);
        }
        let _guard = self.write_lock.lock().await;
        self.read_or_init().await
    }

    async fn append(&self, record: ApiKeyRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_or_init().await?;
        records.push(record);
        self.write_all(&records).await?;
        debug!("key store now holds {} records", records.len());
        Ok(())
    }
}
