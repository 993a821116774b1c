mod local;

pub use local::LocalKeyStore;

use async_trait::async_trait;
use mediarelay_core::ApiKeyRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key store I/O error: {0}")]
    Io(String),

    #[error("key store is corrupt: {0}")]
    Corrupt(String),
}

/// Durable collection of issued API keys.
///
/// Implementations must serialize writers: `append` is a read-modify-write
/// of the whole collection and two concurrent appends must both land.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Read the full collection. A missing backing resource is initialized
    /// to an empty collection.
    async fn load(&self) -> Result<Vec<ApiKeyRecord>, StoreError>;

    /// Add a record to the collection.
    async fn append(&self, record: ApiKeyRecord) -> Result<(), StoreError>;

    /// Exact-match lookup by token.
    async fn find(&self, key: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        Ok(self.load().await?.into_iter().find(|r| r.key == key))
    }

    /// Number of records, expired ones included.
    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.load().await?.len())
    }
}
