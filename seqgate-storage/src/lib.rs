use std::{fmt::Debug, sync::Arc};

use bytes::Bytes;
use futures::stream::BoxStream;
use object_store::{local::LocalFileSystem, ObjectStore};
use seqgate_blob::{identity::BlobIdentity, properties::BlobProperties};

use crate::error::{StorageError, StorageResult};

pub mod cached;
pub mod error;
pub mod object;
pub mod properties_cache;

pub use cached::CachedBlobStorage;
pub use object::ObjectBlobStorage;
pub use properties_cache::{CacheLookup, PropertiesCache};

static KEYSPACES_OBJECT_STORE: tokio::sync::OnceCell<Arc<dyn ObjectStore>> =
    tokio::sync::OnceCell::const_new();

/// The local object store holding one directory per keyspace.
pub async fn get_keyspaces_object_store() -> StorageResult<Arc<dyn ObjectStore>> {
    KEYSPACES_OBJECT_STORE
        .get_or_try_init(|| async {
            let path = seqgate_config::KEYSPACES_DIR_PATH.clone();
            std::fs::create_dir_all(&path).map_err(|e| {
                StorageError::InitializationError(format!(
                    "Failed to create keyspaces directory {}: {}",
                    path.display(),
                    e
                ))
            })?;
            tracing::info!("Using LocalFileSystem object store at {}", path.display());
            let store = LocalFileSystem::new_with_prefix(path)?;
            Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ObjectStore>)
        })
        .await
        .cloned()
}

/// The storage driver as seen by the orchestrator.
#[async_trait::async_trait]
pub trait BlobStorage: Send + Sync + Debug {
    /// Properties of one blob version, or of the latest version when
    /// `last_modified` is `None`. `Ok(None)` means not found.
    async fn fetch_properties(
        &self,
        blob: &BlobIdentity,
        last_modified: Option<i64>,
    ) -> StorageResult<Option<BlobProperties>>;

    /// The blob bytes in storage order. The end of the stream is the
    /// "no more data" signal.
    fn fetch_data(&self, blob: &BlobIdentity) -> BoxStream<'static, StorageResult<Bytes>>;

    async fn fetch_public_comment(&self, blob: &BlobIdentity) -> StorageResult<Option<String>>;
}

#[async_trait::async_trait]
impl<T> BlobStorage for Arc<T>
where
    T: BlobStorage + ?Sized,
{
    async fn fetch_properties(
        &self,
        blob: &BlobIdentity,
        last_modified: Option<i64>,
    ) -> StorageResult<Option<BlobProperties>> {
        self.as_ref().fetch_properties(blob, last_modified).await
    }

    fn fetch_data(&self, blob: &BlobIdentity) -> BoxStream<'static, StorageResult<Bytes>> {
        self.as_ref().fetch_data(blob)
    }

    async fn fetch_public_comment(&self, blob: &BlobIdentity) -> StorageResult<Option<String>> {
        self.as_ref().fetch_public_comment(blob).await
    }
}
