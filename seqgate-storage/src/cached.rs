use std::{fmt::Display, sync::Arc};

use bytes::Bytes;
use futures::stream::BoxStream;
use seqgate_blob::{identity::BlobIdentity, properties::BlobProperties};

use crate::{
    error::StorageResult,
    properties_cache::{CacheLookup, PropertiesCache},
    BlobStorage,
};

/// Wraps a storage driver with the properties lookaside.
#[derive(Debug, Clone)]
pub struct CachedBlobStorage<S: BlobStorage> {
    properties_cache: Arc<PropertiesCache>,
    inner: S,
}

impl<S: BlobStorage + Display> Display for CachedBlobStorage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CachedBlobStorage wrapping: {}", self.inner)
    }
}

impl<S: BlobStorage> CachedBlobStorage<S> {
    pub fn new(inner: S, properties_cache: Arc<PropertiesCache>) -> Self {
        Self {
            properties_cache,
            inner,
        }
    }

    pub async fn lookup_cached_properties(
        &self,
        sat: i16,
        key: i32,
        last_modified: Option<i64>,
    ) -> CacheLookup {
        self.properties_cache.lookup(sat, key, last_modified).await
    }
}

#[async_trait::async_trait]
impl<S: BlobStorage> BlobStorage for CachedBlobStorage<S> {
    async fn fetch_properties(
        &self,
        blob: &BlobIdentity,
        last_modified: Option<i64>,
    ) -> StorageResult<Option<BlobProperties>> {
        match self
            .lookup_cached_properties(blob.sat(), blob.key(), last_modified)
            .await
        {
            CacheLookup::Found(props) => return Ok(Some(props)),
            CacheLookup::Miss => {}
            CacheLookup::Error(err) => {
                tracing::warn!(%blob, ?last_modified, "Cached blob properties unusable, querying backend: {}", err);
            }
        }

        let props = self.inner.fetch_properties(blob, last_modified).await?;
        if let Some(props) = &props {
            self.properties_cache.insert(props, last_modified).await;
        }
        Ok(props)
    }

    fn fetch_data(&self, blob: &BlobIdentity) -> BoxStream<'static, StorageResult<Bytes>> {
        self.inner.fetch_data(blob)
    }

    async fn fetch_public_comment(&self, blob: &BlobIdentity) -> StorageResult<Option<String>> {
        self.inner.fetch_public_comment(blob).await
    }
}
