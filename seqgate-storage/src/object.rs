//! [`BlobStorage`] over any [`ObjectStore`].
//!
//! Layout, per blob:
//!
//! ```text
//! <keyspace>/<key>/props/<last_modified>.json
//! <keyspace>/<key>/blob
//! <keyspace>/<key>/public_comment.txt
//! ```

use std::{fmt::Display, sync::Arc};

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use object_store::{path::Path, ObjectStore, PutPayload};
use seqgate_blob::{identity::BlobIdentity, properties::BlobProperties};

use crate::{
    error::{StorageError, StorageResult},
    BlobStorage,
};

#[derive(Debug, Clone)]
pub struct ObjectBlobStorage {
    inner: Arc<dyn ObjectStore>,
}

impl Display for ObjectBlobStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectBlobStorage wrapping: {}", self.inner)
    }
}

impl ObjectBlobStorage {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    fn blob_root(blob: &BlobIdentity) -> Path {
        Path::from(blob.keyspace().name.as_str()).child(blob.key().to_string())
    }

    fn props_prefix(blob: &BlobIdentity) -> Path {
        Self::blob_root(blob).child("props")
    }

    fn props_path(blob: &BlobIdentity, last_modified: i64) -> Path {
        Self::props_prefix(blob).child(format!("{last_modified}.json"))
    }

    fn data_path(blob: &BlobIdentity) -> Path {
        Self::blob_root(blob).child("blob")
    }

    fn comment_path(blob: &BlobIdentity) -> Path {
        Self::blob_root(blob).child("public_comment.txt")
    }

    /// Stores a blob version: its properties and (replacing any previous) data.
    pub async fn put_blob(
        &self,
        blob: &BlobIdentity,
        props: &BlobProperties,
        data: Bytes,
    ) -> StorageResult<()> {
        self.put_properties(blob, props).await?;
        self.inner
            .put(&Self::data_path(blob), PutPayload::from(data))
            .await?;
        Ok(())
    }

    /// Stores a properties version without data, e.g. for a blob whose data lives elsewhere.
    pub async fn put_properties(&self, blob: &BlobIdentity, props: &BlobProperties) -> StorageResult<()> {
        let json = props.to_json()?;
        self.inner
            .put(
                &Self::props_path(blob, props.last_modified),
                PutPayload::from(json),
            )
            .await?;
        Ok(())
    }

    pub async fn put_public_comment(&self, blob: &BlobIdentity, comment: &str) -> StorageResult<()> {
        self.inner
            .put(
                &Self::comment_path(blob),
                PutPayload::from(comment.as_bytes().to_vec()),
            )
            .await?;
        Ok(())
    }

    async fn latest_version(&self, blob: &BlobIdentity) -> StorageResult<Option<i64>> {
        let prefix = Self::props_prefix(blob);
        let objects: Vec<_> = self.inner.list(Some(&prefix)).try_collect().await?;

        let mut latest = None;
        for meta in objects {
            let file_name = meta.location.filename().unwrap_or_default();
            let version = file_name
                .strip_suffix(".json")
                .and_then(|stem| stem.parse::<i64>().ok())
                .ok_or_else(|| StorageError::InvalidVersion(meta.location.to_string()))?;
            latest = latest.max(Some(version));
        }
        Ok(latest)
    }

    async fn get_optional(&self, path: &Path) -> StorageResult<Option<Bytes>> {
        match self.inner.get(path).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait::async_trait]
impl BlobStorage for ObjectBlobStorage {
    async fn fetch_properties(
        &self,
        blob: &BlobIdentity,
        last_modified: Option<i64>,
    ) -> StorageResult<Option<BlobProperties>> {
        let version = match last_modified {
            Some(version) => version,
            None => match self.latest_version(blob).await? {
                Some(version) => version,
                None => return Ok(None),
            },
        };

        let Some(bytes) = self.get_optional(&Self::props_path(blob, version)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn fetch_data(&self, blob: &BlobIdentity) -> BoxStream<'static, StorageResult<Bytes>> {
        let store = self.inner.clone();
        let path = Self::data_path(blob);

        futures::stream::once(async move {
            match store.get(&path).await {
                Ok(result) => result.into_stream().map_err(StorageError::from).boxed(),
                Err(err) => futures::stream::iter([Err(StorageError::from(err))]).boxed(),
            }
        })
        .flatten()
        .boxed()
    }

    async fn fetch_public_comment(&self, blob: &BlobIdentity) -> StorageResult<Option<String>> {
        Ok(self
            .get_optional(&Self::comment_path(blob))
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }
}
