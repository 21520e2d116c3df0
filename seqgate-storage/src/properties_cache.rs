//! In-memory lookaside for blob property records.
//!
//! Records are kept serialized, the way they come off the wire, so a lookup
//! can fail to decode; such hits are reported as [`CacheLookup::Error`] and
//! the caller goes to the backend.

use std::time::Duration;

use bytes::Bytes;
use seqgate_blob::properties::BlobProperties;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Found(BlobProperties),
    Miss,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    sat: i16,
    key: i32,
    /// `None` caches "the latest version".
    last_modified: Option<i64>,
}

#[derive(Debug)]
pub struct PropertiesCache {
    inner: moka::future::Cache<CacheKey, Bytes>,
}

impl PropertiesCache {
    /// `latest_ttl` bounds how long a "latest version" answer may be reused.
    pub fn new(max_capacity: u64, latest_ttl: Duration) -> Self {
        Self {
            inner: moka::future::Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(latest_ttl)
                .build(),
        }
    }

    pub async fn lookup(&self, sat: i16, key: i32, last_modified: Option<i64>) -> CacheLookup {
        let cache_key = CacheKey {
            sat,
            key,
            last_modified,
        };
        match self.inner.get(&cache_key).await {
            None => CacheLookup::Miss,
            Some(bytes) => match serde_json::from_slice::<BlobProperties>(&bytes) {
                Ok(props) => CacheLookup::Found(props),
                Err(err) => {
                    self.inner.invalidate(&cache_key).await;
                    CacheLookup::Error(err.to_string())
                }
            },
        }
    }

    /// Caches `props` under its own version and under the version the caller asked for.
    pub async fn insert(&self, props: &BlobProperties, requested: Option<i64>) {
        let Ok(json) = props.to_json() else {
            return;
        };
        let bytes = Bytes::from(json);
        for last_modified in [Some(props.last_modified), requested] {
            self.insert_raw(props.sat, props.key, last_modified, bytes.clone())
                .await;
        }
    }

    pub(crate) async fn insert_raw(
        &self,
        sat: i16,
        key: i32,
        last_modified: Option<i64>,
        bytes: Bytes,
    ) {
        self.inner
            .insert(
                CacheKey {
                    sat,
                    key,
                    last_modified,
                },
                bytes,
            )
            .await;
    }
}
