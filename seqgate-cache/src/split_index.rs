use std::{num::NonZeroUsize, sync::Arc};

use lru::LruCache;
use parking_lot::Mutex;
use seqgate_blob::{identity::BlobIdentity, split_index::SplitIndex};

/// Decoded split indexes keyed by the identity of their split-info record.
#[derive(Debug)]
pub struct SplitIndexCache {
    inner: Mutex<LruCache<BlobIdentity, Arc<SplitIndex>>>,
}

impl SplitIndexCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, info_blob: &BlobIdentity) -> Option<Arc<SplitIndex>> {
        self.inner.lock().get(info_blob).cloned()
    }

    pub fn insert(&self, info_blob: BlobIdentity, index: Arc<SplitIndex>) {
        self.inner.lock().put(info_blob, index);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
