use std::{sync::Arc, time::Instant};

use seqgate_blob::{completeness::CompletenessPolicy, identity::KeyspaceRegistry};
use seqgate_cache::{ExcludeCache, ExcludeCacheOptions, SplitIndexCache};
use seqgate_config::CONFIG;
use seqgate_orchestrator::{
    context::RetrievalContext,
    reply::{MessageCode, ReplyMessage, ReplySink, Severity},
    request::BlobRequest,
    runtime::BlobRetrieval,
};
use seqgate_storage::{
    get_keyspaces_object_store, BlobStorage, CachedBlobStorage, ObjectBlobStorage, PropertiesCache,
};
use tokio_util::sync::CancellationToken;

use crate::reply::{FrameStream, PsgReplySink};

/// Everything the HTTP handlers share.
#[derive(Debug)]
pub struct GatewayRuntime {
    retrieval: BlobRetrieval,
    shutdown: CancellationToken,
}

impl GatewayRuntime {
    pub async fn new() -> anyhow::Result<Self> {
        let registry = KeyspaceRegistry::from_mapping(&CONFIG.sat_mapping)?;
        let context = RetrievalContext {
            registry: Arc::new(registry),
            exclude_cache: Arc::new(ExcludeCache::new(ExcludeCacheOptions {
                resend_timeout: CONFIG.resend_timeout(),
                max_size: CONFIG.exclude_cache_max_size,
                inactivity_timeout: CONFIG.exclude_cache_inactivity(),
            })),
            split_index_cache: Arc::new(SplitIndexCache::new(CONFIG.split_index_cache_size)),
            policy: CompletenessPolicy::new(CONFIG.send_blob_if_small),
        };

        let object_store = get_keyspaces_object_store().await?;
        let properties_cache = Arc::new(PropertiesCache::new(
            CONFIG.properties_cache_size,
            CONFIG.properties_cache_ttl(),
        ));
        let storage = CachedBlobStorage::new(ObjectBlobStorage::new(object_store), properties_cache);

        let runtime = Self::from_parts(Arc::new(storage), context, CONFIG.split_index_decoders);
        runtime.spawn_exclude_cache_purge();
        Ok(runtime)
    }

    pub fn from_parts(
        storage: Arc<dyn BlobStorage>,
        context: RetrievalContext,
        split_index_decoders: usize,
    ) -> Self {
        Self {
            retrieval: BlobRetrieval::new(storage, context, split_index_decoders),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &KeyspaceRegistry {
        &self.retrieval.context().registry
    }

    /// Cancelled on shutdown; every in-flight request stops with it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Starts serving `request` and returns the framed reply as it is produced.
    pub fn serve(&self, request: BlobRequest) -> FrameStream {
        let (mut sink, frames) = PsgReplySink::channel();
        let retrieval = self.retrieval.clone();
        let cancel = self.shutdown.child_token();

        tokio::spawn(async move {
            let blob = request.blob_identity().clone();
            if let Err(err) = retrieval.run(request, &mut sink, cancel).await {
                tracing::error!(%blob, "Retrieval failed: {err}");
                sink.prepare_message(&ReplyMessage {
                    address: None,
                    severity: Severity::Error,
                    code: MessageCode::BackendError,
                    status: 500,
                    text: err.to_string(),
                });
                sink.prepare_reply_completion(500);
            }
        });

        frames
    }

    fn spawn_exclude_cache_purge(&self) {
        let exclude_cache = self.retrieval.context().exclude_cache.clone();
        let shutdown = self.shutdown.clone();
        let period = CONFIG.exclude_cache_inactivity();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        exclude_cache.purge_inactive(Instant::now());
                        tracing::debug!(entries = exclude_cache.len(), "Purged inactive exclude cache clients");
                    }
                }
            }
        });
    }
}
