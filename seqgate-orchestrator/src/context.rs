use std::sync::Arc;

use seqgate_blob::{completeness::CompletenessPolicy, identity::KeyspaceRegistry};
use seqgate_cache::{ExcludeCache, SplitIndexCache};

/// Process-wide collaborators shared by every request.
#[derive(Debug, Clone)]
pub struct RetrievalContext {
    pub registry: Arc<KeyspaceRegistry>,
    pub exclude_cache: Arc<ExcludeCache>,
    pub split_index_cache: Arc<SplitIndexCache>,
    pub policy: CompletenessPolicy,
}
