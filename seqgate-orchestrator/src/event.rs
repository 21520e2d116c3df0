use std::sync::Arc;

use bytes::Bytes;
use seqgate_blob::{identity::BlobIdentity, properties::BlobProperties, split_index::SplitIndex};

use crate::{fetch::FetchId, reply::ReplyItem};

#[derive(Debug, Clone)]
pub enum PropertiesOutcome {
    Found(BlobProperties),
    NotFound,
    Failed(String),
}

/// Completion of one asynchronous operation started by an [`Effect`].
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Properties {
        fetch: FetchId,
        outcome: PropertiesOutcome,
    },
    /// One piece of a data stream, in backend order.
    Data {
        fetch: FetchId,
        bytes: Bytes,
    },
    DataEnd {
        fetch: FetchId,
    },
    DataFailed {
        fetch: FetchId,
        not_found: bool,
        error: String,
    },
    PublicComment {
        fetch: FetchId,
        outcome: Result<Option<String>, String>,
    },
    SplitIndexDecoded {
        fetch: FetchId,
        result: Result<Arc<SplitIndex>, String>,
    },
}

impl FetchEvent {
    pub fn fetch(&self) -> FetchId {
        match self {
            FetchEvent::Properties { fetch, .. }
            | FetchEvent::Data { fetch, .. }
            | FetchEvent::DataEnd { fetch }
            | FetchEvent::DataFailed { fetch, .. }
            | FetchEvent::PublicComment { fetch, .. }
            | FetchEvent::SplitIndexDecoded { fetch, .. } => *fetch,
        }
    }
}

/// Work the orchestrator asks its driver to perform.
#[derive(Debug, Clone)]
pub enum Effect {
    FetchProperties {
        fetch: FetchId,
        blob: BlobIdentity,
        last_modified: Option<i64>,
    },
    FetchData {
        fetch: FetchId,
        blob: BlobIdentity,
    },
    FetchPublicComment {
        fetch: FetchId,
        blob: BlobIdentity,
    },
    /// Decode a split-info payload off the event loop.
    DecodeSplitIndex {
        fetch: FetchId,
        info_blob: BlobIdentity,
        payload: Bytes,
    },
    /// Best effort: the driver stops producing events for this fetch.
    StopFetch {
        fetch: FetchId,
    },
    Reply(ReplyItem),
}
