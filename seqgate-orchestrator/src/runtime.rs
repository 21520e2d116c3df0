//! Executes a [`FetchOrchestrator`] on tokio.
//!
//! Each fetch runs as its own task that posts [`FetchEvent`]s back to the
//! request's event loop. The loop owns the orchestrator and the reply sink,
//! so neither needs locking. Split-index decoding is the only CPU-bound work
//! and runs on the blocking pool, bounded by a semaphore shared by all
//! requests.

use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::StreamExt;
use seqgate_blob::{identity::BlobIdentity, split_index::SplitIndex};
use seqgate_storage::BlobStorage;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::{
    context::RetrievalContext,
    error::{RetrievalError, RetrievalResult},
    event::{Effect, FetchEvent, PropertiesOutcome},
    fetch::FetchId,
    orchestrator::{FetchOrchestrator, RequestOutcome},
    reply::ReplySink,
    request::BlobRequest,
};

type EventSender = mpsc::UnboundedSender<FetchEvent>;

/// How often a request with no pending events checks for a closed sink.
const SINK_CHECK_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TaskKey {
    Fetch(FetchId),
    Decode(FetchId),
}

impl TaskKey {
    /// The task a terminal event belongs to; `None` while the task keeps producing.
    fn completed_by(event: &FetchEvent) -> Option<Self> {
        match event {
            FetchEvent::Data { .. } => None,
            FetchEvent::SplitIndexDecoded { fetch, .. } => Some(TaskKey::Decode(*fetch)),
            FetchEvent::Properties { fetch, .. }
            | FetchEvent::DataEnd { fetch }
            | FetchEvent::DataFailed { fetch, .. }
            | FetchEvent::PublicComment { fetch, .. } => Some(TaskKey::Fetch(*fetch)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlobRetrieval {
    storage: Arc<dyn BlobStorage>,
    context: RetrievalContext,
    decode_permits: Arc<Semaphore>,
}

impl BlobRetrieval {
    pub fn new(storage: Arc<dyn BlobStorage>, context: RetrievalContext, split_index_decoders: usize) -> Self {
        Self {
            storage,
            context,
            decode_permits: Arc::new(Semaphore::new(split_index_decoders.max(1))),
        }
    }

    pub fn context(&self) -> &RetrievalContext {
        &self.context
    }

    /// Serves one request into `sink`. Cancelling `cancel`, or the sink
    /// reporting itself closed, stops all fetches of the request.
    pub async fn run(
        &self,
        request: BlobRequest,
        sink: &mut dyn ReplySink,
        cancel: CancellationToken,
    ) -> RetrievalResult<RequestOutcome> {
        let blob = request.blob_identity().clone();
        let mut orchestrator = FetchOrchestrator::new(request, self.context.clone());
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let request_token = cancel.child_token();
        let mut running: HashMap<TaskKey, CancellationToken> = HashMap::new();
        let mut sink_check = tokio::time::interval(SINK_CHECK_PERIOD);
        sink_check.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let effects = orchestrator.start();
        self.apply(effects, sink, &events_tx, &mut running, &request_token);

        let result = loop {
            if orchestrator.is_finished() {
                break Ok(orchestrator.outcome());
            }
            if sink.is_closed() {
                tracing::debug!(%blob, "Reply sink closed, cancelling request");
                let effects = orchestrator.cancel();
                self.apply(effects, sink, &events_tx, &mut running, &request_token);
                continue;
            }
            if running.is_empty() {
                break Err(RetrievalError::Stalled(orchestrator.state().to_string()));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let effects = orchestrator.cancel();
                    self.apply(effects, sink, &events_tx, &mut running, &request_token);
                }
                event = events_rx.recv() => {
                    let Some(event) = event else {
                        break Err(RetrievalError::EventChannelClosed);
                    };
                    if let Some(key) = TaskKey::completed_by(&event) {
                        running.remove(&key);
                    }
                    let effects = orchestrator.handle(event);
                    self.apply(effects, sink, &events_tx, &mut running, &request_token);
                }
                // the loop head cancels the request once the sink reports closed
                _ = sink_check.tick() => {}
            }
        };

        // whatever is still running belongs to discarded fetches
        request_token.cancel();
        if let Ok(outcome) = &result {
            tracing::debug!(%blob, state = %outcome.state, status = outcome.status, fallback = outcome.fallback_triggered, "Request finished");
        }
        result
    }

    fn apply(
        &self,
        effects: Vec<Effect>,
        sink: &mut dyn ReplySink,
        events: &EventSender,
        running: &mut HashMap<TaskKey, CancellationToken>,
        request_token: &CancellationToken,
    ) {
        for effect in effects {
            match effect {
                Effect::Reply(item) => item.send_to(sink),
                Effect::StopFetch { fetch } => {
                    if let Some(token) = running.remove(&TaskKey::Fetch(fetch)) {
                        token.cancel();
                    }
                }
                Effect::FetchProperties {
                    fetch,
                    blob,
                    last_modified,
                } => {
                    let token = Self::register(running, TaskKey::Fetch(fetch), request_token);
                    tokio::spawn(fetch_properties(
                        self.storage.clone(),
                        fetch,
                        blob,
                        last_modified,
                        events.clone(),
                        token,
                    ));
                }
                Effect::FetchData { fetch, blob } => {
                    let token = Self::register(running, TaskKey::Fetch(fetch), request_token);
                    tokio::spawn(fetch_data(self.storage.clone(), fetch, blob, events.clone(), token));
                }
                Effect::FetchPublicComment { fetch, blob } => {
                    let token = Self::register(running, TaskKey::Fetch(fetch), request_token);
                    tokio::spawn(fetch_public_comment(
                        self.storage.clone(),
                        fetch,
                        blob,
                        events.clone(),
                        token,
                    ));
                }
                Effect::DecodeSplitIndex {
                    fetch,
                    info_blob,
                    payload,
                } => {
                    let token = Self::register(running, TaskKey::Decode(fetch), request_token);
                    tracing::debug!(%info_blob, bytes = payload.len(), "Decoding split index");
                    tokio::spawn(decode_split_index(
                        self.decode_permits.clone(),
                        fetch,
                        payload,
                        events.clone(),
                        token,
                    ));
                }
            }
        }
    }

    fn register(
        running: &mut HashMap<TaskKey, CancellationToken>,
        key: TaskKey,
        request_token: &CancellationToken,
    ) -> CancellationToken {
        let token = request_token.child_token();
        running.insert(key, token.clone());
        token
    }
}

async fn fetch_properties(
    storage: Arc<dyn BlobStorage>,
    fetch: FetchId,
    blob: BlobIdentity,
    last_modified: Option<i64>,
    events: EventSender,
    token: CancellationToken,
) {
    let result = tokio::select! {
        _ = token.cancelled() => return,
        result = storage.fetch_properties(&blob, last_modified) => result,
    };
    let outcome = match result {
        Ok(Some(props)) => PropertiesOutcome::Found(props),
        Ok(None) => PropertiesOutcome::NotFound,
        Err(err) if err.is_not_found() => PropertiesOutcome::NotFound,
        Err(err) => PropertiesOutcome::Failed(err.to_string()),
    };
    let _ = events.send(FetchEvent::Properties { fetch, outcome });
}

async fn fetch_data(
    storage: Arc<dyn BlobStorage>,
    fetch: FetchId,
    blob: BlobIdentity,
    events: EventSender,
    token: CancellationToken,
) {
    let mut stream = storage.fetch_data(&blob);
    loop {
        let next = tokio::select! {
            _ = token.cancelled() => return,
            next = stream.next() => next,
        };
        let event = match next {
            Some(Ok(bytes)) => FetchEvent::Data { fetch, bytes },
            Some(Err(err)) => {
                let _ = events.send(FetchEvent::DataFailed {
                    fetch,
                    not_found: err.is_not_found(),
                    error: err.to_string(),
                });
                return;
            }
            None => {
                let _ = events.send(FetchEvent::DataEnd { fetch });
                return;
            }
        };
        if events.send(event).is_err() {
            return;
        }
    }
}

async fn fetch_public_comment(
    storage: Arc<dyn BlobStorage>,
    fetch: FetchId,
    blob: BlobIdentity,
    events: EventSender,
    token: CancellationToken,
) {
    let result = tokio::select! {
        _ = token.cancelled() => return,
        result = storage.fetch_public_comment(&blob) => result,
    };
    let _ = events.send(FetchEvent::PublicComment {
        fetch,
        outcome: result.map_err(|err| err.to_string()),
    });
}

async fn decode_split_index(
    permits: Arc<Semaphore>,
    fetch: FetchId,
    payload: bytes::Bytes,
    events: EventSender,
    token: CancellationToken,
) {
    let permit = tokio::select! {
        _ = token.cancelled() => return,
        permit = permits.acquire_owned() => permit,
    };
    let result = match permit {
        Ok(permit) => {
            let decoded = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                SplitIndex::decode(&payload)
            })
            .await;
            match decoded {
                Ok(Ok(index)) => Ok(Arc::new(index)),
                Ok(Err(err)) => Err(err.to_string()),
                Err(err) => Err(format!("Split index decoding task failed: {err}")),
            }
        }
        Err(err) => Err(err.to_string()),
    };
    let _ = events.send(FetchEvent::SplitIndexDecoded { fetch, result });
}
