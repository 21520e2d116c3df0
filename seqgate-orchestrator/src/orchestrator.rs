//! The per-request state machine.
//!
//! ```text
//! AwaitingProperties -> Authorizing -> DecidingPlan -> FetchingChunks -> Completing -> Done
//!          \                 \                               \
//!           +-----------------+-------------------------------+--> Failed
//! ```
//!
//! [`FetchOrchestrator`] never performs I/O. [`FetchOrchestrator::start`],
//! [`FetchOrchestrator::handle`] and [`FetchOrchestrator::cancel`] return the
//! effects the driver has to carry out, reply items included, in the order
//! they must happen. Whether the request is finished is decided by scanning
//! the whole fetch list after every event, since smart chunk selection may
//! append fetches after others already completed.

use std::{fmt::Display, sync::Arc};

use bytes::{Bytes, BytesMut};
use seqgate_blob::{
    completeness::{CompletenessPolicy, Plan},
    identity::BlobIdentity,
    properties::BlobProperties,
    split_descriptor::{SplitDescriptor, SPLIT_INFO_CHUNK},
    split_index::{SplitIndex, SplitIndexAnalyzer},
};
use seqgate_cache::DeliveryDecision;

use crate::{
    context::RetrievalContext,
    error::ErrorKind,
    event::{Effect, FetchEvent, PropertiesOutcome},
    fallback::{FallbackCause, FallbackController, FallbackTrigger},
    fetch::{FetchId, FetchKind, FetchList, FetchRecord, FetchRole},
    reply::{ItemAddress, MessageCode, ReplyItem, ReplyMessage, Severity},
    request::{BlobRequest, RequestTarget},
};

/// Status reported when the client goes away mid-request.
pub const CLIENT_CLOSED_STATUS: u16 = 499;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    AwaitingProperties,
    Authorizing,
    DecidingPlan,
    FetchingChunks,
    Completing,
    Done,
    Failed,
}

impl Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOutcome {
    pub state: RequestState,
    pub status: u16,
    pub fallback_triggered: bool,
}

#[derive(Debug)]
pub struct FetchOrchestrator {
    request: BlobRequest,
    context: RetrievalContext,
    main_address: ItemAddress,
    state: RequestState,
    status: u16,
    fetches: FetchList,
    fallback: FallbackController,
    outbox: Vec<Effect>,
    properties: Option<BlobProperties>,
    last_modified: Option<i64>,
    descriptor: Option<SplitDescriptor>,
    plan: Option<Plan>,
    split_info_payload: BytesMut,
    analysis_pending: bool,
    suppression_claimed: bool,
    data_delivered: bool,
    rejection_pending: bool,
}

impl FetchOrchestrator {
    pub fn new(request: BlobRequest, context: RetrievalContext) -> Self {
        let main_address = match &request.target {
            RequestTarget::Blob { blob, .. } => ItemAddress::Blob(blob.clone()),
            RequestTarget::Id2Chunk {
                descriptor, chunk, ..
            } => ItemAddress::Id2Chunk {
                id2_chunk: *chunk,
                id2_info: descriptor.to_string(),
            },
        };
        Self {
            request,
            context,
            main_address,
            state: RequestState::AwaitingProperties,
            status: 200,
            fetches: FetchList::default(),
            fallback: FallbackController::default(),
            outbox: Vec::new(),
            properties: None,
            last_modified: None,
            descriptor: None,
            plan: None,
            split_info_payload: BytesMut::new(),
            analysis_pending: false,
            suppression_claimed: false,
            data_delivered: false,
            rejection_pending: false,
        }
    }

    pub fn request(&self) -> &BlobRequest {
        &self.request
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn plan(&self) -> Option<Plan> {
        self.plan
    }

    pub fn descriptor(&self) -> Option<&SplitDescriptor> {
        self.descriptor.as_ref()
    }

    /// Version of the blob as first reported by the backend.
    pub fn last_modified(&self) -> Option<i64> {
        self.last_modified
    }

    pub fn fetches(&self) -> &FetchList {
        &self.fetches
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, RequestState::Done | RequestState::Failed)
    }

    pub fn outcome(&self) -> RequestOutcome {
        RequestOutcome {
            state: self.state,
            status: self.status,
            fallback_triggered: self.fallback.is_triggered(),
        }
    }

    /// Claims the delivery for the client and issues the properties fetch.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state != RequestState::AwaitingProperties || !self.fetches.is_empty() {
            return Vec::new();
        }

        let blob = self.request.blob_identity().clone();
        let client_id = self.request.suppression_client_id().to_string();
        if !client_id.is_empty() {
            match self.context.exclude_cache.try_begin_delivery(&client_id, &blob) {
                DeliveryDecision::Won => self.suppression_claimed = true,
                DeliveryDecision::AlreadyInFlight => {
                    self.skip(
                        MessageCode::BlobInProgress,
                        format!("Blob {blob} is already being sent to client {client_id}"),
                    );
                    return self.take_effects();
                }
                DeliveryDecision::RecentlyDelivered { age, remaining } => {
                    self.skip(
                        MessageCode::BlobSentRecently,
                        format!(
                            "Blob {blob} was sent to client {client_id} {} ms ago, try again in {} ms",
                            age.as_millis(),
                            remaining.as_millis()
                        ),
                    );
                    return self.take_effects();
                }
            }
        }

        let last_modified = match &self.request.target {
            RequestTarget::Blob { last_modified, .. } => *last_modified,
            RequestTarget::Id2Chunk { .. } => None,
        };
        let record = FetchRecord::new(
            blob.clone(),
            FetchKind::Properties,
            FetchRole::Main,
            self.main_address.clone(),
        );
        let fetch = self.fetches.push(record);
        tracing::debug!(
            %blob,
            %fetch,
            completeness = %self.request.completeness,
            ?last_modified,
            "Requesting blob properties"
        );
        self.outbox.push(Effect::FetchProperties {
            fetch,
            blob,
            last_modified,
        });
        self.take_effects()
    }

    pub fn handle(&mut self, event: FetchEvent) -> Vec<Effect> {
        let fetch = event.fetch();
        if self.is_finished() {
            tracing::trace!(%fetch, state = %self.state, "Event after request finished ignored");
            return Vec::new();
        }
        let Some(record) = self.fetches.get(fetch) else {
            tracing::warn!(%fetch, "Event for unknown fetch ignored");
            return Vec::new();
        };
        // decoding runs after the split-info fetch itself has finished
        let is_analysis = matches!(event, FetchEvent::SplitIndexDecoded { .. });
        if record.finished && !is_analysis {
            tracing::trace!(%fetch, blob = %record.target, discarded = record.discarded, "Event for finished fetch dropped");
            return Vec::new();
        }

        match event {
            FetchEvent::Properties { fetch, outcome } => self.on_properties(fetch, outcome),
            FetchEvent::Data { fetch, bytes } => self.on_data(fetch, bytes),
            FetchEvent::DataEnd { fetch } => self.on_data_end(fetch),
            FetchEvent::DataFailed {
                fetch,
                not_found,
                error,
            } => self.on_data_failed(fetch, not_found, error),
            FetchEvent::PublicComment { fetch, outcome } => self.on_public_comment(fetch, outcome),
            FetchEvent::SplitIndexDecoded { fetch, result } => self.on_split_index(fetch, result),
        }

        self.check_drained();
        self.take_effects()
    }

    /// Stops every running fetch. Data already sent is not retracted.
    pub fn cancel(&mut self) -> Vec<Effect> {
        if self.is_finished() {
            return Vec::new();
        }
        tracing::info!(blob = %self.request.blob_identity(), state = %self.state, "Request cancelled");
        self.stop_unfinished();
        self.release_suppression(false);
        self.message(
            Some(self.main_address.clone()),
            Severity::Warning,
            MessageCode::RequestCancelled,
            CLIENT_CLOSED_STATUS,
            "Request cancelled".to_string(),
        );
        self.finish(RequestState::Failed, CLIENT_CLOSED_STATUS);
        self.take_effects()
    }

    fn on_properties(&mut self, fetch: FetchId, outcome: PropertiesOutcome) {
        let Some(record) = self.fetches.get_mut(fetch) else {
            return;
        };
        record.finished = true;
        let role = record.role;
        let blob = record.target.clone();
        let address = record.address.clone();

        match role {
            FetchRole::Main if self.state == RequestState::AwaitingProperties => {
                self.on_main_properties(outcome)
            }
            FetchRole::SplitInfo | FetchRole::Chunk(_) => {
                self.on_split_properties(role, blob, address, outcome)
            }
            FetchRole::Main | FetchRole::Fallback => {
                tracing::warn!(%fetch, %blob, state = %self.state, "Unexpected properties event ignored")
            }
        }
    }

    fn on_main_properties(&mut self, outcome: PropertiesOutcome) {
        let blob = self.request.blob_identity().clone();
        let props = match outcome {
            PropertiesOutcome::Found(props) => props,
            PropertiesOutcome::NotFound => {
                return self.fail(
                    ErrorKind::NotFound,
                    MessageCode::BlobNotFound,
                    format!("Blob {blob} not found"),
                )
            }
            PropertiesOutcome::Failed(err) => {
                return self.fail(
                    ErrorKind::BackendTransport,
                    MessageCode::BackendError,
                    format!("Fetching properties of blob {blob} failed: {err}"),
                )
            }
        };

        self.state = RequestState::Authorizing;
        let restricted = props.is_restricted() && !blob.is_secure();
        let withdrawn = props.flags.withdrawn;
        self.properties = Some(props);
        if restricted {
            if withdrawn {
                self.rejection_pending = true;
                self.issue(
                    blob,
                    FetchKind::PublicComment,
                    FetchRole::Main,
                    self.main_address.clone(),
                );
            } else {
                self.reject(None);
            }
            return;
        }

        self.state = RequestState::DecidingPlan;
        self.decide_plan(blob);
    }

    fn decide_plan(&mut self, blob: BlobIdentity) {
        let Some(mut props) = self.properties.take() else {
            return;
        };
        if self.last_modified.is_none() {
            self.last_modified = Some(props.last_modified);
        }

        let parsed = props.id2_info.as_deref().map(str::parse::<SplitDescriptor>);
        match parsed {
            Some(Ok(descriptor)) => self.descriptor = Some(descriptor),
            Some(Err(err)) => {
                tracing::warn!(%blob, "Ignoring id2_info: {}", err);
                props.id2_info = None;
                self.message(
                    Some(self.main_address.clone()),
                    Severity::Warning,
                    MessageCode::MalformedSplitInfo,
                    ErrorKind::MalformedSplitDescriptor.status(self.request.origin),
                    format!("Ignoring id2_info of blob {blob}: {err}"),
                );
            }
            None => {}
        }

        let payload = match props.to_json() {
            Ok(json) => Bytes::from(json),
            Err(err) => {
                return self.fail(
                    ErrorKind::BackendTransport,
                    MessageCode::BackendError,
                    format!("Serializing properties of blob {blob} failed: {err}"),
                )
            }
        };
        self.reply(ReplyItem::Properties {
            address: self.main_address.clone(),
            payload,
        });
        self.reply(ReplyItem::PropertiesCompletion {
            address: self.main_address.clone(),
        });

        if props.flags.suppressed {
            self.issue(
                blob.clone(),
                FetchKind::PublicComment,
                FetchRole::Main,
                self.main_address.clone(),
            );
        }

        let threshold = self
            .context
            .policy
            .size_threshold(self.request.send_blob_if_small);
        let plan = CompletenessPolicy::decide(
            self.request.completeness,
            props.size,
            threshold,
            self.descriptor.is_some(),
        );
        tracing::debug!(%blob, ?plan, size = props.size, threshold, "Completeness plan decided");
        self.plan = Some(plan);
        self.properties = Some(props);
        self.state = RequestState::FetchingChunks;

        match plan {
            Plan::Nothing => {}
            Plan::FetchOriginalOnly => {
                self.issue(blob, FetchKind::Data, FetchRole::Main, self.main_address.clone());
            }
            Plan::FetchInfoOnly | Plan::FetchInfoThenSmartSubset => {
                self.issue_split_fetch(SPLIT_INFO_CHUNK)
            }
            Plan::FetchInfoAndAllChunks => {
                self.issue_split_fetch(SPLIT_INFO_CHUNK);
                if let Some(descriptor) = self.descriptor {
                    for chunk in descriptor.chunks() {
                        self.issue_split_fetch(chunk);
                    }
                }
            }
        }
    }

    fn issue_split_fetch(&mut self, chunk: i32) {
        let Some(descriptor) = self.descriptor else {
            return;
        };
        if self.fallback.is_triggered() {
            return;
        }
        let address = ItemAddress::Id2Chunk {
            id2_chunk: chunk,
            id2_info: descriptor.to_string(),
        };
        let blob = match descriptor.chunk_identity(&self.context.registry, chunk) {
            Ok(blob) => blob,
            Err(err) => return self.fall_back(FallbackCause::Transport(err.to_string()), Some(address)),
        };
        let role = if chunk == SPLIT_INFO_CHUNK {
            FetchRole::SplitInfo
        } else {
            FetchRole::Chunk(chunk)
        };
        self.fallback.register_split(blob.clone());
        self.issue(blob, FetchKind::Properties, role, address);
    }

    fn on_split_properties(
        &mut self,
        role: FetchRole,
        blob: BlobIdentity,
        address: ItemAddress,
        outcome: PropertiesOutcome,
    ) {
        let props = match outcome {
            PropertiesOutcome::Found(props) => props,
            PropertiesOutcome::NotFound => return self.fall_back(FallbackCause::NotFound, Some(address)),
            PropertiesOutcome::Failed(err) => {
                return self.fall_back(FallbackCause::Transport(err), Some(address))
            }
        };
        if props.is_restricted() && !blob.is_secure() {
            return self.fall_back(FallbackCause::Unauthorized, Some(address));
        }
        let payload = match props.to_json() {
            Ok(json) => Bytes::from(json),
            Err(err) => {
                return self.fall_back(FallbackCause::Transport(err.to_string()), Some(address))
            }
        };
        self.reply(ReplyItem::Properties {
            address: address.clone(),
            payload,
        });
        self.reply(ReplyItem::PropertiesCompletion {
            address: address.clone(),
        });
        self.issue(blob, FetchKind::Data, role, address);
    }

    fn on_data(&mut self, fetch: FetchId, bytes: Bytes) {
        let Some(record) = self.fetches.get_mut(fetch) else {
            return;
        };
        let chunk_seq = record.data_chunks;
        record.data_chunks += 1;
        record.bytes_delivered += bytes.len() as u64;
        let address = record.address.clone();

        if record.role == FetchRole::SplitInfo && self.plan == Some(Plan::FetchInfoThenSmartSubset) {
            self.split_info_payload.extend_from_slice(&bytes);
        }
        self.data_delivered = true;
        self.reply(ReplyItem::Data {
            address,
            bytes,
            chunk_seq,
        });
    }

    fn on_data_end(&mut self, fetch: FetchId) {
        let Some(record) = self.fetches.get_mut(fetch) else {
            return;
        };
        record.finished = true;
        let chunks = record.data_chunks;
        let role = record.role;
        let info_blob = record.target.clone();
        let address = record.address.clone();
        // a complete stream counts as delivered even when the blob is empty
        self.data_delivered = true;
        self.reply(ReplyItem::DataCompletion { address, chunks });

        let smart = self.plan == Some(Plan::FetchInfoThenSmartSubset);
        if role != FetchRole::SplitInfo || !smart || self.fallback.is_triggered() {
            return;
        }
        let payload = std::mem::take(&mut self.split_info_payload).freeze();
        match self.context.split_index_cache.get(&info_blob) {
            Some(index) => {
                tracing::debug!(%info_blob, "Split index served from cache");
                self.select_chunks(&index);
            }
            None => {
                self.analysis_pending = true;
                self.outbox.push(Effect::DecodeSplitIndex {
                    fetch,
                    info_blob,
                    payload,
                });
            }
        }
    }

    fn on_data_failed(&mut self, fetch: FetchId, not_found: bool, error: String) {
        let Some(record) = self.fetches.get_mut(fetch) else {
            return;
        };
        record.finished = true;
        let role = record.role;
        let blob = record.target.clone();
        let address = record.address.clone();
        let bytes_delivered = record.bytes_delivered;

        match role {
            FetchRole::Main | FetchRole::Fallback => {
                let (kind, code) = if not_found {
                    (ErrorKind::NotFound, MessageCode::BlobNotFound)
                } else {
                    (ErrorKind::BackendTransport, MessageCode::BackendError)
                };
                self.fail(kind, code, format!("Fetching data of blob {blob} failed: {error}"));
            }
            FetchRole::SplitInfo | FetchRole::Chunk(_) => {
                tracing::warn!(%blob, %address, bytes_delivered, not_found, "Split fetch failed: {}", error);
                let cause = if not_found {
                    FallbackCause::NotFound
                } else {
                    FallbackCause::Transport(error)
                };
                self.fall_back(cause, Some(address));
            }
        }
    }

    fn on_public_comment(&mut self, fetch: FetchId, outcome: Result<Option<String>, String>) {
        if let Some(record) = self.fetches.get_mut(fetch) {
            record.finished = true;
        }
        let blob = self.request.blob_identity().clone();
        let comment = match outcome {
            Ok(comment) => comment,
            Err(err) => {
                tracing::warn!(%blob, "Public comment unavailable: {}", err);
                None
            }
        };

        if std::mem::take(&mut self.rejection_pending) {
            return self.reject(comment);
        }
        if let Some(comment) = comment {
            self.message(
                Some(self.main_address.clone()),
                Severity::Info,
                MessageCode::PublicComment,
                200,
                comment,
            );
        }
    }

    fn on_split_index(&mut self, fetch: FetchId, result: Result<Arc<SplitIndex>, String>) {
        if !std::mem::take(&mut self.analysis_pending) {
            tracing::trace!(%fetch, "Split index result no longer needed");
            return;
        }
        let Some(record) = self.fetches.get(fetch) else {
            return;
        };
        let info_blob = record.target.clone();
        let address = record.address.clone();

        match result {
            Ok(index) => {
                self.context
                    .split_index_cache
                    .insert(info_blob, index.clone());
                self.select_chunks(&index);
            }
            Err(err) => {
                tracing::warn!(%info_blob, "Split index decoding failed: {}", err);
                self.fall_back(FallbackCause::SplitIndex(err), Some(address));
            }
        }
    }

    fn select_chunks(&mut self, index: &SplitIndex) {
        let Some(descriptor) = self.descriptor else {
            return;
        };
        match SplitIndexAnalyzer::compute_needed_chunks(
            index,
            self.request.target_seq_id.as_deref(),
            &descriptor,
        ) {
            Ok(chunks) => {
                tracing::debug!(id2_info = %descriptor, ?chunks, "Smart chunk selection");
                for chunk in chunks {
                    self.issue_split_fetch(chunk);
                }
            }
            Err(err) => self.message(
                Some(self.main_address.clone()),
                Severity::Warning,
                MessageCode::SmartSelectionUnavailable,
                200,
                format!("Only the split info of {descriptor} is sent: {err}"),
            ),
        }
    }

    fn fall_back(&mut self, cause: FallbackCause, address: Option<ItemAddress>) {
        let trigger = self.fallback.trigger();
        let original = self.request.blob_identity().clone();
        let message = self.fallback.diagnostic(trigger, &cause, address, &original);
        tracing::warn!(blob = %original, code = message.code.code(), "{}", message.text);
        self.reply(ReplyItem::Message(message));
        if trigger == FallbackTrigger::AlreadyRequested {
            return;
        }

        self.analysis_pending = false;
        self.split_info_payload.clear();
        let redirected: Vec<FetchId> = self
            .fetches
            .iter()
            .filter(|(_, record)| self.fallback.redirectable(record))
            .map(|(fetch, _)| fetch)
            .collect();
        for fetch in redirected {
            self.discard(fetch);
        }

        let address = ItemAddress::Blob(original.clone());
        self.issue(original, FetchKind::Data, FetchRole::Fallback, address);
    }

    fn reject(&mut self, comment: Option<String>) {
        let blob = self.request.blob_identity().clone();
        let reason = match &self.properties {
            Some(props) if props.flags.withdrawn => "withdrawn",
            _ => "confidential",
        };
        let text = match comment {
            Some(comment) => format!("Blob {blob} is {reason}: {comment}"),
            None => format!("Blob {blob} is {reason}"),
        };
        self.fail(ErrorKind::Unauthorized, MessageCode::Unauthorized, text);
    }

    fn fail(&mut self, kind: ErrorKind, code: MessageCode, text: String) {
        let status = kind.status(self.request.origin);
        tracing::warn!(
            blob = %self.request.blob_identity(),
            status,
            code = code.code(),
            "{}",
            text
        );
        self.stop_unfinished();
        self.release_suppression(false);
        self.message(Some(self.main_address.clone()), Severity::Error, code, status, text);
        self.finish(RequestState::Failed, status);
    }

    fn skip(&mut self, code: MessageCode, text: String) {
        tracing::info!(blob = %self.request.blob_identity(), code = code.code(), "{}", text);
        self.message(Some(self.main_address.clone()), Severity::Info, code, 200, text);
        self.finish(RequestState::Done, 200);
    }

    fn check_drained(&mut self) {
        if self.is_finished()
            || self.analysis_pending
            || self.fetches.is_empty()
            || !self.fetches.is_drained()
        {
            return;
        }
        self.state = RequestState::Completing;
        tracing::debug!(
            blob = %self.request.blob_identity(),
            fetches = self.fetches.len(),
            fallback = self.fallback.is_triggered(),
            "All fetches finished"
        );
        self.release_suppression(self.data_delivered);
        self.finish(RequestState::Done, 200);
    }

    /// Only the data of a blob counts as delivered, never its properties alone.
    fn release_suppression(&mut self, delivered: bool) {
        if !std::mem::take(&mut self.suppression_claimed) {
            return;
        }
        let client_id = self.request.suppression_client_id();
        let blob = self.request.blob_identity();
        if delivered {
            self.context.exclude_cache.mark_completed(client_id, blob);
        } else {
            self.context.exclude_cache.remove(client_id, blob);
        }
    }

    fn stop_unfinished(&mut self) {
        for fetch in self.fetches.unfinished() {
            self.discard(fetch);
        }
        self.analysis_pending = false;
    }

    fn discard(&mut self, fetch: FetchId) {
        if let Some(record) = self.fetches.get_mut(fetch) {
            record.finished = true;
            record.discarded = true;
        }
        self.outbox.push(Effect::StopFetch { fetch });
    }

    fn issue(&mut self, blob: BlobIdentity, kind: FetchKind, role: FetchRole, address: ItemAddress) -> FetchId {
        let fetch = self
            .fetches
            .push(FetchRecord::new(blob.clone(), kind, role, address));
        tracing::trace!(%fetch, %blob, ?kind, ?role, "Fetch issued");
        let effect = match kind {
            FetchKind::Properties => Effect::FetchProperties {
                fetch,
                blob,
                last_modified: None,
            },
            FetchKind::Data => Effect::FetchData { fetch, blob },
            FetchKind::PublicComment => Effect::FetchPublicComment { fetch, blob },
        };
        self.outbox.push(effect);
        fetch
    }

    fn message(
        &mut self,
        address: Option<ItemAddress>,
        severity: Severity,
        code: MessageCode,
        status: u16,
        text: String,
    ) {
        self.reply(ReplyItem::Message(ReplyMessage {
            address,
            severity,
            code,
            status,
            text,
        }));
    }

    fn reply(&mut self, item: ReplyItem) {
        self.outbox.push(Effect::Reply(item));
    }

    fn finish(&mut self, state: RequestState, status: u16) {
        self.state = state;
        self.status = status;
        self.reply(ReplyItem::Completion { status });
    }

    fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use seqgate_blob::{
        completeness::CompletenessOption,
        identity::KeyspaceRegistry,
        properties::BlobFlags,
    };
    use seqgate_cache::{ExcludeCache, ExcludeCacheOptions, SplitIndexCache};

    use super::*;
    use crate::request::RequestOrigin;

    fn context() -> RetrievalContext {
        RetrievalContext {
            registry: Arc::new(KeyspaceRegistry::from_mapping("4=ks,23=secure_ks:secure").unwrap()),
            exclude_cache: Arc::new(ExcludeCache::new(ExcludeCacheOptions {
                resend_timeout: Duration::from_secs(60),
                ..Default::default()
            })),
            split_index_cache: Arc::new(SplitIndexCache::new(16)),
            policy: CompletenessPolicy::new(100),
        }
    }

    fn blob(context: &RetrievalContext, key: i32) -> BlobIdentity {
        context.registry.resolve(4, key).unwrap()
    }

    fn descriptor(chunk_count: i32) -> SplitDescriptor {
        SplitDescriptor::new(4, 100, chunk_count, Some(2)).unwrap()
    }

    fn chunk_key(chunk_count: i32, chunk: i32) -> i32 {
        descriptor(chunk_count).storage_key_of(chunk).unwrap()
    }

    fn found(key: i32, size: u64) -> PropertiesOutcome {
        PropertiesOutcome::Found(BlobProperties::new(4, key, 1_000, size))
    }

    struct Harness {
        orchestrator: FetchOrchestrator,
        effects: Vec<Effect>,
    }

    impl Harness {
        fn start(request: BlobRequest, context: &RetrievalContext) -> Self {
            let mut orchestrator = FetchOrchestrator::new(request, context.clone());
            let effects = orchestrator.start();
            Self {
                orchestrator,
                effects,
            }
        }

        fn send(&mut self, event: FetchEvent) -> Vec<Effect> {
            let effects = self.orchestrator.handle(event);
            self.effects.extend(effects.clone());
            effects
        }

        fn properties_fetch(&self, key: i32) -> FetchId {
            self.effects
                .iter()
                .find_map(|effect| match effect {
                    Effect::FetchProperties { fetch, blob, .. } if blob.key() == key => Some(*fetch),
                    _ => None,
                })
                .unwrap_or_else(|| panic!("no properties fetch for key {key}"))
        }

        fn data_fetch(&self, key: i32) -> Option<FetchId> {
            self.effects.iter().find_map(|effect| match effect {
                Effect::FetchData { fetch, blob } if blob.key() == key => Some(*fetch),
                _ => None,
            })
        }

        fn properties_fetch_count(&self) -> usize {
            self.effects
                .iter()
                .filter(|effect| matches!(effect, Effect::FetchProperties { .. }))
                .count()
        }

        fn data_fetch_keys(&self) -> Vec<i32> {
            self.effects
                .iter()
                .filter_map(|effect| match effect {
                    Effect::FetchData { blob, .. } => Some(blob.key()),
                    _ => None,
                })
                .collect()
        }

        fn stopped(&self) -> Vec<FetchId> {
            self.effects
                .iter()
                .filter_map(|effect| match effect {
                    Effect::StopFetch { fetch } => Some(*fetch),
                    _ => None,
                })
                .collect()
        }

        fn messages(&self) -> Vec<&ReplyMessage> {
            self.effects
                .iter()
                .filter_map(|effect| match effect {
                    Effect::Reply(ReplyItem::Message(message)) => Some(message),
                    _ => None,
                })
                .collect()
        }

        fn has_message(&self, code: MessageCode) -> bool {
            self.messages().iter().any(|message| message.code == code)
        }

        fn completion(&self) -> Option<u16> {
            self.effects.iter().find_map(|effect| match effect {
                Effect::Reply(ReplyItem::Completion { status }) => Some(*status),
                _ => None,
            })
        }

        fn main_properties(&mut self, outcome: PropertiesOutcome) -> Vec<Effect> {
            let fetch = self.properties_fetch(10);
            self.send(FetchEvent::Properties { fetch, outcome })
        }

        /// Answers the properties fetch of `key` and streams `payload` as its data.
        fn deliver(&mut self, key: i32, payload: &'static [u8]) {
            let fetch = self.properties_fetch(key);
            self.send(FetchEvent::Properties {
                fetch,
                outcome: found(key, payload.len() as u64),
            });
            let data = self.data_fetch(key).expect("data fetch issued");
            self.send(FetchEvent::Data {
                fetch: data,
                bytes: Bytes::from_static(payload),
            });
            self.send(FetchEvent::DataEnd { fetch: data });
        }
    }

    fn split_main(size: u64, chunk_count: i32) -> PropertiesOutcome {
        PropertiesOutcome::Found(BlobProperties::new(4, 10, 1_000, size).with_split(&descriptor(chunk_count)))
    }

    #[test]
    fn whole_fetches_info_and_every_chunk() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole).with_client_id("c1");
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(5_000, 3));

        assert_eq!(harness.orchestrator.plan(), Some(Plan::FetchInfoAndAllChunks));
        assert_eq!(harness.properties_fetch_count(), 5);

        harness.deliver(100, b"info");
        harness.deliver(chunk_key(3, 1), b"one");
        harness.deliver(chunk_key(3, 2), b"two");
        assert_eq!(harness.completion(), None);
        harness.deliver(chunk_key(3, 3), b"three");

        assert_eq!(harness.completion(), Some(200));
        assert_eq!(harness.orchestrator.state(), RequestState::Done);
        assert_eq!(harness.data_fetch_keys().len(), 4);
        assert!(matches!(
            context.exclude_cache.try_begin_delivery("c1", &blob(&context, 10)),
            DeliveryDecision::RecentlyDelivered { .. }
        ));
    }

    #[test]
    fn slim_large_blob_fetches_info_only() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Slim);
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(500, 3));

        assert_eq!(harness.orchestrator.plan(), Some(Plan::FetchInfoOnly));
        harness.deliver(100, b"info");
        assert_eq!(harness.data_fetch_keys(), vec![100]);
        assert_eq!(harness.completion(), Some(200));
    }

    #[test]
    fn request_override_raises_threshold() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Slim).with_send_blob_if_small(1_000);
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(500, 3));
        assert_eq!(harness.orchestrator.plan(), Some(Plan::FetchInfoAndAllChunks));
    }

    const SPLIT_INFO: &[u8] = br#"{"chunks":[
        {"chunk": 2, "seq_ids": ["NC_000001.11"]},
        {"chunk": 5, "seq_ids": ["NC_000001.11", "NC_000002.12"]},
        {"chunk": 7, "seq_ids": ["NC_000002.12"]}
    ]}"#;

    #[test]
    fn smart_fetches_only_needed_chunks() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Smart)
            .with_target_seq_id("NC_000001.11");
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(50, 10));
        assert_eq!(harness.orchestrator.plan(), Some(Plan::FetchInfoThenSmartSubset));

        harness.deliver(100, SPLIT_INFO);
        let (fetch, payload) = harness
            .effects
            .iter()
            .find_map(|effect| match effect {
                Effect::DecodeSplitIndex { fetch, payload, .. } => Some((*fetch, payload.clone())),
                _ => None,
            })
            .expect("decode requested");
        assert_eq!(payload.as_ref(), SPLIT_INFO);
        // the info fetch is finished, but the analysis still holds the request open
        assert_eq!(harness.completion(), None);

        let index = Arc::new(SplitIndex::decode(&payload).unwrap());
        harness.send(FetchEvent::SplitIndexDecoded {
            fetch,
            result: Ok(index),
        });
        assert_eq!(harness.properties_fetch_count(), 4);

        harness.deliver(chunk_key(10, 2), b"two");
        harness.deliver(chunk_key(10, 5), b"five");
        assert_eq!(harness.data_fetch_keys(), vec![100, chunk_key(10, 2), chunk_key(10, 5)]);
        assert_eq!(harness.completion(), Some(200));
        assert_eq!(context.split_index_cache.len(), 1);
    }

    #[test]
    fn smart_reuses_cached_split_index() {
        let context = context();
        let info_blob = blob(&context, 100);
        context
            .split_index_cache
            .insert(info_blob, Arc::new([("NC_000001.11", 3)].into_iter().collect()));

        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Smart)
            .with_target_seq_id("NC_000001.11");
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(50, 10));
        harness.deliver(100, b"not decoded");

        assert!(!harness
            .effects
            .iter()
            .any(|effect| matches!(effect, Effect::DecodeSplitIndex { .. })));
        harness.deliver(chunk_key(10, 3), b"three");
        assert_eq!(harness.completion(), Some(200));
    }

    #[test]
    fn smart_without_target_sends_info_only() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Smart);
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(50, 10));
        harness.deliver(100, SPLIT_INFO);

        let decode = harness
            .effects
            .iter()
            .find_map(|effect| match effect {
                Effect::DecodeSplitIndex { fetch, payload, .. } => Some((*fetch, payload.clone())),
                _ => None,
            })
            .unwrap();
        harness.send(FetchEvent::SplitIndexDecoded {
            fetch: decode.0,
            result: Ok(Arc::new(SplitIndex::decode(&decode.1).unwrap())),
        });

        assert!(harness.has_message(MessageCode::SmartSelectionUnavailable));
        assert_eq!(harness.properties_fetch_count(), 2);
        assert_eq!(harness.completion(), Some(200));
    }

    #[test]
    fn split_index_decode_failure_falls_back() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Smart)
            .with_target_seq_id("NC_000001.11");
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(50, 10));
        harness.deliver(100, b"garbage");
        let fetch = harness.data_fetch(100).unwrap();
        harness.send(FetchEvent::SplitIndexDecoded {
            fetch,
            result: Err("expected value".into()),
        });

        assert!(harness.has_message(MessageCode::FallbackToOriginal));
        let fallback = harness.data_fetch(10).expect("original blob fetched");
        harness.send(FetchEvent::Data {
            fetch: fallback,
            bytes: Bytes::from_static(b"original"),
        });
        harness.send(FetchEvent::DataEnd { fetch: fallback });
        assert_eq!(harness.completion(), Some(200));
        assert!(harness.orchestrator.outcome().fallback_triggered);
    }

    #[test]
    fn missing_chunk_falls_back_to_original() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole).with_client_id("c1");
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(5_000, 3));

        // chunk 1 starts streaming, chunk 2 is missing, chunk 3 and the info have not answered
        let chunk1 = harness.properties_fetch(chunk_key(3, 1));
        harness.send(FetchEvent::Properties {
            fetch: chunk1,
            outcome: found(chunk_key(3, 1), 3),
        });
        let chunk1_data = harness.data_fetch(chunk_key(3, 1)).unwrap();
        harness.send(FetchEvent::Data {
            fetch: chunk1_data,
            bytes: Bytes::from_static(b"one"),
        });
        let chunk2 = harness.properties_fetch(chunk_key(3, 2));
        harness.send(FetchEvent::Properties {
            fetch: chunk2,
            outcome: PropertiesOutcome::NotFound,
        });

        let warnings = harness.messages();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, MessageCode::FallbackToOriginal);
        assert_eq!(warnings[0].status, 404);
        assert_eq!(
            warnings[0].address,
            Some(ItemAddress::Id2Chunk {
                id2_chunk: 2,
                id2_info: descriptor(3).to_string()
            })
        );

        let info = harness.properties_fetch(100);
        let chunk3 = harness.properties_fetch(chunk_key(3, 3));
        assert_eq!(harness.stopped(), vec![info, chunk3]);
        let fallback = harness.data_fetch(10).expect("original blob fetched");

        // late answers of discarded fetches change nothing
        assert!(harness
            .send(FetchEvent::Properties {
                fetch: chunk3,
                outcome: found(chunk_key(3, 3), 5),
            })
            .is_empty());

        // the streaming chunk finishes its own stream
        let effects = harness.send(FetchEvent::DataEnd { fetch: chunk1_data });
        assert!(matches!(
            &effects[..],
            [Effect::Reply(ReplyItem::DataCompletion { chunks: 1, .. })]
        ));

        harness.send(FetchEvent::Data {
            fetch: fallback,
            bytes: Bytes::from_static(b"original"),
        });
        harness.send(FetchEvent::DataEnd { fetch: fallback });
        assert_eq!(harness.completion(), Some(200));
        assert_eq!(harness.data_fetch_keys(), vec![chunk_key(3, 1), 10]);
        assert!(matches!(
            context.exclude_cache.try_begin_delivery("c1", &blob(&context, 10)),
            DeliveryDecision::RecentlyDelivered { .. }
        ));
    }

    #[test]
    fn second_split_failure_requests_no_second_fallback() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole);
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(5_000, 3));

        let chunk2 = harness.properties_fetch(chunk_key(3, 2));
        harness.send(FetchEvent::Properties {
            fetch: chunk2,
            outcome: found(chunk_key(3, 2), 3),
        });
        let chunk2_data = harness.data_fetch(chunk_key(3, 2)).unwrap();
        harness.send(FetchEvent::Data {
            fetch: chunk2_data,
            bytes: Bytes::from_static(b"tw"),
        });

        let chunk1 = harness.properties_fetch(chunk_key(3, 1));
        harness.send(FetchEvent::Properties {
            fetch: chunk1,
            outcome: PropertiesOutcome::Failed("connection reset".into()),
        });
        harness.send(FetchEvent::DataFailed {
            fetch: chunk2_data,
            not_found: false,
            error: "connection reset".into(),
        });

        let fallbacks = harness
            .effects
            .iter()
            .filter(|effect| matches!(effect, Effect::FetchData { blob, .. } if blob.key() == 10))
            .count();
        assert_eq!(fallbacks, 1);
        assert!(harness.has_message(MessageCode::FallbackToOriginal));
        assert!(harness.has_message(MessageCode::FallbackAlreadyRequested));
    }

    #[test]
    fn not_found_status_follows_origin() {
        let context = context();
        let mut explicit = Harness::start(BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole), &context);
        explicit.main_properties(PropertiesOutcome::NotFound);
        assert_eq!(explicit.completion(), Some(404));
        assert_eq!(explicit.orchestrator.state(), RequestState::Failed);

        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole).with_origin(RequestOrigin::Resolved);
        let mut resolved = Harness::start(request, &context);
        resolved.main_properties(PropertiesOutcome::NotFound);
        assert_eq!(resolved.completion(), Some(502));
        assert!(resolved.has_message(MessageCode::BlobNotFound));
    }

    #[test]
    fn properties_transport_error_is_terminal() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole).with_client_id("c1");
        let mut harness = Harness::start(request, &context);
        harness.main_properties(PropertiesOutcome::Failed("timeout".into()));

        assert_eq!(harness.completion(), Some(500));
        assert!(harness.has_message(MessageCode::BackendError));
        assert!(context.exclude_cache.is_empty());
    }

    #[test]
    fn confidential_blob_is_rejected_and_claim_released() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole).with_client_id("c1");
        let mut harness = Harness::start(request, &context);
        assert_eq!(context.exclude_cache.len(), 1);

        let props = BlobProperties::new(4, 10, 1, 5).with_flags(BlobFlags {
            confidential: true,
            ..Default::default()
        });
        harness.main_properties(PropertiesOutcome::Found(props));

        assert_eq!(harness.completion(), Some(403));
        assert!(harness.has_message(MessageCode::Unauthorized));
        assert!(context.exclude_cache.is_empty());
    }

    #[test]
    fn withdrawn_blob_reports_public_comment() {
        let context = context();
        let mut harness = Harness::start(BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole), &context);
        let props = BlobProperties::new(4, 10, 1, 5).with_flags(BlobFlags {
            withdrawn: true,
            ..Default::default()
        });
        let effects = harness.main_properties(PropertiesOutcome::Found(props));
        let fetch = effects
            .iter()
            .find_map(|effect| match effect {
                Effect::FetchPublicComment { fetch, .. } => Some(*fetch),
                _ => None,
            })
            .expect("public comment requested");
        assert_eq!(harness.completion(), None);

        harness.send(FetchEvent::PublicComment {
            fetch,
            outcome: Ok(Some("Removed at submitter request".into())),
        });
        assert_eq!(harness.completion(), Some(403));
        let message = harness.messages()[0].clone();
        assert_eq!(message.code, MessageCode::Unauthorized);
        assert!(message.text.contains("withdrawn: Removed at submitter request"));
    }

    #[test]
    fn secure_keyspace_serves_confidential_blob() {
        let context = context();
        let secure_blob = context.registry.resolve(23, 10).unwrap();
        let mut orchestrator = FetchOrchestrator::new(
            BlobRequest::blob(secure_blob, CompletenessOption::Original),
            context,
        );
        let fetch = match &orchestrator.start()[..] {
            [Effect::FetchProperties { fetch, .. }] => *fetch,
            other => panic!("unexpected effects {other:?}"),
        };
        let props = BlobProperties::new(23, 10, 1, 5).with_flags(BlobFlags {
            confidential: true,
            ..Default::default()
        });
        let effects = orchestrator.handle(FetchEvent::Properties {
            fetch,
            outcome: PropertiesOutcome::Found(props),
        });
        assert!(effects
            .iter()
            .any(|effect| matches!(effect, Effect::FetchData { .. })));
    }

    #[test]
    fn suppressed_blob_gets_public_comment_message() {
        let context = context();
        let mut harness = Harness::start(BlobRequest::blob(blob(&context, 10), CompletenessOption::Original), &context);
        let props = BlobProperties::new(4, 10, 1, 5).with_flags(BlobFlags {
            suppressed: true,
            ..Default::default()
        });
        let effects = harness.main_properties(PropertiesOutcome::Found(props));
        let comment = effects
            .iter()
            .find_map(|effect| match effect {
                Effect::FetchPublicComment { fetch, .. } => Some(*fetch),
                _ => None,
            })
            .unwrap();
        harness.send(FetchEvent::PublicComment {
            fetch: comment,
            outcome: Ok(Some("Superseded".into())),
        });
        let data = harness.data_fetch(10).unwrap();
        harness.send(FetchEvent::DataEnd { fetch: data });

        assert!(harness.has_message(MessageCode::PublicComment));
        assert_eq!(harness.completion(), Some(200));
    }

    #[test]
    fn malformed_id2_info_degrades_to_original() {
        let context = context();
        let mut harness = Harness::start(BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole), &context);
        let mut props = BlobProperties::new(4, 10, 1, 5);
        props.id2_info = Some("4.abc.3".into());
        let effects = harness.main_properties(PropertiesOutcome::Found(props));

        assert!(harness.has_message(MessageCode::MalformedSplitInfo));
        assert_eq!(harness.orchestrator.plan(), Some(Plan::FetchOriginalOnly));
        let payload = effects
            .iter()
            .find_map(|effect| match effect {
                Effect::Reply(ReplyItem::Properties { payload, .. }) => Some(payload.clone()),
                _ => None,
            })
            .unwrap();
        let sent: BlobProperties = serde_json::from_slice(&payload).unwrap();
        assert_eq!(sent.id2_info, None);
        assert_eq!(harness.data_fetch_keys(), vec![10]);
    }

    #[test]
    fn oversized_chunk_count_is_not_expanded() {
        let context = context();
        let mut harness = Harness::start(BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole), &context);
        let mut props = BlobProperties::new(4, 10, 1, 5);
        props.id2_info = Some("4.2000000000.1999999999".into());
        harness.main_properties(PropertiesOutcome::Found(props));

        assert!(harness.has_message(MessageCode::MalformedSplitInfo));
        assert_eq!(harness.orchestrator.plan(), Some(Plan::FetchOriginalOnly));
        assert_eq!(harness.orchestrator.fetches().len(), 2);
        assert_eq!(harness.data_fetch_keys(), vec![10]);
    }

    #[test]
    fn none_completes_after_properties_without_marking_delivery() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::None).with_client_id("c1");
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(50, 3));

        assert_eq!(harness.completion(), Some(200));
        assert_eq!(harness.orchestrator.last_modified(), Some(1_000));
        assert!(harness.data_fetch_keys().is_empty());
        assert!(context.exclude_cache.is_empty());
    }

    #[test]
    fn concurrent_request_for_same_client_is_skipped() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Original).with_client_id("c1");
        let mut first = Harness::start(request.clone(), &context);

        let second = Harness::start(request.clone(), &context);
        assert!(second.has_message(MessageCode::BlobInProgress));
        assert_eq!(second.completion(), Some(200));
        assert_eq!(second.properties_fetch_count(), 0);

        first.main_properties(found(10, 5));
        let data = first.data_fetch(10).unwrap();
        first.send(FetchEvent::Data {
            fetch: data,
            bytes: Bytes::from_static(b"hello"),
        });
        first.send(FetchEvent::DataEnd { fetch: data });

        let third = Harness::start(request, &context);
        assert!(third.has_message(MessageCode::BlobSentRecently));
    }

    #[test]
    fn empty_blob_is_resend_suppressed() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Original).with_client_id("c1");
        let mut first = Harness::start(request.clone(), &context);
        first.main_properties(found(10, 0));
        let data = first.data_fetch(10).unwrap();
        first.send(FetchEvent::DataEnd { fetch: data });
        assert_eq!(first.completion(), Some(200));
        assert_eq!(context.exclude_cache.len(), 1);

        let second = Harness::start(request, &context);
        assert!(second.has_message(MessageCode::BlobSentRecently));
        assert_eq!(second.properties_fetch_count(), 0);
    }

    #[test]
    fn id2_chunk_request_fetches_single_record() {
        let context = context();
        let request = BlobRequest::id2_chunk(&context.registry, descriptor(3), 2)
            .unwrap()
            .with_client_id("c1");
        let key = chunk_key(3, 2);
        let mut harness = Harness::start(request, &context);
        assert!(context.exclude_cache.is_empty());

        let fetch = harness.properties_fetch(key);
        harness.send(FetchEvent::Properties {
            fetch,
            outcome: found(key, 4),
        });
        let data = harness.data_fetch(key).unwrap();
        let effects = harness.send(FetchEvent::Data {
            fetch: data,
            bytes: Bytes::from_static(b"data"),
        });
        assert!(matches!(
            &effects[..],
            [Effect::Reply(ReplyItem::Data { address: ItemAddress::Id2Chunk { id2_chunk: 2, .. }, chunk_seq: 0, .. })]
        ));
        harness.send(FetchEvent::DataEnd { fetch: data });
        assert_eq!(harness.completion(), Some(200));
        assert_eq!(harness.properties_fetch_count(), 1);
    }

    #[test]
    fn cancel_stops_running_fetches() {
        let context = context();
        let request = BlobRequest::blob(blob(&context, 10), CompletenessOption::Whole).with_client_id("c1");
        let mut harness = Harness::start(request, &context);
        harness.main_properties(split_main(5_000, 3));

        let effects = harness.orchestrator.cancel();
        let stopped = effects
            .iter()
            .filter(|effect| matches!(effect, Effect::StopFetch { .. }))
            .count();
        assert_eq!(stopped, 4);
        assert_eq!(harness.orchestrator.outcome().status, CLIENT_CLOSED_STATUS);
        assert!(context.exclude_cache.is_empty());
        assert!(harness.orchestrator.cancel().is_empty());
    }
}
