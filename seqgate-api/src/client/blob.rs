use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use seqgate_blob::{
    completeness::CompletenessOption, error::BlobResult, identity::KeyspaceRegistry,
    split_descriptor::SplitDescriptor,
};
use seqgate_orchestrator::request::{BlobRequest, RequestOrigin};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::runtime::GatewayRuntime;

pub(crate) const PSG_CONTENT_TYPE: &str = "application/x-ncbi-psg";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams)]
pub struct GetBlobQuery {
    /// `<sat>.<key>`
    pub blob_id: String,
    /// One of none, slim, smart, whole, orig. Defaults to orig.
    pub tse: Option<String>,
    /// Enables resend suppression for this client.
    pub client_id: Option<String>,
    /// Resolved sequence the client is after, used by smart.
    pub seq_id: Option<String>,
    pub send_blob_if_small: Option<u64>,
    pub last_modified: Option<i64>,
    /// Set when the blob id came out of sequence id resolution.
    pub resolved: Option<bool>,
}

impl GetBlobQuery {
    fn into_request(self, registry: &KeyspaceRegistry) -> BlobResult<BlobRequest> {
        let blob = registry.parse_blob_id(&self.blob_id)?;
        let completeness = match self.tse.as_deref() {
            Some(tse) => tse.parse()?,
            None => CompletenessOption::Original,
        };

        let mut request = BlobRequest::blob(blob, completeness);
        if let Some(client_id) = self.client_id {
            request = request.with_client_id(client_id);
        }
        if let Some(seq_id) = self.seq_id {
            request = request.with_target_seq_id(seq_id);
        }
        if let Some(size) = self.send_blob_if_small {
            request = request.with_send_blob_if_small(size);
        }
        if let Some(version) = self.last_modified {
            request = request.with_last_modified(version);
        }
        if self.resolved.unwrap_or(false) {
            request = request.with_origin(RequestOrigin::Resolved);
        }
        Ok(request)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, IntoParams)]
pub struct GetTseChunkQuery {
    /// `sat[/subsat].info_key.chunk_count[.split_version]`
    pub id2_info: String,
    pub id2_chunk: i32,
}

impl GetTseChunkQuery {
    fn into_request(self, registry: &KeyspaceRegistry) -> BlobResult<BlobRequest> {
        let descriptor: SplitDescriptor = self.id2_info.parse()?;
        BlobRequest::id2_chunk(registry, descriptor, self.id2_chunk)
    }
}

#[tracing::instrument(level = "info", skip(state))]
#[utoipa::path(
    tag = "blobs",
    get,
    path = "/ID/getblob",
    params(GetBlobQuery),
    responses(
        (status = 200, description = "PSG framed reply with the blob properties, data and messages"),
        (status = 400, description = "Invalid blob id or completeness option"),
    )
)]
pub(crate) async fn get_blob(
    State(state): State<Arc<GatewayRuntime>>,
    Query(query): Query<GetBlobQuery>,
) -> Result<Response, (StatusCode, Json<String>)> {
    let request = query.into_request(state.registry()).map_err(|err| {
        tracing::warn!("Rejecting getblob request: {}", err);
        (StatusCode::BAD_REQUEST, Json(err.to_string()))
    })?;
    Ok(stream_reply(&state, request))
}

#[tracing::instrument(level = "info", skip(state))]
#[utoipa::path(
    tag = "blobs",
    get,
    path = "/ID/get_tse_chunk",
    params(GetTseChunkQuery),
    responses(
        (status = 200, description = "PSG framed reply with one split chunk"),
        (status = 400, description = "Malformed id2_info or chunk out of range"),
    )
)]
pub(crate) async fn get_tse_chunk(
    State(state): State<Arc<GatewayRuntime>>,
    Query(query): Query<GetTseChunkQuery>,
) -> Result<Response, (StatusCode, Json<String>)> {
    let request = query.into_request(state.registry()).map_err(|err| {
        tracing::warn!("Rejecting get_tse_chunk request: {}", err);
        (StatusCode::BAD_REQUEST, Json(err.to_string()))
    })?;
    Ok(stream_reply(&state, request))
}

fn stream_reply(state: &GatewayRuntime, request: BlobRequest) -> Response {
    let request_id = uuid::Uuid::new_v4();
    tracing::debug!(%request_id, blob = %request.blob_identity(), completeness = %request.completeness, "Serving blob request");
    let body = Body::from_stream(state.serve(request));
    (
        [
            (header::CONTENT_TYPE, PSG_CONTENT_TYPE.to_string()),
            (
                header::HeaderName::from_static("x-seqgate-request-id"),
                request_id.to_string(),
            ),
        ],
        body,
    )
        .into_response()
}
