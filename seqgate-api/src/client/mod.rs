use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::runtime::GatewayRuntime;

mod blob;
mod health;

#[derive(utoipa::OpenApi)]
#[openapi()]
pub struct ClientApiDoc;

pub(crate) fn setup_client_router() -> (Router<Arc<GatewayRuntime>>, utoipa::openapi::OpenApi) {
    let (client_router, client_api) = OpenApiRouter::with_openapi(ClientApiDoc::openapi())
        .routes(routes!(blob::get_blob))
        .routes(routes!(blob::get_tse_chunk))
        .routes(routes!(health::health))
        .split_for_parts();

    (client_router, client_api)
}
