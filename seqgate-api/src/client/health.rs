use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::runtime::GatewayRuntime;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

#[tracing::instrument(level = "info", skip(_state))]
#[utoipa::path(
    tag = "system",
    get,
    path = "/health",
    responses((status = 200, description = "The gateway is up", body = HealthStatus))
)]
pub(crate) async fn health(State(_state): State<Arc<GatewayRuntime>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
