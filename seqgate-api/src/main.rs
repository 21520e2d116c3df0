use std::{net::IpAddr, str::FromStr, sync::Arc, time::Duration};

use axum::{
    extract::MatchedPath,
    http::Request,
    response::{Redirect, Response},
    routing::get,
    Router,
};
use client::setup_client_router;
use runtime::GatewayRuntime;
use seqgate_config::CONFIG;
use tokio_util::sync::CancellationToken;
use tower_http::{classify::ServerErrorsFailureClass, trace::TraceLayer};
use tracing::{info_span, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa_scalar::{Scalar, Servable};
use utoipa_swagger_ui::SwaggerUi;

mod client;
mod reply;
mod runtime;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const SEQGATE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn set_api_docs_info(mut openapi: utoipa::openapi::OpenApi) -> utoipa::openapi::OpenApi {
    openapi.info.title = "Seqgate API".to_string();
    openapi.info.version = SEQGATE_VERSION.to_string();
    openapi.info.description =
        Some("Split-aware blob retrieval for the sequence data gateway".to_string());

    openapi
}

#[tokio::main(worker_threads = 8)]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let runtime = Arc::new(GatewayRuntime::new().await?);

    let (client_router, api_docs_client) = setup_client_router();
    let api_docs_client = set_api_docs_info(api_docs_client);

    let mut router = client_router
        .merge(Scalar::with_url("/scalar/", api_docs_client.clone()))
        .route("/scalar", get(|| async { Redirect::to("/scalar/") }))
        .merge(SwaggerUi::new("/swagger").url("/api/openapi.json", api_docs_client.clone()));

    router = setup_trace_layer(router);

    let addr = std::net::SocketAddr::new(
        IpAddr::from_str(&CONFIG.host)
            .map_err(|e| anyhow::anyhow!("Failed to parse IP address from config: {}", e))?,
        CONFIG.port,
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to address {}: {}", addr, e))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router.with_state(runtime.clone()))
        .with_graceful_shutdown(shutdown_signal(runtime.shutdown_token()))
        .await
        .map_err(|e| anyhow::anyhow!("Server failed: {}", e))?;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
    tracing::info!("Shutting down, cancelling in-flight requests");
    shutdown.cancel();
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // axum logs rejections from built-in extractors with the `axum::rejection`
                // target, at `TRACE` level.
                format!(
                    "{crate_name}={level},seqgate_orchestrator={level},seqgate_storage={level},tower_http=debug,axum::rejection=trace",
                    crate_name = env!("CARGO_CRATE_NAME"),
                    level = CONFIG.log_level,
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn setup_trace_layer<T>(router: Router<T>) -> Router<T>
where
    T: Send + Sync + Clone + 'static,
{
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                // Log the matched route's path (with placeholders not filled in).
                let matched_path = request
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str);

                info_span!(
                    "http_request",
                    method = ?request.method(),
                    matched_path,
                    query = request.uri().query(),
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {
                tracing::info!("Request Received.");
            })
            .on_response(|response: &Response, latency: Duration, _span: &Span| {
                tracing::info!(status = %response.status(), "Response Started. Duration: {:?}", latency);
            })
            .on_failure(
                |error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    tracing::error!("Request failed: {}", error)
                },
            ),
    )
}
