//! HTTP front of the exporter
//!
//! ## Endpoints
//!
//! - `GET <metrics_path>` - run one scrape and answer with the text exposition
//! - `GET /` - landing page linking to the metrics path
//!
//! At most `max_requests` scrapes are served at the same time. Requests beyond
//! that are answered with `503 Service Unavailable` right away instead of
//! queueing up behind slow collectors.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, trace, warn};

use crate::config::ExporterConfig;
use crate::exposition;
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
struct ServerState {
    orchestrator: Orchestrator,
    in_flight: Option<Arc<Semaphore>>,
    metrics_path: Arc<str>,
}

/// Build the exporter's router
pub fn router(config: &ExporterConfig, orchestrator: Orchestrator) -> Router {
    let state = ServerState {
        orchestrator,
        in_flight: (config.max_requests > 0).then(|| Arc::new(Semaphore::new(config.max_requests))),
        metrics_path: Arc::from(config.metrics_path.as_str()),
    };

    Router::new()
        .route("/", get(landing_page))
        .route(&config.metrics_path, get(metrics))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn metrics(State(state): State<ServerState>) -> Response {
    let _permit = match &state.in_flight {
        Some(in_flight) => match Arc::clone(in_flight).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!("too many concurrent scrapes, rejecting request");
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Limit of concurrent requests reached, try again later.\n",
                )
                    .into_response();
            }
        },
        None => None,
    };

    let report = state.orchestrator.scrape().await;
    trace!(
        samples = report.samples.len(),
        collectors = report.outcomes.len(),
        "scrape finished"
    );

    match exposition::encode(&report.samples) {
        Ok(body) => ([(header::CONTENT_TYPE, exposition::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode scrape");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error has occurred while serving metrics:\n\n{e}\n"),
            )
                .into_response()
        }
    }
}

async fn landing_page(State(state): State<ServerState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Guardia Exporter</title></head>\n\
         <body>\n\
         <h1>Guardia Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        path = state.metrics_path
    ))
}

/// Bind the listener and serve until `lifetime` is cancelled
///
/// Returns the bound address (useful with port 0) and the handle of the server
/// task. The task cancels `lifetime` when it exits, for whatever reason.
pub async fn spawn_server(
    config: &ExporterConfig,
    orchestrator: Orchestrator,
    lifetime: CancellationToken,
) -> anyhow::Result<(SocketAddr, JoinHandle<anyhow::Result<()>>)> {
    config.validate()?;
    let app = router(config, orchestrator);

    let listener = tokio::net::TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;
    let addr = listener.local_addr()?;

    info!(
        "serving metrics on http://{addr}{path}",
        path = config.metrics_path
    );

    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(lifetime.clone().cancelled_owned())
            .await;
        lifetime.cancel();

        match &result {
            Ok(()) => info!("metrics server stopped"),
            Err(e) => error!("metrics server error: {e}"),
        }
        result.context("metrics server failed")
    });

    Ok((addr, handle))
}
