//! HTTP server for Prometheus metrics endpoint.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use promoter::WatchdogMetrics;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// HTTP server for metrics endpoint
pub struct MetricsServer {
    metrics: Arc<WatchdogMetrics>,
    listen_addr: String,
}

impl MetricsServer {
    /// Create a new metrics server
    pub fn new(metrics: Arc<WatchdogMetrics>, listen_addr: String) -> Self {
        Self {
            metrics,
            listen_addr,
        }
    }

    /// Build the router serving `/metrics`
    pub fn router(metrics: Arc<WatchdogMetrics>) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(metrics)
    }

    /// Bind and serve until the task is aborted
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.listen_addr).await?;
        info!(listen_addr = %self.listen_addr, "Metrics server listening");

        axum::serve(listener, Self::router(self.metrics)).await?;
        Ok(())
    }
}

async fn metrics_handler(State(metrics): State<Arc<WatchdogMetrics>>) -> Response {
    // Until the primary has answered once, the gauges describe nothing useful
    if !metrics.monitoring_reached() {
        return (StatusCode::SERVICE_UNAVAILABLE, "watchdog starting\n").into_response();
    }

    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &metrics.registry) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        buffer,
    )
        .into_response()
}
