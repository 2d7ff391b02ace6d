//! HTTP server for the Prometheus metrics endpoint.
//!
//! Serves `/metrics` from a separate tokio task.

use axum::{Router, routing::get};
use std::net::SocketAddr;
use tokio::sync::watch;

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

pub fn router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serve `/metrics` on `0.0.0.0:port` until `shutdown` turns true.
pub async fn run_http_server(port: u16, mut shutdown: watch::Receiver<bool>) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind metrics endpoint");
            return;
        }
    };
    tracing::info!(%addr, "Prometheus HTTP server listening");

    let stop = async move { crate::events::stopped(&mut shutdown).await };
    if let Err(e) = axum::serve(listener, router()).with_graceful_shutdown(stop).await {
        tracing::error!(error = %e, "HTTP server error");
    }
}
