//! Prometheus scrape endpoint.

use std::net::SocketAddr;

use {
    axum::{
        Router,
        extract::State,
        http::header,
        response::IntoResponse,
        routing::get,
    },
    chanmirror_metrics::MetricsHandle,
    tracing::{info, warn},
};

/// Serve `GET /metrics` on `listen` in the background.
///
/// Returns the bound address.
pub async fn spawn(listen: &str, handle: MetricsHandle) -> anyhow::Result<SocketAddr> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address {listen}: {e}"))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    let app = Router::new()
        .route("/metrics", get(prometheus_metrics_handler))
        .with_state(handle);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "metrics endpoint stopped");
        }
    });

    info!(%addr, "prometheus metrics endpoint listening");
    Ok(addr)
}

async fn prometheus_metrics_handler(State(handle): State<MetricsHandle>) -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
