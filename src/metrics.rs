//! Prometheus counters for notification outcomes

use anyhow::Result;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{Counter, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use tracing::{error, info};

/// Prometheus metrics registry wrapper
#[derive(Clone)]
pub struct MetricsRegistry {
    /// Payloads accepted by the webhook endpoint
    pub sent_total: Counter,
    /// Payloads lost to a transport failure or error status
    pub failed_total: Counter,
    /// Notify calls dropped because no URL is configured
    pub skipped_total: Counter,
    registry: Registry,
}

impl MetricsRegistry {
    /// Create and register all metrics
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let sent_total = Counter::with_opts(
            Opts::new(
                "notifications_sent_total",
                "Total number of notifications delivered",
            )
            .namespace("notify"),
        )?;
        registry.register(Box::new(sent_total.clone()))?;

        let failed_total = Counter::with_opts(
            Opts::new(
                "notifications_failed_total",
                "Total number of notifications that failed",
            )
            .namespace("notify"),
        )?;
        registry.register(Box::new(failed_total.clone()))?;

        let skipped_total = Counter::with_opts(
            Opts::new(
                "notifications_skipped_total",
                "Total number of notifications skipped for lack of a URL",
            )
            .namespace("notify"),
        )?;
        registry.register(Box::new(skipped_total.clone()))?;

        Ok(Self {
            sent_total,
            failed_total,
            skipped_total,
            registry,
        })
    }

    /// Render all metrics in the text exposition format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        Ok(encoder.encode_to_string(&self.registry.gather())?)
    }

    /// Spawn metrics server in background task
    pub fn spawn_server(&self, addr: SocketAddr) -> tokio::task::JoinHandle<()> {
        let metrics = self.clone();
        tokio::spawn(async move {
            let app = Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics);

            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!("Failed to bind metrics server to {}: {}", addr, e);
                    return;
                }
            };

            info!("Metrics server listening on http://{}", addr);

            if let Err(e) = axum::serve(listener, app).await {
                error!("Metrics server error: {}", e);
            }
        })
    }
}

/// Handler for /metrics endpoint
async fn metrics_handler(State(metrics): State<MetricsRegistry>) -> Response {
    match metrics.encode() {
        Ok(body) => {
            let mut response = Response::new(body.into());
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics registry")
    }
}
