//! API server. Serves the admin REST API, the dashboard stream and the
//! probes over HTTP, with Prometheus metrics on a separate port.

use crate::rest::{self, ProbeState};
use crate::stream;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use lines_core::config::AppConfig;
use lines_management::{management_router, require_admin, ManagementState};
use std::net::SocketAddr;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    state: ManagementState,
}

impl ApiServer {
    pub fn new(config: AppConfig, state: ManagementState) -> Self {
        Self { config, state }
    }

    /// Full application router.
    pub fn router(state: ManagementState) -> Router {
        let probes = ProbeState {
            management: state.clone(),
            start_time: Instant::now(),
        };

        let live = Router::new()
            .route("/api/v1/dashboard/stream", get(stream::dashboard_stream))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
            .with_state(state.clone());

        let ops = Router::new()
            .route("/health", get(rest::health_check))
            .route("/ready", get(rest::readiness))
            .route("/live", get(rest::liveness))
            .with_state(probes);

        Router::new()
            .merge(management_router(state))
            .merge(live)
            .merge(ops)
            // Middleware
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Start the HTTP server. Returns after ctrl-c.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = Self::router(self.state.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(self.config.api.host.parse()?, self.config.metrics.port))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
