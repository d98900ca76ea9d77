//! Operational endpoints: health, readiness and liveness probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use lines_management::ManagementState;
use serde::Serialize;
use std::time::Instant;

/// State shared by the probe handlers.
#[derive(Clone)]
pub struct ProbeState {
    pub management: ManagementState,
    pub start_time: Instant,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub admin_gate_enabled: bool,
    pub change_listeners: usize,
}

/// GET /health
pub async fn health_check(State(state): State<ProbeState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        admin_gate_enabled: state.management.gate.is_enabled(),
        change_listeners: state.management.feed.listener_count(),
    })
}

/// GET /ready: readiness probe for Kubernetes.
pub async fn readiness(State(_state): State<ProbeState>) -> StatusCode {
    StatusCode::OK
}

/// GET /live: liveness probe for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
