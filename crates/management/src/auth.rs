//! Bearer token middleware for the data routes.
//!
//! Data routes need a live operator grant. A valid provider session that is
//! not an operator grant is authenticated but forbidden.

use crate::handlers::{ApiError, ManagementState};
use crate::shell::{AppShell, ShellState};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use lines_core::LinesError;
use tracing::debug;

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller behind the request's bearer token.
pub async fn caller(state: &ManagementState, headers: &HeaderMap) -> ShellState {
    AppShell::for_request(state.provider.clone(), state.gate.clone(), bearer_token(headers))
        .await
        .into_state()
}

pub async fn require_admin(State(state): State<ManagementState>, mut req: Request, next: Next) -> Response {
    if bearer_token(req.headers()).is_none() {
        return ApiError::from(LinesError::Unauthorized(
            "Authorization header with Bearer token required".to_string(),
        ))
        .into_response();
    }

    match caller(&state, req.headers()).await {
        ShellState::AuthenticatedAdmin(grant) => {
            req.extensions_mut().insert(grant);
            next.run(req).await
        }
        ShellState::AuthenticatedUser(session) => {
            debug!(user_id = %session.user.id, path = %req.uri().path(), "Non-operator denied");
            ApiError::from(LinesError::Forbidden("Administrator access required".to_string())).into_response()
        }
        ShellState::Loading | ShellState::Unauthenticated => {
            ApiError::from(LinesError::Unauthorized("Invalid or expired bearer token".to_string())).into_response()
        }
    }
}
