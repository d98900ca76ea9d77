//! Admin API router. Auth endpoints are open; data endpoints need an
//! operator grant.

use crate::auth::require_admin;
use crate::handlers::{self, ManagementState};
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;

/// Build the router with all endpoints. Merge it into the main app.
pub fn management_router(state: ManagementState) -> Router {
    let admin = Router::new()
        .route("/api/v1/tiers/:tier/lines", get(handlers::list_lines).post(handlers::create_line))
        .route(
            "/api/v1/tiers/:tier/lines/:id",
            put(handlers::update_line).patch(handlers::patch_line).delete(handlers::delete_line),
        )
        .route("/api/v1/tiers/:tier/table", get(handlers::table_view))
        .route("/api/v1/dashboard", get(handlers::dashboard))
        .route("/api/v1/audit-log", get(handlers::audit_log))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        // Auth
        .route("/api/v1/auth/login", post(handlers::handle_login))
        .route("/api/v1/auth/signup", post(handlers::handle_signup))
        .route("/api/v1/auth/verify", post(handlers::handle_verify))
        .route("/api/v1/auth/password-reset", post(handlers::handle_password_reset))
        .route("/api/v1/auth/password-reset/complete", post(handlers::handle_password_reset_complete))
        .route("/api/v1/auth/logout", post(handlers::handle_logout))
        // Session & static pages
        .route("/api/v1/session", get(handlers::session))
        .route("/api/v1/waiting", get(handlers::waiting_page))
        .route("/api/v1/contact", get(handlers::contact))
        .merge(admin)
        .with_state(state)
}
