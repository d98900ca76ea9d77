//! Internet lines admin backend: tier tables, the table and form view
//! models, the live dashboard, the auth flow and app shell, and the REST API.
//!
//! Data stored in DashMap (development); swap to PostgreSQL for production.

pub mod auth;
pub mod auth_flow;
pub mod contact;
pub mod dashboard;
pub mod form;
pub mod handlers;
pub mod models;
pub mod router;
pub mod shell;
pub mod store;
pub mod table;
pub mod tabs;
pub mod waiting;

pub use auth::require_admin;
pub use auth_flow::{AuthForm, AuthStep, AuthSuccess};
pub use dashboard::{DashboardSnapshot, DashboardStats, DashboardWatcher, StatsSource};
pub use form::LineForm;
pub use handlers::{ApiError, ManagementState};
pub use router::management_router;
pub use shell::{AppShell, ShellState, ShellView};
pub use store::LineStore;
pub use table::RecordTable;
pub use tabs::TabbedApp;
