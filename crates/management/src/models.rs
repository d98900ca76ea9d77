//! Request and response bodies of the admin API, plus the audit log.

use chrono::{DateTime, Utc};
use lines_core::{LineRecord, Notification};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Audit Log ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    AdminLogin,
    Logout,
}

// ─── Auth ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email address, or the operator username.
    #[serde(alias = "email")]
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub notification: Notification,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(alias = "confirmPassword")]
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub pending_email: String,
    pub notification: Notification,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    #[serde(alias = "email")]
    pub identifier: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetCompleteRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

// ─── Lines ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SavedLine {
    pub record: LineRecord,
    pub notification: Notification,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub notification: Notification,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub notification: Notification,
}
