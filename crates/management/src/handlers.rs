//! Axum REST handlers for the admin API.

use crate::auth::{self, bearer_token};
use crate::auth_flow::{AuthForm, AuthOutcome, AuthStep, AuthSuccess};
use crate::contact::ContactLink;
use crate::dashboard::{fetch_stats, DashboardStats};
use crate::form::LineForm;
use crate::models::*;
use crate::shell::{AppShell, ShellState, ShellStateKind, ShellView};
use crate::store::LineStore;
use crate::table::{RecordTable, TableView};
use crate::waiting::WaitingPage;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use lines_core::{AppConfig, ChangeFeed, Failure, LineDraft, LinePatch, LineRecord, LinesError, LinesResult, Notification, Tier};
use lines_platform::{AdminGate, AdminGrant, IdentityProvider, InMemoryIdentityProvider, Mailer};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// Shared management state.
#[derive(Clone)]
pub struct ManagementState {
    pub store: Arc<LineStore>,
    pub feed: Arc<ChangeFeed>,
    pub provider: Arc<dyn IdentityProvider>,
    pub gate: Arc<AdminGate>,
    pub contact: Arc<ContactLink>,
}

impl ManagementState {
    /// Wire the development backends from configuration.
    pub fn from_config(config: &AppConfig, mailer: Arc<dyn Mailer>) -> LinesResult<Self> {
        let feed = Arc::new(ChangeFeed::new(config.dashboard.feed_capacity));
        let store = Arc::new(LineStore::new(feed.clone()));
        let provider = Arc::new(InMemoryIdentityProvider::new(config.auth.clone(), mailer));
        Ok(Self {
            store,
            feed,
            provider,
            gate: Arc::new(AdminGate::from_config(&config.admin)),
            contact: Arc::new(ContactLink::from_config(&config.contact)?),
        })
    }

    fn auth_form(&self) -> AuthForm {
        AuthForm::new(self.provider.clone(), self.gate.clone())
    }
}

// ─── Errors ────────────────────────────────────────────────────────────────

/// Error half of every handler result.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_for(error: &LinesError) -> StatusCode {
    match error {
        LinesError::Validation(_) | LinesError::Provider(_) => StatusCode::BAD_REQUEST,
        LinesError::InvalidCredentials | LinesError::InvalidOtp | LinesError::Unauthorized(_) => {
            StatusCode::UNAUTHORIZED
        }
        LinesError::EmailNotConfirmed | LinesError::Forbidden(_) => StatusCode::FORBIDDEN,
        LinesError::NotFound { .. } => StatusCode::NOT_FOUND,
        LinesError::Storage(_) => StatusCode::CONFLICT,
        LinesError::Config(_) | LinesError::Serialization(_) | LinesError::Io(_) | LinesError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Failure> for ApiError {
    fn from(failure: Failure) -> Self {
        let status = status_for(&failure.error);
        if status.is_server_error() {
            error!(error = %failure.error, "Request failed");
        }
        Self {
            status,
            body: ErrorResponse {
                error: failure.error.code().to_string(),
                message: failure.error.to_string(),
                notification: failure.notification,
            },
        }
    }
}

impl From<LinesError> for ApiError {
    fn from(error: LinesError) -> Self {
        Failure::from(error).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_tier(raw: &str) -> ApiResult<Tier> {
    raw.parse::<Tier>().map_err(ApiError::from)
}

// ─── Auth ──────────────────────────────────────────────────────────────────

fn login_response(state: &ManagementState, outcome: AuthOutcome) -> ApiResult<LoginResponse> {
    let AuthStep::SignedIn(success) = outcome.step else {
        return Err(LinesError::Internal(anyhow::anyhow!("sign-in produced no session")).into());
    };
    let response = match success {
        AuthSuccess::Admin(grant) => {
            state.store.log_audit(&grant.identifier, AuditAction::AdminLogin, "session", &grant.identifier, serde_json::json!({}));
            LoginResponse {
                token: grant.token,
                role: Role::Admin,
                expires_at: grant.expires_at,
                notification: outcome.notification,
            }
        }
        AuthSuccess::User(session) => {
            state.store.log_audit(&session.user.email, AuditAction::Login, "session", &session.user.id.to_string(), serde_json::json!({}));
            LoginResponse {
                token: session.access_token,
                role: Role::User,
                expires_at: session.expires_at,
                notification: outcome.notification,
            }
        }
    };
    Ok(response)
}

pub async fn handle_login(
    State(state): State<ManagementState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let outcome = state.auth_form().login(&req.identifier, &req.password).await?;
    login_response(&state, outcome).map(Json)
}

pub async fn handle_signup(
    State(state): State<ManagementState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<SignupResponse>)> {
    let outcome = state.auth_form().signup(&req.email, &req.password, &req.confirm_password).await?;
    let pending_email = match outcome.step {
        AuthStep::VerificationPending { email } => email,
        _ => req.email,
    };
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            pending_email,
            notification: outcome.notification,
        }),
    ))
}

pub async fn handle_verify(
    State(state): State<ManagementState>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let outcome = state.auth_form().verify(&req.email, &req.code).await?;
    login_response(&state, outcome).map(Json)
}

pub async fn handle_password_reset(
    State(state): State<ManagementState>,
    Json(req): Json<PasswordResetRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let outcome = state.auth_form().forgot_password(&req.identifier).await?;
    Ok(Json(MessageResponse {
        notification: outcome.notification,
    }))
}

pub async fn handle_password_reset_complete(
    State(state): State<ManagementState>,
    Json(req): Json<PasswordResetCompleteRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let outcome = state
        .auth_form()
        .complete_password_reset(&req.email, &req.code, &req.new_password)
        .await?;
    Ok(Json(MessageResponse {
        notification: outcome.notification,
    }))
}

pub async fn handle_logout(State(state): State<ManagementState>, headers: HeaderMap) -> ApiResult<Json<MessageResponse>> {
    let Some(token) = bearer_token(&headers) else {
        return Err(LinesError::Unauthorized("Authorization header with Bearer token required".to_string()).into());
    };
    let mut shell = AppShell::for_request(state.provider.clone(), state.gate.clone(), Some(token)).await;
    let identity = shell.state().identity().map(str::to_string);
    let notification = shell.logout().await;
    if let Some(identity) = identity {
        state.store.log_audit(&identity, AuditAction::Logout, "session", &identity, serde_json::json!({}));
    }
    Ok(Json(MessageResponse { notification }))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub state: ShellStateKind,
    pub view: ShellView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

pub async fn session(State(state): State<ManagementState>, headers: HeaderMap) -> Json<SessionResponse> {
    let shell = auth::caller(&state, &headers).await;
    Json(SessionResponse {
        state: shell.kind(),
        view: shell.view(),
        identity: shell.identity().map(str::to_string),
        expires_at: shell.expires_at(),
    })
}

pub async fn waiting_page(State(state): State<ManagementState>, headers: HeaderMap) -> ApiResult<Json<WaitingPage>> {
    match auth::caller(&state, &headers).await {
        ShellState::AuthenticatedUser(_) | ShellState::AuthenticatedAdmin(_) => Ok(Json(WaitingPage::new(&state.contact))),
        _ => Err(LinesError::Unauthorized("Sign in first".to_string()).into()),
    }
}

pub async fn contact(State(state): State<ManagementState>) -> Json<ContactResponse> {
    Json(ContactResponse {
        url: state.contact.url().to_string(),
    })
}

// ─── Lines ─────────────────────────────────────────────────────────────────

pub async fn list_lines(State(state): State<ManagementState>, Path(tier): Path<String>) -> ApiResult<Json<Vec<LineRecord>>> {
    let tier = parse_tier(&tier)?;
    Ok(Json(state.store.select(tier)))
}

pub async fn create_line(
    State(state): State<ManagementState>,
    Extension(grant): Extension<AdminGrant>,
    Path(tier): Path<String>,
    Json(draft): Json<LineDraft>,
) -> ApiResult<(StatusCode, Json<SavedLine>)> {
    let tier = parse_tier(&tier)?;
    let mut form = LineForm::create(tier);
    let default_line_type = std::mem::take(&mut form.values.line_type);
    form.values = draft;
    if form.values.line_type.trim().is_empty() {
        form.values.line_type = default_line_type;
    }
    let saved = form.submit(&state.store, &grant.identifier)?;
    metrics::counter!("management.lines.created", "tier" => tier.table()).increment(1);
    Ok((
        StatusCode::CREATED,
        Json(SavedLine {
            record: saved.record,
            notification: saved.notification,
        }),
    ))
}

/// Full replacement from a draft: omitted fields take their defaults.
/// Use [`patch_line`] to change individual columns.
pub async fn update_line(
    State(state): State<ManagementState>,
    Extension(grant): Extension<AdminGrant>,
    Path((tier, id)): Path<(String, i64)>,
    Json(draft): Json<LineDraft>,
) -> ApiResult<Json<SavedLine>> {
    let tier = parse_tier(&tier)?;
    let existing = state
        .store
        .get(tier, id)
        .ok_or_else(|| LinesError::not_found("line", id))?;
    let mut form = LineForm::edit(tier, &existing);
    let line_type = std::mem::take(&mut form.values.line_type);
    form.values = draft;
    if form.values.line_type.trim().is_empty() {
        form.values.line_type = line_type;
    }
    let saved = form.submit(&state.store, &grant.identifier)?;
    metrics::counter!("management.lines.updated", "tier" => tier.table()).increment(1);
    Ok(Json(SavedLine {
        record: saved.record,
        notification: saved.notification,
    }))
}

/// Change only the columns present in the body; `null` clears a nullable column.
pub async fn patch_line(
    State(state): State<ManagementState>,
    Extension(grant): Extension<AdminGrant>,
    Path((tier, id)): Path<(String, i64)>,
    Json(patch): Json<LinePatch>,
) -> ApiResult<Json<SavedLine>> {
    let tier = parse_tier(&tier)?;
    if patch.mobile_number.as_deref().is_some_and(|m| m.trim().is_empty()) {
        return Err(LinesError::Validation("mobile_number cannot be empty".to_string()).into());
    }
    let record = state.store.update(tier, id, patch, &grant.identifier).map_err(|e| {
        let notification = Notification::error("Error", format!("Failed to save the line: {e}"));
        Failure::new(e, notification)
    })?;
    metrics::counter!("management.lines.updated", "tier" => tier.table()).increment(1);
    Ok(Json(SavedLine {
        record,
        notification: Notification::success("Updated", "The line was updated successfully"),
    }))
}

pub async fn delete_line(
    State(state): State<ManagementState>,
    Extension(grant): Extension<AdminGrant>,
    Path((tier, id)): Path<(String, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    let tier = parse_tier(&tier)?;
    // The row action needs no loaded rows; the store reports unknown ids.
    let mut table = RecordTable::new(tier);
    let notification = table.delete(&state.store, id, &grant.identifier)?;
    metrics::counter!("management.lines.deleted", "tier" => tier.table()).increment(1);
    Ok(Json(MessageResponse { notification }))
}

pub async fn table_view(State(state): State<ManagementState>, Path(tier): Path<String>) -> ApiResult<Json<TableView>> {
    let tier = parse_tier(&tier)?;
    Ok(Json(RecordTable::mount(tier, &state.store).render()))
}

// ─── Dashboard & audit ─────────────────────────────────────────────────────

pub async fn dashboard(State(state): State<ManagementState>) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(fetch_stats(state.store.as_ref())?))
}

pub async fn audit_log(State(state): State<ManagementState>) -> Json<Vec<AuditLogEntry>> {
    Json(state.store.get_audit_log())
}
