//! App shell: which top-level view a caller gets.
//!
//! `Loading -> Unauthenticated | AuthenticatedUser`, then auth events and
//! explicit sign-in/sign-out move between states. `AuthenticatedAdmin` is
//! only reachable through an operator grant; restoring a provider session
//! never produces it.

use crate::auth_flow::AuthSuccess;
use chrono::{DateTime, Utc};
use lines_core::Notification;
use lines_platform::{AdminGate, AdminGrant, AuthEvent, IdentityProvider, Session};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ShellState {
    Loading,
    Unauthenticated,
    AuthenticatedUser(Session),
    AuthenticatedAdmin(AdminGrant),
}

/// Top-level view rendered for a state.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShellView {
    Loading,
    AuthForm,
    WaitingPage,
    TabbedApp,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ShellStateKind {
    Loading,
    Unauthenticated,
    AuthenticatedUser,
    AuthenticatedAdmin,
}

impl ShellState {
    pub fn kind(&self) -> ShellStateKind {
        match self {
            ShellState::Loading => ShellStateKind::Loading,
            ShellState::Unauthenticated => ShellStateKind::Unauthenticated,
            ShellState::AuthenticatedUser(_) => ShellStateKind::AuthenticatedUser,
            ShellState::AuthenticatedAdmin(_) => ShellStateKind::AuthenticatedAdmin,
        }
    }

    pub fn view(&self) -> ShellView {
        match self {
            ShellState::Loading => ShellView::Loading,
            ShellState::Unauthenticated => ShellView::AuthForm,
            ShellState::AuthenticatedUser(_) => ShellView::WaitingPage,
            ShellState::AuthenticatedAdmin(_) => ShellView::TabbedApp,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, ShellState::AuthenticatedUser(_) | ShellState::AuthenticatedAdmin(_))
    }

    /// Email or operator identifier of the caller.
    pub fn identity(&self) -> Option<&str> {
        match self {
            ShellState::AuthenticatedUser(s) => Some(&s.user.email),
            ShellState::AuthenticatedAdmin(g) => Some(&g.identifier),
            _ => None,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ShellState::AuthenticatedUser(s) => Some(s.expires_at),
            ShellState::AuthenticatedAdmin(g) => Some(g.expires_at),
            _ => None,
        }
    }
}

pub struct AppShell {
    provider: Arc<dyn IdentityProvider>,
    gate: Arc<AdminGate>,
    state: ShellState,
}

impl AppShell {
    pub fn new(provider: Arc<dyn IdentityProvider>, gate: Arc<AdminGate>) -> Self {
        Self {
            provider,
            gate,
            state: ShellState::Loading,
        }
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn view(&self) -> ShellView {
        self.state.view()
    }

    /// Bootstrap from a stored provider token.
    pub async fn restore(&mut self, access_token: Option<&str>) -> &ShellState {
        self.state = match access_token {
            Some(token) => match self.provider.get_session(token).await {
                Ok(Some(session)) => ShellState::AuthenticatedUser(session),
                Ok(None) => ShellState::Unauthenticated,
                Err(e) => {
                    warn!(error = %e, "Session lookup failed");
                    ShellState::Unauthenticated
                }
            },
            None => ShellState::Unauthenticated,
        };
        debug!(state = ?self.state.kind(), "Session restored");
        &self.state
    }

    /// Shell for one request's bearer token. Operator grants are checked
    /// against the gate; anything else goes through [`AppShell::restore`].
    pub async fn for_request(provider: Arc<dyn IdentityProvider>, gate: Arc<AdminGate>, token: Option<&str>) -> Self {
        let mut shell = Self::new(provider, gate);
        match token {
            Some(token) if AdminGate::is_admin_token(token) => {
                shell.state = match shell.gate.validate(token) {
                    Some(grant) => ShellState::AuthenticatedAdmin(grant),
                    None => ShellState::Unauthenticated,
                };
            }
            other => {
                shell.restore(other).await;
            }
        }
        shell
    }

    pub fn into_state(self) -> ShellState {
        self.state
    }

    pub fn on_auth_success(&mut self, success: AuthSuccess) {
        self.state = match success {
            AuthSuccess::Admin(grant) => ShellState::AuthenticatedAdmin(grant),
            AuthSuccess::User(session) => ShellState::AuthenticatedUser(session),
        };
        info!(state = ?self.state.kind(), "Signed in");
    }

    /// Apply an auth-state change pushed by the provider.
    ///
    /// Provider events only concern provider sessions. An operator shell
    /// holds a gate grant, not a provider session, so it leaves through
    /// [`AppShell::logout`] or grant expiry rather than a `SignedOut` event.
    pub fn on_auth_event(&mut self, event: &AuthEvent) {
        match (event, &self.state) {
            (AuthEvent::SignedIn { session }, ShellState::Unauthenticated | ShellState::Loading) => {
                self.state = ShellState::AuthenticatedUser(session.clone());
            }
            (AuthEvent::SignedOut { user_id }, ShellState::AuthenticatedUser(current)) if current.user.id == *user_id => {
                self.state = ShellState::Unauthenticated;
            }
            _ => {}
        }
    }

    /// Revoke whatever the caller holds and return to the auth form.
    pub async fn logout(&mut self) -> Notification {
        match std::mem::replace(&mut self.state, ShellState::Unauthenticated) {
            ShellState::AuthenticatedAdmin(grant) => {
                self.gate.revoke(&grant.token);
            }
            ShellState::AuthenticatedUser(session) => {
                if let Err(e) = self.provider.sign_out(&session.access_token).await {
                    warn!(error = %e, "Provider sign-out failed");
                }
            }
            ShellState::Loading | ShellState::Unauthenticated => {}
        }
        Notification::success("Signed out", "You have been signed out")
    }
}
