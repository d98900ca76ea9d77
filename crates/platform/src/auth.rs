//! Identity provider: email/password accounts, one-time codes, sessions
//! and auth-state change notifications.
//!
//! [`InMemoryIdentityProvider`] is the development backend. A hosted
//! provider plugs in behind the same [`IdentityProvider`] trait.

use crate::mailer::{Mailer, OutboundEmail};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use lines_core::config::AuthConfig;
use lines_core::{LinesError, LinesResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SESSION_TOKEN_PREFIX: &str = "sess_";

/// Purpose a one-time code was issued for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    Signup,
    Recovery,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// A signed-in user's session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user: UserInfo,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of a registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpReceipt {
    pub user_id: Uuid,
    pub email: String,
    pub confirmation_sent_at: DateTime<Utc>,
}

/// Auth-state changes pushed to listeners.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedIn { session: Session },
    SignedOut { user_id: Uuid },
    UserUpdated { user_id: Uuid },
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> LinesResult<SignUpReceipt>;

    async fn verify_otp(&self, email: &str, code: &str, purpose: OtpPurpose) -> LinesResult<Session>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> LinesResult<Session>;

    async fn send_password_reset(&self, email: &str) -> LinesResult<()>;

    async fn complete_password_reset(&self, email: &str, code: &str, new_password: &str) -> LinesResult<()>;

    async fn sign_out(&self, access_token: &str) -> LinesResult<()>;

    async fn get_session(&self, access_token: &str) -> LinesResult<Option<Session>>;

    fn subscribe(&self) -> AuthStateSubscription;
}

/// Listener on auth-state changes. Dropping it unsubscribes.
pub struct AuthStateSubscription {
    receiver: broadcast::Receiver<AuthEvent>,
    listeners: Arc<AtomicUsize>,
}

impl AuthStateSubscription {
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Auth-state listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll, for callers that drain events on their own schedule.
    pub fn try_recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

impl Drop for AuthStateSubscription {
    fn drop(&mut self) {
        self.listeners.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Account {
    user_id: Uuid,
    email: String,
    password_hash: String,
    confirmed_at: Option<DateTime<Utc>>,
}

struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
    failed_attempts: u32,
}

pub struct InMemoryIdentityProvider {
    accounts: DashMap<String, Account>,
    codes: DashMap<(String, OtpPurpose), PendingCode>,
    sessions: DashMap<String, Session>,
    events: broadcast::Sender<AuthEvent>,
    listeners: Arc<AtomicUsize>,
    mailer: Arc<dyn Mailer>,
    settings: AuthConfig,
}

impl InMemoryIdentityProvider {
    pub fn new(settings: AuthConfig, mailer: Arc<dyn Mailer>) -> Self {
        let (events, _) = broadcast::channel(64);
        info!("Identity provider initialized (in-memory, development mode)");
        Self {
            accounts: DashMap::new(),
            codes: DashMap::new(),
            sessions: DashMap::new(),
            events,
            listeners: Arc::new(AtomicUsize::new(0)),
            mailer,
            settings,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::SeqCst)
    }

    pub fn active_sessions(&self) -> usize {
        let now = Utc::now();
        self.sessions.iter().filter(|s| !s.value().is_expired(now)).count()
    }

    fn check_password_rules(&self, password: &str) -> LinesResult<()> {
        if password.chars().count() < self.settings.min_password_len {
            return Err(LinesError::Provider(format!(
                "Password should be at least {} characters",
                self.settings.min_password_len
            )));
        }
        Ok(())
    }

    /// Drop expired sessions and codes. Runs on every insert.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len() + self.codes.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        self.codes.retain(|_, c| now < c.expires_at);
        let purged = before.saturating_sub(self.sessions.len() + self.codes.len());
        if purged > 0 {
            debug!(purged, "Expired sessions and codes purged");
        }
        purged
    }

    pub fn pending_codes(&self) -> usize {
        self.codes.len()
    }

    fn issue_code(&self, email: &str, purpose: OtpPurpose, ttl_minutes: i64) -> String {
        self.purge_expired();
        let code = generate_otp();
        self.codes.insert(
            (email.to_string(), purpose),
            PendingCode {
                code: code.clone(),
                expires_at: Utc::now() + Duration::minutes(ttl_minutes),
                failed_attempts: 0,
            },
        );
        code
    }

    /// Consume a pending code. A wrong guess counts against the code, which
    /// is discarded once `max_otp_attempts` guesses have failed.
    fn take_code(&self, email: &str, code: &str, purpose: OtpPurpose) -> LinesResult<()> {
        let key = (email.to_string(), purpose);
        let Some(mut pending) = self.codes.get_mut(&key) else {
            return Err(LinesError::InvalidOtp);
        };
        if Utc::now() >= pending.expires_at {
            drop(pending);
            self.codes.remove(&key);
            return Err(LinesError::InvalidOtp);
        }
        if pending.code != code.trim() {
            pending.failed_attempts += 1;
            let exhausted = pending.failed_attempts >= self.settings.max_otp_attempts;
            drop(pending);
            if exhausted {
                self.codes.remove(&key);
                warn!(?purpose, "One-time code discarded after repeated wrong guesses");
            }
            return Err(LinesError::InvalidOtp);
        }
        drop(pending);
        self.codes.remove(&key);
        Ok(())
    }

    fn open_session(&self, user: UserInfo) -> Session {
        self.purge_expired();
        let now = Utc::now();
        let session = Session {
            access_token: generate_token(SESSION_TOKEN_PREFIX),
            user,
            issued_at: now,
            expires_at: now + Duration::hours(self.settings.session_ttl_hours),
        };
        self.sessions.insert(session.access_token.clone(), session.clone());
        info!(user_id = %session.user.id, "Session created");
        self.publish(AuthEvent::SignedIn {
            session: session.clone(),
        });
        session
    }

    fn publish(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    fn user_info(account: &Account) -> UserInfo {
        UserInfo {
            id: account.user_id,
            email: account.email.clone(),
            confirmed_at: account.confirmed_at,
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> LinesResult<SignUpReceipt> {
        let email = normalize_email(email)?;
        self.check_password_rules(password)?;

        if let Some(existing) = self.accounts.get(&email) {
            if existing.confirmed_at.is_some() {
                return Err(LinesError::Provider("User already registered".to_string()));
            }
        }

        let password_hash = hash_password(password.to_string(), self.settings.password_hash_cost).await?;
        let user_id = match self.accounts.get_mut(&email) {
            // Re-registering an unconfirmed address replaces its password and resends the code.
            Some(mut existing) => {
                existing.password_hash = password_hash;
                existing.user_id
            }
            None => {
                let user_id = Uuid::new_v4();
                self.accounts.insert(
                    email.clone(),
                    Account {
                        user_id,
                        email: email.clone(),
                        password_hash,
                        confirmed_at: None,
                    },
                );
                user_id
            }
        };

        let ttl = self.settings.otp_ttl_minutes;
        let code = self.issue_code(&email, OtpPurpose::Signup, ttl);
        self.mailer.send(OutboundEmail::signup_confirmation(&email, &code, ttl))?;
        info!(user_id = %user_id, "Account registered, confirmation pending");

        Ok(SignUpReceipt {
            user_id,
            email,
            confirmation_sent_at: Utc::now(),
        })
    }

    async fn verify_otp(&self, email: &str, code: &str, purpose: OtpPurpose) -> LinesResult<Session> {
        let email = normalize_email(email).map_err(|_| LinesError::InvalidOtp)?;
        self.take_code(&email, code, purpose)?;

        let user = {
            let mut account = self.accounts.get_mut(&email).ok_or(LinesError::InvalidOtp)?;
            if purpose == OtpPurpose::Signup && account.confirmed_at.is_none() {
                account.confirmed_at = Some(Utc::now());
                info!(user_id = %account.user_id, "Email confirmed");
            }
            Self::user_info(&account)
        };
        Ok(self.open_session(user))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> LinesResult<Session> {
        let email = normalize_email(email).map_err(|_| LinesError::InvalidCredentials)?;
        let (hash, user) = match self.accounts.get(&email) {
            Some(account) => (account.password_hash.clone(), Self::user_info(&account)),
            None => return Err(LinesError::InvalidCredentials),
        };

        if !verify_password(password.to_string(), hash).await? {
            return Err(LinesError::InvalidCredentials);
        }
        if user.confirmed_at.is_none() {
            return Err(LinesError::EmailNotConfirmed);
        }
        Ok(self.open_session(user))
    }

    async fn send_password_reset(&self, email: &str) -> LinesResult<()> {
        let email = normalize_email(email)?;
        if !self.accounts.contains_key(&email) {
            // Unknown addresses get the same answer as known ones.
            debug!("Password reset requested for unknown address");
            return Ok(());
        }
        let ttl = self.settings.reset_ttl_minutes;
        let code = self.issue_code(&email, OtpPurpose::Recovery, ttl);
        self.mailer.send(OutboundEmail::password_reset(&email, &code, ttl))?;
        Ok(())
    }

    async fn complete_password_reset(&self, email: &str, code: &str, new_password: &str) -> LinesResult<()> {
        let email = normalize_email(email).map_err(|_| LinesError::InvalidOtp)?;
        self.check_password_rules(new_password)?;
        self.take_code(&email, code, OtpPurpose::Recovery)?;

        let password_hash = hash_password(new_password.to_string(), self.settings.password_hash_cost).await?;
        let user_id = {
            let mut account = self.accounts.get_mut(&email).ok_or(LinesError::InvalidOtp)?;
            account.password_hash = password_hash;
            account.user_id
        };

        // Existing sessions were opened with the old password.
        self.sessions.retain(|_, s| s.user.id != user_id);
        info!(user_id = %user_id, "Password reset completed");
        self.publish(AuthEvent::UserUpdated { user_id });
        Ok(())
    }

    async fn sign_out(&self, access_token: &str) -> LinesResult<()> {
        if let Some((_, session)) = self.sessions.remove(access_token) {
            info!(user_id = %session.user.id, "Session revoked");
            self.publish(AuthEvent::SignedOut {
                user_id: session.user.id,
            });
        }
        Ok(())
    }

    async fn get_session(&self, access_token: &str) -> LinesResult<Option<Session>> {
        let now = Utc::now();
        let session = self.sessions.get(access_token).map(|s| s.value().clone());
        match session {
            Some(session) if session.is_expired(now) => {
                self.sessions.remove(access_token);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn subscribe(&self) -> AuthStateSubscription {
        self.listeners.fetch_add(1, Ordering::SeqCst);
        AuthStateSubscription {
            receiver: self.events.subscribe(),
            listeners: self.listeners.clone(),
        }
    }
}

fn normalize_email(email: &str) -> LinesResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(LinesError::Provider("Unable to validate email address: invalid format".to_string()));
    }
    Ok(email)
}

/// Six-digit numeric one-time code.
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

/// Random opaque bearer token with a readable prefix.
pub fn generate_token(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    format!("{}{}", prefix, hex::encode(bytes))
}

async fn hash_password(password: String, cost: u32) -> LinesResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| LinesError::Internal(e.into()))?
        .map_err(|e| LinesError::Provider(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> LinesResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| LinesError::Internal(e.into()))?
        .map_err(|e| LinesError::Provider(e.to_string()))
}
