//! Outbound email for verification and password-reset codes.

use lines_core::LinesResult;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    SignupConfirmation,
    PasswordReset,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub kind: EmailKind,
    pub subject: String,
    pub body: String,
    pub code: String,
}

impl OutboundEmail {
    pub fn signup_confirmation(to: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            kind: EmailKind::SignupConfirmation,
            subject: "Confirm your signup".to_string(),
            body: format!("Your verification code is: {code}. Valid for {ttl_minutes} minutes."),
            code: code.to_string(),
        }
    }

    pub fn password_reset(to: &str, code: &str, ttl_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            kind: EmailKind::PasswordReset,
            subject: "Reset your password".to_string(),
            body: format!("Your password reset code is: {code}. Valid for {ttl_minutes} minutes."),
            code: code.to_string(),
        }
    }
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: OutboundEmail) -> LinesResult<()>;
}

/// Development mailer: writes messages to the log instead of delivering them.
pub struct TracingMailer;

impl Mailer for TracingMailer {
    fn send(&self, email: OutboundEmail) -> LinesResult<()> {
        info!(to = %email.to, kind = ?email.kind, subject = %email.subject, "Email queued");
        debug!(to = %email.to, code = %email.code, "Email body: {}", email.body);
        Ok(())
    }
}

/// Keeps every message in memory. Used by tests to read codes back.
#[derive(Default)]
pub struct CaptureMailer {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl CaptureMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().clone()
    }

    /// Most recent code mailed to `to` for the given purpose.
    pub fn last_code(&self, to: &str, kind: EmailKind) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|m| m.to == to && m.kind == kind)
            .map(|m| m.code.clone())
    }
}

impl Mailer for CaptureMailer {
    fn send(&self, email: OutboundEmail) -> LinesResult<()> {
        self.sent.lock().push(email);
        Ok(())
    }
}
