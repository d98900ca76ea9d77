//! Auth form: login, sign-up, one-time-code verification and password
//! reset, in front of the identity provider and the operator gate.

use lines_core::{Failure, LinesError, Notification};
use lines_platform::{AdminGate, AdminGrant, IdentityProvider, OtpPurpose, Session};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Sub-views of the form. Exactly one is shown.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthView {
    Login,
    Signup,
    Verify,
}

#[derive(Debug, Clone)]
pub enum AuthSuccess {
    Admin(AdminGrant),
    User(Session),
}

#[derive(Debug, Clone)]
pub enum AuthStep {
    SignedIn(AuthSuccess),
    VerificationPending { email: String },
    ResetEmailSent,
    PasswordChanged,
}

#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub step: AuthStep,
    pub notification: Notification,
}

pub type AuthResult = Result<AuthOutcome, Failure>;

pub struct AuthForm {
    provider: Arc<dyn IdentityProvider>,
    gate: Arc<AdminGate>,
    view: AuthView,
    pending_email: Option<String>,
    loading: bool,
}

impl AuthForm {
    pub fn new(provider: Arc<dyn IdentityProvider>, gate: Arc<AdminGate>) -> Self {
        Self {
            provider,
            gate,
            view: AuthView::Login,
            pending_email: None,
            loading: false,
        }
    }

    pub fn view(&self) -> AuthView {
        self.view
    }

    pub fn pending_email(&self) -> Option<&str> {
        self.pending_email.as_deref()
    }

    /// The submit control is disabled while a call is in flight.
    pub fn submit_disabled(&self) -> bool {
        self.loading
    }

    pub fn show_login(&mut self) {
        self.view = AuthView::Login;
    }

    pub fn show_signup(&mut self) {
        self.view = AuthView::Signup;
    }

    /// Leave the verification view. The pending email is kept.
    pub fn back(&mut self) {
        if self.view == AuthView::Verify {
            self.view = AuthView::Signup;
        }
    }

    pub async fn login(&mut self, identifier: &str, password: &str) -> AuthResult {
        let identifier = identifier.trim();
        if let Some(grant) = self.gate.try_grant(identifier, password) {
            metrics::counter!("auth.logins", "outcome" => "admin").increment(1);
            return Ok(AuthOutcome {
                step: AuthStep::SignedIn(AuthSuccess::Admin(grant)),
                notification: Notification::success("Signed in", "Welcome, administrator"),
            });
        }

        self.loading = true;
        let result = self.provider.sign_in_with_password(identifier, password).await;
        self.loading = false;

        match result {
            Ok(session) => {
                metrics::counter!("auth.logins", "outcome" => "user").increment(1);
                info!(user_id = %session.user.id, "User signed in");
                Ok(AuthOutcome {
                    step: AuthStep::SignedIn(AuthSuccess::User(session)),
                    notification: Notification::success("Signed in", "Signed in successfully"),
                })
            }
            Err(e @ LinesError::EmailNotConfirmed) => {
                metrics::counter!("auth.logins", "outcome" => "unconfirmed").increment(1);
                Err(e.into())
            }
            Err(e) => {
                metrics::counter!("auth.logins", "outcome" => "failed").increment(1);
                warn!(error = %e, "Login failed");
                Err(Failure::new(e, Notification::error("Login failed", "Check the credentials you entered")))
            }
        }
    }

    pub async fn signup(&mut self, email: &str, password: &str, confirm_password: &str) -> AuthResult {
        if password != confirm_password {
            return Err(LinesError::Validation("Passwords do not match".to_string()).into());
        }

        self.loading = true;
        let result = self.provider.sign_up(email, password).await;
        self.loading = false;

        let receipt = result.map_err(|e| {
            let description = e.to_string();
            Failure::new(e, Notification::error("Sign-up failed", description))
        })?;
        self.pending_email = Some(receipt.email.clone());
        self.view = AuthView::Verify;
        Ok(AuthOutcome {
            step: AuthStep::VerificationPending { email: receipt.email },
            notification: Notification::success("Account created", "Check your email for the verification code"),
        })
    }

    pub async fn verify(&mut self, email: &str, code: &str) -> AuthResult {
        self.loading = true;
        let result = self.provider.verify_otp(email, code, OtpPurpose::Signup).await;
        self.loading = false;

        match result {
            Ok(session) => {
                self.pending_email = None;
                self.view = AuthView::Login;
                Ok(AuthOutcome {
                    step: AuthStep::SignedIn(AuthSuccess::User(session)),
                    notification: Notification::success("Verified", "Your account has been confirmed"),
                })
            }
            Err(e) => Err(Failure::new(e, LinesError::InvalidOtp.notification())),
        }
    }

    /// Verify the code sent to the email captured at sign-up.
    pub async fn verify_pending(&mut self, code: &str) -> AuthResult {
        let Some(email) = self.pending_email.clone() else {
            return Err(LinesError::Validation("No verification is pending".to_string()).into());
        };
        self.verify(&email, code).await
    }

    /// Needs the identifier typed into the login field.
    pub async fn forgot_password(&mut self, identifier: &str) -> AuthResult {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(LinesError::Validation("Enter your email address first".to_string()).into());
        }

        self.loading = true;
        let result = self.provider.send_password_reset(identifier).await;
        self.loading = false;

        result.map_err(Failure::from)?;
        Ok(AuthOutcome {
            step: AuthStep::ResetEmailSent,
            notification: Notification::success("Email sent", "Check your inbox for the password reset code"),
        })
    }

    pub async fn complete_password_reset(&mut self, email: &str, code: &str, new_password: &str) -> AuthResult {
        self.loading = true;
        let result = self.provider.complete_password_reset(email, code, new_password).await;
        self.loading = false;

        result.map_err(Failure::from)?;
        self.view = AuthView::Login;
        Ok(AuthOutcome {
            step: AuthStep::PasswordChanged,
            notification: Notification::success("Password changed", "Sign in with your new password"),
        })
    }
}
