//! Identity and access: the identity provider (accounts, one-time codes,
//! sessions, auth-state events), the operator gate, and outbound mail.

pub mod admin;
pub mod auth;
pub mod mailer;

pub use admin::{AdminGate, AdminGrant};
pub use auth::{
    AuthEvent, AuthStateSubscription, IdentityProvider, InMemoryIdentityProvider, OtpPurpose, Session, SignUpReceipt,
    UserInfo,
};
pub use mailer::{CaptureMailer, EmailKind, Mailer, TracingMailer};
