use crate::notification::Notification;
use thiserror::Error;

pub type LinesResult<T> = Result<T, LinesError>;

#[derive(Error, Debug)]
pub enum LinesError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rejected locally before any provider or storage call.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Token has expired or is invalid")]
    InvalidOtp,

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// A failed operation together with what the user is told about it.
#[derive(Debug)]
pub struct Failure {
    pub error: LinesError,
    pub notification: Notification,
}

impl Failure {
    pub fn new(error: LinesError, notification: Notification) -> Self {
        Self { error, notification }
    }
}

impl From<LinesError> for Failure {
    fn from(error: LinesError) -> Self {
        let notification = error.notification();
        Self { error, notification }
    }
}

impl LinesError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        LinesError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Short machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            LinesError::Config(_) => "config_error",
            LinesError::Validation(_) => "validation_failed",
            LinesError::EmailNotConfirmed => "email_not_confirmed",
            LinesError::InvalidCredentials => "invalid_credentials",
            LinesError::InvalidOtp => "invalid_otp",
            LinesError::Provider(_) => "provider_error",
            LinesError::Unauthorized(_) => "unauthorized",
            LinesError::Forbidden(_) => "forbidden",
            LinesError::NotFound { .. } => "not_found",
            LinesError::Storage(_) => "storage_error",
            LinesError::Serialization(_) => "serialization_error",
            LinesError::Io(_) => "io_error",
            LinesError::Internal(_) => "internal_error",
        }
    }

    /// The notification a user sees for this failure.
    pub fn notification(&self) -> Notification {
        match self {
            LinesError::Validation(msg) => Notification::error("Error", msg.clone()),
            LinesError::EmailNotConfirmed => Notification::error(
                "Email not confirmed",
                "Please confirm your email address first",
            ),
            LinesError::InvalidOtp => Notification::error("Verification failed", "Invalid code"),
            LinesError::InvalidCredentials => {
                Notification::error("Login failed", "Check the credentials you entered")
            }
            other => Notification::error("Error", other.to_string()),
        }
    }
}
