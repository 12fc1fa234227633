use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ErrorShape {
    pub error_message: String,
    pub error_type: String,
}

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Invalid CloudEvent: {reason}")]
    InvalidEvent { reason: String },

    #[error("Function target not found: {target}")]
    FunctionNotFound { target: String },

    #[error("Object not found: gs://{bucket}/{name}")]
    ObjectNotFound { bucket: String, name: String },

    #[error("Generation precondition failed for gs://{bucket}/{name}")]
    PreconditionFailed { bucket: String, name: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Speech-to-text error: {message}")]
    SpeechError { message: String },

    #[error("Media probe failed: {reason}")]
    ProbeFailed { reason: String },

    #[error("Media probe timed out after {timeout_secs}s")]
    ProbeTimeout { timeout_secs: u64 },

    #[error("Audit log append gave up after {attempts} attempts due to concurrent writes")]
    AuditContention { attempts: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    #[error("Internal server error: {reason}")]
    InternalError { reason: String },
}

impl IntakeError {
    pub fn to_error_shape(&self) -> ErrorShape {
        ErrorShape {
            error_message: self.to_string(),
            error_type: self.error_type().to_string(),
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            IntakeError::InvalidEvent { .. } => "InvalidCloudEvent",
            IntakeError::FunctionNotFound { .. } => "FunctionNotFound",
            IntakeError::ObjectNotFound { .. } => "ObjectNotFound",
            IntakeError::PreconditionFailed { .. } => "PreconditionFailed",
            IntakeError::StorageError { .. } => "StorageError",
            IntakeError::AuthError { .. } => "AuthError",
            IntakeError::SpeechError { .. } => "SpeechError",
            IntakeError::ProbeFailed { .. } => "ProbeError",
            IntakeError::ProbeTimeout { .. } => "ProbeError",
            IntakeError::AuditContention { .. } => "AuditContention",
            IntakeError::Io(_) => "ServiceException",
            IntakeError::ConfigError { .. } => "ServiceException",
            IntakeError::InternalError { .. } => "ServiceException",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            IntakeError::InvalidEvent { .. } => 400,
            IntakeError::FunctionNotFound { .. } => 404,
            _ => 500,
        }
    }

    /// True for failures another writer caused; the caller may retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            IntakeError::PreconditionFailed { .. } | IntakeError::ObjectNotFound { .. }
        )
    }

    pub fn storage(message: impl ToString) -> Self {
        IntakeError::StorageError {
            message: message.to_string(),
        }
    }

    pub fn internal(reason: impl ToString) -> Self {
        IntakeError::InternalError {
            reason: reason.to_string(),
        }
    }
}
