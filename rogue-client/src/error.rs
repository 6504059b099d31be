/// Error types for RogueDB sessions and schema changes
use chrono::{DateTime, Utc};
use rogue_core::OperandError;
use thiserror::Error;
use tonic::{Code, Status};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Session timeout: {0}")]
    Timeout(String),

    #[error("Server rejected session ({code}): {message}")]
    ServerRejected { code: String, message: String },

    #[error("Session stream is closed")]
    Closed,

    #[error("Invalid operand: {0}")]
    InvalidOperand(#[from] OperandError),

    #[error("Credential expired at {expired_at}")]
    CredentialExpired { expired_at: DateTime<Utc> },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Query limit exceeded: {0}")]
    QueryLimit(String),
}

impl SessionError {
    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::Transport(_) => "SESSION_TRANSPORT",
            SessionError::Timeout(_) => "SESSION_TIMEOUT",
            SessionError::ServerRejected { .. } => "SESSION_SERVER_REJECTED",
            SessionError::Closed => "SESSION_CLOSED",
            SessionError::InvalidOperand(_) => "SESSION_INVALID_OPERAND",
            SessionError::CredentialExpired { .. } => "SESSION_CREDENTIAL_EXPIRED",
            SessionError::InvalidConfig(_) => "SESSION_INVALID_CONFIG",
            SessionError::QueryLimit(_) => "SESSION_QUERY_LIMIT",
        }
    }

    /// Whether a caller could reasonably try again
    ///
    /// Informational only. After a timeout the server's final state is
    /// unknown, so a retried mutation may apply twice.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(_) | SessionError::Timeout(_) | SessionError::CredentialExpired { .. }
        )
    }
}

/// Convert gRPC Status to SessionError
impl From<Status> for SessionError {
    fn from(status: Status) -> Self {
        let message = status.message().to_string();

        match status.code() {
            Code::DeadlineExceeded => SessionError::Timeout(message),
            Code::Unavailable | Code::Cancelled => SessionError::Transport(message),
            code => SessionError::ServerRejected {
                code: format!("{:?}", code),
                message,
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Schema validation failed: {0}")]
    ValidationFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Credential expired at {expired_at}")]
    CredentialExpired { expired_at: DateTime<Utc> },
}

impl SchemaError {
    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::ValidationFailed(_) => "SCHEMA_VALIDATION_FAILED",
            SchemaError::Transport(_) => "SCHEMA_TRANSPORT",
            SchemaError::CredentialExpired { .. } => "SCHEMA_CREDENTIAL_EXPIRED",
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, SchemaError::ValidationFailed(_))
    }
}

/// Convert gRPC Status to SchemaError
impl From<Status> for SchemaError {
    fn from(status: Status) -> Self {
        match status.code() {
            Code::InvalidArgument | Code::FailedPrecondition => {
                SchemaError::ValidationFailed(status.message().to_string())
            }
            code => SchemaError::Transport(format!("{:?}: {}", code, status.message())),
        }
    }
}
