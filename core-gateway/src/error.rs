//! Error types for the transport gateway

use core_auth::error::{ApiErrorBody, NETWORK_ERROR_MESSAGE};
use core_auth::{AuthError, ErrorKind};
use serde_json::Value;
use thiserror::Error;

/// Normalized failure of a gateway request.
///
/// Every variant carries enough structure for the UI to decide what to show;
/// `Display` yields the user-facing message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The backend answered with a non-2xx status
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
        /// Parsed error body, when it was JSON
        data: Option<Value>,
    },

    /// No response was received
    #[error("{message}")]
    Unreachable { message: String },

    /// The session could not be recovered; the user has been signed out
    #[error("Session expired. Please login again.")]
    SessionExpired,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Builds an `Api` error from a response status and raw body.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let parsed = ApiErrorBody::parse(body);
        GatewayError::Api {
            status,
            message: parsed.message_or_default(),
            code: parsed.code,
            data: parsed.data,
        }
    }

    pub fn unreachable() -> Self {
        GatewayError::Unreachable {
            message: NETWORK_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Unreachable { .. } => ErrorKind::Unreachable,
            GatewayError::SessionExpired => ErrorKind::SessionExpired,
            GatewayError::Cancelled => ErrorKind::Cancelled,
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::Api { .. }
            | GatewayError::InvalidResponse(_)
            | GatewayError::Internal(_) => ErrorKind::Unknown,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Machine-readable code from the error body, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            GatewayError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::SessionExpired => GatewayError::SessionExpired,
            AuthError::Unreachable { message } => GatewayError::Unreachable { message },
            AuthError::Validation(message) => GatewayError::Validation(message),
            AuthError::InvalidCredentials { message } => GatewayError::Api {
                status: 401,
                message,
                code: None,
                data: None,
            },
            AuthError::AccountInactive { message } => GatewayError::Api {
                status: 403,
                message,
                code: None,
                data: None,
            },
            AuthError::Backend {
                status,
                code,
                message,
            } => GatewayError::Api {
                status,
                message,
                code,
                data: None,
            },
            AuthError::InvalidResponse(message) => GatewayError::InvalidResponse(message),
            AuthError::Storage(message) | AuthError::Internal(message) => {
                GatewayError::Internal(message)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
