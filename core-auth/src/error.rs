use bridge_traits::BridgeError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Message used when a request produced no response at all.
pub const NETWORK_ERROR_MESSAGE: &str = "network error";

/// Fallback when a backend error body carries neither `message` nor `error`.
pub const DEFAULT_ERROR_MESSAGE: &str = "An unexpected error occurred";

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please login again.";

/// Classification shared by session and gateway errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidCredentials,
    AccountInactive,
    SessionExpired,
    Unreachable,
    /// Malformed local input; never reaches the network
    Validation,
    Cancelled,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidCredentials => "invalid_credentials",
            ErrorKind::AccountInactive => "account_inactive",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::Validation => "validation",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("{message}")]
    InvalidCredentials { message: String },

    #[error("{message}")]
    AccountInactive { message: String },

    #[error("Session expired. Please login again.")]
    SessionExpired,

    #[error("{message}")]
    Unreachable { message: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Backend error ({status}): {message}")]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Secure storage error: {0}")]
    Storage(String),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            AuthError::AccountInactive { .. } => ErrorKind::AccountInactive,
            AuthError::SessionExpired => ErrorKind::SessionExpired,
            AuthError::Unreachable { .. } => ErrorKind::Unreachable,
            AuthError::Validation(_) => ErrorKind::Validation,
            AuthError::Backend { .. }
            | AuthError::Storage(_)
            | AuthError::InvalidResponse(_)
            | AuthError::Internal(_) => ErrorKind::Unknown,
        }
    }

    /// HTTP status behind the error, when the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::InvalidCredentials { .. } => Some(401),
            AuthError::AccountInactive { .. } => Some(403),
            AuthError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether repeating the same call can succeed without user changes.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::Unreachable { .. } | AuthError::Storage(_) | AuthError::Internal(_)
        ) || matches!(self, AuthError::Backend { status, .. } if *status >= 500)
    }

    /// Maps a transport failure. Anything that produced no response is
    /// `Unreachable`.
    pub fn transport(err: BridgeError) -> Self {
        if err.is_transport() {
            AuthError::Unreachable {
                message: NETWORK_ERROR_MESSAGE.to_string(),
            }
        } else {
            AuthError::Internal(err.to_string())
        }
    }

    pub fn storage(err: BridgeError) -> Self {
        AuthError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// Normalized view of a backend error body.
///
/// The backend reports failures as JSON objects carrying `message` (or the
/// older `error`) and optionally a machine-readable `code`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
    /// The parsed body, when it was JSON
    pub data: Option<Value>,
}

impl ApiErrorBody {
    pub fn parse(body: &[u8]) -> Self {
        let data: Option<Value> = serde_json::from_slice(body).ok();
        let field = |name: &str| {
            data.as_ref()
                .and_then(|value| value.get(name))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            message: field("message").or_else(|| field("error")),
            code: field("code"),
            data,
        }
    }

    pub fn message_or_default(&self) -> String {
        self.message_or(DEFAULT_ERROR_MESSAGE)
    }

    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_prefers_message_over_error() {
        let body = ApiErrorBody::parse(br#"{"message":"Store not found","error":"x","code":"NOT_FOUND"}"#);
        assert_eq!(body.message.as_deref(), Some("Store not found"));
        assert_eq!(body.code.as_deref(), Some("NOT_FOUND"));
        assert!(body.data.is_some());
    }

    #[test]
    fn test_error_body_falls_back_to_error_field() {
        let body = ApiErrorBody::parse(br#"{"error":"Forbidden"}"#);
        assert_eq!(body.message_or_default(), "Forbidden");
        assert_eq!(body.code, None);
    }

    #[test]
    fn test_error_body_default_message_for_non_json() {
        let body = ApiErrorBody::parse(b"<html>Bad Gateway</html>");
        assert_eq!(body.message_or_default(), DEFAULT_ERROR_MESSAGE);
        assert!(body.data.is_none());
    }

    #[test]
    fn test_empty_message_is_ignored() {
        let body = ApiErrorBody::parse(br#"{"message":"  ","error":"Bad input"}"#);
        assert_eq!(body.message_or_default(), "Bad input");
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(AuthError::SessionExpired.kind(), ErrorKind::SessionExpired);
        assert_eq!(
            AuthError::Backend {
                status: 500,
                code: None,
                message: "boom".into()
            }
            .kind(),
            ErrorKind::Unknown
        );
        assert_eq!(
            AuthError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_transport_mapping() {
        let err = AuthError::transport(BridgeError::Network("refused".into()));
        assert_eq!(err.kind(), ErrorKind::Unreachable);
        assert_eq!(err.to_string(), NETWORK_ERROR_MESSAGE);
        assert!(err.is_recoverable());

        let err = AuthError::transport(BridgeError::OperationFailed("bad header".into()));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn test_session_expired_message() {
        assert_eq!(AuthError::SessionExpired.to_string(), SESSION_EXPIRED_MESSAGE);
    }
}
