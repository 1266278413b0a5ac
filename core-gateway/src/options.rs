//! Request bodies and per-request options

use crate::error::{GatewayError, Result};
use bridge_traits::http::{HttpRequest, MultipartForm, CONTENT_TYPE};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Payload of a gateway request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Sent as `application/json`
    Json(Value),
    /// Opaque bytes with a caller-chosen content type
    Raw {
        bytes: Bytes,
        content_type: Option<String>,
    },
    /// The transport picks the content type and boundary
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Serializes `value` into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| GatewayError::Internal(format!("Failed to serialize body: {}", e)))
    }

    pub fn raw(bytes: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        RequestBody::Raw {
            bytes: bytes.into(),
            content_type: Some(content_type.into()),
        }
    }

    pub(crate) fn apply(&self, request: HttpRequest) -> Result<HttpRequest> {
        match self {
            RequestBody::Empty => Ok(request),
            RequestBody::Json(value) => request
                .json(value)
                .map_err(|e| GatewayError::Internal(e.to_string())),
            RequestBody::Raw {
                bytes,
                content_type,
            } => {
                let request = request.body(bytes.clone());
                Ok(match content_type {
                    Some(content_type) => request.header(CONTENT_TYPE, content_type.as_str()),
                    None => request,
                })
            }
            RequestBody::Multipart(form) => Ok(request.multipart(form.clone())),
        }
    }
}

/// Per-request knobs.
///
/// ```
/// use core_gateway::RequestOptions;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// let cancel = CancellationToken::new();
/// let options = RequestOptions::new()
///     .query("status", "pending")
///     .header("X-Store-Id", "4")
///     .timeout(Duration::from_secs(5))
///     .cancel_token(cancel.clone());
/// assert_eq!(options.query.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers; `Authorization` is always set by the gateway
    pub headers: Vec<(String, String)>,
    /// Query parameters appended in order
    pub query: Vec<(String, String)>,
    /// Overrides the configured request timeout
    pub timeout: Option<Duration>,
    pub cancel_token: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}
