//! Transport Gateway
//!
//! Every data request passes through [`Gateway::request`], which:
//!
//! - resolves the path against the configured base URL
//! - attaches `Accept: application/json` and the current bearer token
//! - on a 401 asks the session store for a fresh token and re-issues the
//!   request exactly once
//! - normalizes every failure into a [`GatewayError`]
//!
//! The gateway never writes session state itself. It only reads the token and
//! signals refresh or expiry to the [`SessionStore`].

use crate::error::{GatewayError, Result};
use crate::options::{RequestBody, RequestOptions};
use bridge_traits::http::{
    HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartForm, ACCEPT, APPLICATION_JSON,
};
use bytes::Bytes;
use core_auth::SessionStore;
use core_runtime::config::{ApiBaseUrl, CoreConfig};
use core_runtime::events::{EventBus, GatewayEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

/// Successful (2xx) response.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl GatewayResponse {
    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

impl From<HttpResponse> for GatewayResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            body: response.body,
        }
    }
}

/// HTTP layer for all authenticated data requests.
///
/// Cheap to clone; clones share the HTTP client and session.
///
/// # Example
///
/// ```no_run
/// use core_gateway::{Gateway, RequestOptions};
/// use core_auth::SessionStore;
/// use core_runtime::CoreConfig;
/// use serde_json::Value;
///
/// # async fn example(config: CoreConfig, session: SessionStore) -> core_gateway::Result<()> {
/// let gateway = Gateway::new(&config, session);
///
/// let requests: Value = gateway
///     .get_with("/admin/supply-requests", RequestOptions::new().query("status", "pending"))
///     .await?
///     .json()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Gateway {
    http_client: Arc<dyn HttpClient>,
    session: SessionStore,
    base_url: ApiBaseUrl,
    event_bus: EventBus,
    request_timeout: Duration,
}

impl Gateway {
    /// Creates a gateway bound to `session`. Events go to the session's bus.
    pub fn new(config: &CoreConfig, session: SessionStore) -> Self {
        Self {
            http_client: Arc::clone(&config.http_client),
            event_bus: session.event_bus().clone(),
            session,
            base_url: config.api_base_url.clone(),
            request_timeout: config.request_timeout,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Issues a request relative to the API base URL.
    ///
    /// # Errors
    ///
    /// - `Api` for non-2xx responses, including a 401 after the retry
    /// - `Unreachable` when no response was received
    /// - `SessionExpired` when a 401 could not be recovered by refreshing;
    ///   the session has been cleared by then
    /// - `Cancelled` when the options' cancel token fired first
    #[instrument(
        skip(self, body, options),
        fields(method = %method, request_id = %Uuid::new_v4())
    )]
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<GatewayResponse> {
        let result = match options.cancel_token.clone() {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Request cancelled by caller");
                        Err(GatewayError::Cancelled)
                    }
                    result = self.execute(method, path, &body, &options) => result,
                }
            }
            None => self.execute(method, path, &body, &options).await,
        };

        if let Err(e) = &result {
            self.event_bus.emit_gateway(GatewayEvent::RequestFailed {
                method: method.to_string(),
                path: path.to_string(),
                status: e.status(),
                kind: e.kind().to_string(),
            });
        }
        result
    }

    pub async fn get(&self, path: &str) -> Result<GatewayResponse> {
        self.get_with(path, RequestOptions::default()).await
    }

    pub async fn get_with(&self, path: &str, options: RequestOptions) -> Result<GatewayResponse> {
        self.request(HttpMethod::Get, path, RequestBody::Empty, options)
            .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<GatewayResponse> {
        self.request(
            HttpMethod::Post,
            path,
            RequestBody::json(body)?,
            RequestOptions::default(),
        )
        .await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<GatewayResponse> {
        self.request(
            HttpMethod::Put,
            path,
            RequestBody::json(body)?,
            RequestOptions::default(),
        )
        .await
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<GatewayResponse> {
        self.request(
            HttpMethod::Patch,
            path,
            RequestBody::json(body)?,
            RequestOptions::default(),
        )
        .await
    }

    pub async fn delete(&self, path: &str) -> Result<GatewayResponse> {
        self.request(
            HttpMethod::Delete,
            path,
            RequestBody::Empty,
            RequestOptions::default(),
        )
        .await
    }

    /// Posts a multipart form. No `Content-Type` is declared here; the
    /// transport sets it together with the boundary.
    pub async fn post_multipart(
        &self,
        path: &str,
        form: MultipartForm,
    ) -> Result<GatewayResponse> {
        self.request(
            HttpMethod::Post,
            path,
            RequestBody::Multipart(form),
            RequestOptions::default(),
        )
        .await
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: &RequestBody,
        options: &RequestOptions,
    ) -> Result<GatewayResponse> {
        let url = self.build_url(path, &options.query)?;

        let bearer = self.session.bearer();
        let request = self.build_request(method, &url, body, options, bearer.token())?;
        let response = self.send(request).await?;

        if response.status != 401 {
            return finish(response);
        }

        info!(path, "Request unauthorized, refreshing access token");
        let fresh = match self.session.refresh_after_rejection(&bearer).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.session
                    .notify_session_expired(&bearer, Some(path))
                    .await;
                return Err(e.into());
            }
        };

        let retry = self.build_request(method, &url, body, options, Some(&fresh))?;
        let response = self.send(retry).await?;
        self.event_bus.emit_gateway(GatewayEvent::RequestRetried {
            method: method.to_string(),
            path: path.to_string(),
        });
        debug!(status = response.status, "Retried request completed");

        finish(response)
    }

    fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<String> {
        let endpoint = self.base_url.endpoint(path);
        if query.is_empty() {
            return Ok(endpoint);
        }

        let mut url = Url::parse(&endpoint)
            .map_err(|e| GatewayError::Validation(format!("Invalid request path '{}': {}", path, e)))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url.into())
    }

    fn build_request(
        &self,
        method: HttpMethod,
        url: &str,
        body: &RequestBody,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(method, url)
            .header(ACCEPT, APPLICATION_JSON)
            .timeout(options.timeout.unwrap_or(self.request_timeout));

        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            request = request.bearer_token(token);
        }

        body.apply(request)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await.map_err(|e| {
            if e.is_transport() {
                warn!(error = %e, "No response from backend");
                GatewayError::unreachable()
            } else {
                warn!(error = %e, "Transport rejected request");
                GatewayError::Internal(e.to_string())
            }
        })?;

        debug!(status = response.status, "Response received");
        Ok(response)
    }
}

fn finish(response: HttpResponse) -> Result<GatewayResponse> {
    if response.is_success() {
        Ok(response.into())
    } else {
        let error = GatewayError::from_response(response.status, &response.body);
        debug!(status = response.status, message = %error, "Backend returned an error");
        Err(error)
    }
}
