//! # Core Configuration Module
//!
//! Provides configuration management for the MyDuka client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the bridges and settings the session store and the
//! transport gateway need. It enforces fail-fast validation so a missing
//! bridge or a malformed base URL is reported before any request is made.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Transport for every backend call (desktop default: reqwest)
//! - `SecureStore` - Token and profile persistence (desktop default: OS keychain)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! both bridges are injected automatically if not provided.
//!
//! ## Environment
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `MYDUKA_API_BASE_URL` | Backend base URL | `http://localhost:5000/api` |
//! | `MYDUKA_REQUEST_TIMEOUT_SECS` | Per-request timeout | 30 |
//! | `MYDUKA_REFRESH_TIMEOUT_SECS` | Token refresh timeout | 15 |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::from_env()?
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("ftp://example.com")
//!     .build()
//!     .expect("Should fail - unsupported scheme");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{HttpClient, SecureStore};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const ENV_API_BASE_URL: &str = "MYDUKA_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "MYDUKA_REQUEST_TIMEOUT_SECS";
pub const ENV_REFRESH_TIMEOUT_SECS: &str = "MYDUKA_REFRESH_TIMEOUT_SECS";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

const MAX_TIMEOUT: Duration = Duration::from_secs(600);

/// Validated backend base URL.
///
/// Endpoint paths are appended to the base path, so `/auth/login` against
/// `http://localhost:5000/api` resolves to `http://localhost:5000/api/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBaseUrl(Url);

impl ApiBaseUrl {
    /// Parses and validates a base URL.
    ///
    /// Only `http` and `https` are accepted; query strings and fragments are
    /// rejected because endpoint paths are appended verbatim.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidBaseUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(invalid("URL must include a host"));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query strings and fragments are not allowed"));
        }

        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str().trim_end_matches('/')
    }

    /// Joins an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.as_str(), path.trim_start_matches('/'))
    }
}

impl fmt::Display for ApiBaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core configuration for the MyDuka client core.
///
/// This struct holds all dependencies and settings required to initialize
/// the session store and the gateway. Use [`CoreConfigBuilder`] to construct
/// instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Backend base URL every endpoint path is joined onto
    pub api_base_url: ApiBaseUrl,

    /// Transport used by the session store and the gateway
    pub http_client: Arc<dyn HttpClient>,

    /// Durable storage for tokens and the cached profile
    pub secure_store: Arc<dyn SecureStore>,

    /// Default timeout applied to gateway requests
    pub request_timeout: Duration,

    /// Timeout applied to `/auth/refresh` calls
    pub refresh_timeout: Duration,

    /// Capacity of the event bus ring buffer
    pub event_buffer_size: usize,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("request_timeout", &self.request_timeout)
            .field("refresh_timeout", &self.refresh_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Creates a builder seeded from the `MYDUKA_*` environment variables.
    ///
    /// Unset variables fall back to the defaults; set but unparsable values
    /// are reported immediately.
    pub fn from_env() -> Result<CoreConfigBuilder> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<CoreConfigBuilder>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = CoreConfigBuilder::default();

        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            builder = builder.api_base_url(url);
        }
        if let Some(secs) = parse_secs(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            builder = builder.request_timeout(secs);
        }
        if let Some(secs) = parse_secs(&lookup, ENV_REFRESH_TIMEOUT_SECS)? {
            builder = builder.refresh_timeout(secs);
        }

        Ok(builder)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Timeouts are non-zero and at most ten minutes
    /// - The event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        validate_timeout("Request timeout", self.request_timeout)?;
        validate_timeout("Refresh timeout", self.refresh_timeout)?;

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse::<u64>()
        .map(|secs| Some(Duration::from_secs(secs)))
        .map_err(|_| {
            Error::Config(format!(
                "{} must be a whole number of seconds, got '{}'",
                key, raw
            ))
        })
}

fn validate_timeout(label: &str, timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(Error::Config(format!("{} must be greater than 0", label)));
    }
    if timeout > MAX_TIMEOUT {
        return Err(Error::Config(format!(
            "{} exceeds maximum of {} seconds",
            label,
            MAX_TIMEOUT.as_secs()
        )));
    }
    Ok(())
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "HttpClient implementation is required to reach the backend. \
         Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
         Other hosts: inject a platform HTTP client.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(capability_missing(
        "SecureStore",
        "SecureStore implementation is required for session persistence. \
         Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore. \
         Other hosts: inject platform secure storage.",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    request_timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the backend base URL (e.g. `https://api.myduka.co/api`).
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - The base URL does not parse or uses an unsupported scheme
    /// - A bridge is missing and no desktop default is available
    /// - Timeouts or buffer sizes are out of range
    pub fn build(self) -> Result<CoreConfig> {
        let api_base_url = ApiBaseUrl::parse(
            self.api_base_url
                .as_deref()
                .unwrap_or(DEFAULT_API_BASE_URL),
        )?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let config = CoreConfig {
            api_base_url,
            http_client,
            secure_store,
            request_timeout,
            refresh_timeout: self.refresh_timeout.unwrap_or(DEFAULT_REFRESH_TIMEOUT),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{HttpRequest, HttpResponse};
    use std::collections::HashMap;

    struct NullHttpClient;

    #[async_trait]
    impl HttpClient for NullHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse::new(204, Vec::new()))
        }
    }

    struct NullSecureStore;

    #[async_trait]
    impl SecureStore for NullSecureStore {
        async fn set_secret(&self, _key: &str, _value: &[u8]) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_secret(&self, _key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn delete_secret(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn with_bridges(builder: CoreConfigBuilder) -> CoreConfigBuilder {
        builder
            .http_client(Arc::new(NullHttpClient))
            .secure_store(Arc::new(NullSecureStore))
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = with_bridges(CoreConfig::builder()).build().unwrap();

        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.refresh_timeout, DEFAULT_REFRESH_TIMEOUT);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_endpoint_join() {
        let base = ApiBaseUrl::parse("http://localhost:5000/api").unwrap();
        assert_eq!(
            base.endpoint("/auth/login"),
            "http://localhost:5000/api/auth/login"
        );
        assert_eq!(base.endpoint("auth/me"), "http://localhost:5000/api/auth/me");

        let trailing = ApiBaseUrl::parse("https://api.myduka.co/").unwrap();
        assert_eq!(
            trailing.endpoint("/inventory/add_stock"),
            "https://api.myduka.co/inventory/add_stock"
        );
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let err = ApiBaseUrl::parse("ftp://files.myduka.co").unwrap_err();
        assert!(matches!(err, Error::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_rejects_query_in_base() {
        let err = ApiBaseUrl::parse("http://localhost:5000/api?x=1").unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[test]
    fn test_rejects_garbage_base() {
        assert!(ApiBaseUrl::parse("not a url").is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = with_bridges(CoreConfig::builder())
            .request_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Request timeout"));
    }

    #[test]
    fn test_rejects_excessive_refresh_timeout() {
        let err = with_bridges(CoreConfig::builder())
            .refresh_timeout(Duration::from_secs(3600))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Refresh timeout"));
    }

    #[test]
    fn test_rejects_empty_event_buffer() {
        let result = with_bridges(CoreConfig::builder())
            .event_buffer_size(0)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let builder = CoreConfig::from_lookup(lookup_from(&[
            (ENV_API_BASE_URL, "https://duka.example.com/api/"),
            (ENV_REQUEST_TIMEOUT_SECS, "45"),
            (ENV_REFRESH_TIMEOUT_SECS, " 5 "),
        ]))
        .unwrap();

        let config = with_bridges(builder).build().unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://duka.example.com/api");
        assert_eq!(config.request_timeout, Duration::from_secs(45));
        assert_eq!(config.refresh_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_lookup_blank_values_use_defaults() {
        let builder = CoreConfig::from_lookup(lookup_from(&[
            (ENV_API_BASE_URL, "  "),
            (ENV_REQUEST_TIMEOUT_SECS, ""),
        ]))
        .unwrap();

        let config = with_bridges(builder).build().unwrap();
        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_from_lookup_rejects_non_numeric_timeout() {
        let err = CoreConfig::from_lookup(lookup_from(&[(ENV_REQUEST_TIMEOUT_SECS, "soon")]))
            .err()
            .unwrap();
        assert!(err.to_string().contains(ENV_REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = with_bridges(CoreConfig::builder()).build().unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("HttpClient { ... }"));
        assert!(rendered.contains("localhost:5000"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_secure_store_is_reported() {
        let err = CoreConfig::builder()
            .http_client(Arc::new(NullHttpClient))
            .build()
            .unwrap_err();
        match err {
            Error::CapabilityMissing { capability, .. } => assert_eq!(capability, "SecureStore"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_is_reported() {
        let err = CoreConfig::builder()
            .secure_store(Arc::new(NullSecureStore))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityMissing { ref capability, .. } if capability == "HttpClient"));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder().build().unwrap();
        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_BASE_URL);
    }
}
