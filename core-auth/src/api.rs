//! Auth Endpoint Client
//!
//! Thin typed wrapper over the `/auth/*` backend routes. Every call goes
//! straight to the `HttpClient`; session bookkeeping, refresh deduplication
//! and persistence live in [`SessionStore`](crate::SessionStore).

use crate::error::{ApiErrorBody, AuthError, Result};
use crate::types::{Credentials, RegistrationForm, TokenPair, UserProfile};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, ACCEPT, APPLICATION_JSON};
use core_runtime::config::{ApiBaseUrl, CoreConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const ME_PATH: &str = "/auth/me";
pub const REGISTER_PATH: &str = "/auth/register";
pub const REQUEST_PASSWORD_RESET_PATH: &str = "/auth/request-password-reset";
pub const RESET_PASSWORD_PATH: &str = "/auth/reset-password";

/// Tokens and profile returned by a successful login.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub tokens: TokenPair,
    pub user: UserProfile,
}

/// Result of accepting an invitation.
#[derive(Debug, Clone)]
pub struct Registration {
    /// Present when the backend signs the new user in immediately
    pub tokens: Option<TokenPair>,
    pub user: UserProfile,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    user: UserProfile,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MeResponse {
    Wrapped { user: UserProfile },
    Bare(UserProfile),
}

#[derive(Deserialize)]
struct RegisterResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    user: UserProfile,
}

#[derive(Deserialize, Default)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Client for the authentication endpoints.
#[derive(Clone)]
pub struct AuthApi {
    http_client: Arc<dyn HttpClient>,
    base_url: ApiBaseUrl,
    request_timeout: Duration,
    refresh_timeout: Duration,
}

impl AuthApi {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            http_client: Arc::clone(&config.http_client),
            base_url: config.api_base_url.clone(),
            request_timeout: config.request_timeout,
            refresh_timeout: config.refresh_timeout,
        }
    }

    /// `POST /auth/login`.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` on 401
    /// - `AccountInactive` on 403
    /// - `Unreachable` when no response was received
    /// - `Backend` for any other non-2xx status
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthGrant> {
        let request = self.post(LOGIN_PATH, credentials, self.request_timeout)?;
        let response = self.send(request).await?;

        if !response.is_success() {
            let body = ApiErrorBody::parse(&response.body);
            return Err(match response.status {
                401 => AuthError::InvalidCredentials {
                    message: body.message_or("Invalid email or password"),
                },
                403 => AuthError::AccountInactive {
                    message: body.message_or("Your account is inactive"),
                },
                status => backend_error(status, body),
            });
        }

        let parsed: LoginResponse = parse_body(&response)?;
        let tokens = non_empty_pair(parsed.access_token, parsed.refresh_token)?;

        Ok(AuthGrant {
            tokens,
            user: parsed.user,
        })
    }

    /// `POST /auth/refresh` with the stored refresh token.
    ///
    /// Returns the new access token. The response must be an object carrying
    /// `access_token`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let request = self.post(
            REFRESH_PATH,
            &json!({ "refresh_token": refresh_token }),
            self.refresh_timeout,
        )?;
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(backend_error(
                response.status,
                ApiErrorBody::parse(&response.body),
            ));
        }

        let parsed: RefreshResponse = parse_body(&response)?;
        if parsed.access_token.is_empty() {
            return Err(AuthError::InvalidResponse(
                "No access token received".to_string(),
            ));
        }
        Ok(parsed.access_token)
    }

    /// `GET /auth/me` with the given bearer token.
    ///
    /// Accepts both `{ "user": {...} }` and a bare profile object.
    pub async fn me(&self, access_token: &str) -> Result<UserProfile> {
        let request = HttpRequest::new(HttpMethod::Get, self.base_url.endpoint(ME_PATH))
            .header(ACCEPT, APPLICATION_JSON)
            .bearer_token(access_token)
            .timeout(self.request_timeout);
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(backend_error(
                response.status,
                ApiErrorBody::parse(&response.body),
            ));
        }

        match parse_body::<MeResponse>(&response)? {
            MeResponse::Wrapped { user } | MeResponse::Bare(user) => Ok(user),
        }
    }

    /// `POST /auth/register/:token`.
    pub async fn register(&self, token: &str, form: &RegistrationForm) -> Result<Registration> {
        let path = format!("{}/{}", REGISTER_PATH, encode_segment(token));
        let request = self.post(&path, form, self.request_timeout)?;
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(backend_error(
                response.status,
                ApiErrorBody::parse(&response.body),
            ));
        }

        let parsed: RegisterResponse = parse_body(&response)?;
        let tokens = match (parsed.access_token, parsed.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Some(TokenPair::new(access, refresh))
            }
            _ => None,
        };

        Ok(Registration {
            tokens,
            user: parsed.user,
        })
    }

    /// `POST /auth/request-password-reset`. Returns the backend message.
    pub async fn request_password_reset(&self, email: &str) -> Result<String> {
        let request = self.post(
            REQUEST_PASSWORD_RESET_PATH,
            &json!({ "email": email }),
            self.request_timeout,
        )?;
        self.send_for_message(request, "Password reset instructions sent")
            .await
    }

    /// `POST /auth/reset-password/:token`. Returns the backend message.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<String> {
        let path = format!("{}/{}", RESET_PASSWORD_PATH, encode_segment(token));
        let request = self.post(
            &path,
            &json!({ "new_password": new_password }),
            self.request_timeout,
        )?;
        self.send_for_message(request, "Password reset successfully")
            .await
    }

    fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
        timeout: Duration,
    ) -> Result<HttpRequest> {
        HttpRequest::new(HttpMethod::Post, self.base_url.endpoint(path))
            .header(ACCEPT, APPLICATION_JSON)
            .timeout(timeout)
            .json(body)
            .map_err(|e| AuthError::Internal(e.to_string()))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();

        let response = self.http_client.execute(request).await.map_err(|e| {
            warn!(method = %method, url = %url, error = %e, "Auth request failed without response");
            AuthError::transport(e)
        })?;

        debug!(method = %method, url = %url, status = response.status, "Auth request completed");
        Ok(response)
    }

    async fn send_for_message(&self, request: HttpRequest, fallback: &str) -> Result<String> {
        let response = self.send(request).await?;

        if !response.is_success() {
            return Err(backend_error(
                response.status,
                ApiErrorBody::parse(&response.body),
            ));
        }

        let parsed: MessageResponse = if response.body.is_empty() {
            MessageResponse::default()
        } else {
            parse_body(&response)?
        };
        Ok(parsed.message.unwrap_or_else(|| fallback.to_string()))
    }
}

fn backend_error(status: u16, body: ApiErrorBody) -> AuthError {
    AuthError::Backend {
        status,
        message: body.message_or_default(),
        code: body.code,
    }
}

fn parse_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    response
        .json()
        .map_err(|e| AuthError::InvalidResponse(e.to_string()))
}

fn non_empty_pair(access: String, refresh: String) -> Result<TokenPair> {
    if access.is_empty() || refresh.is_empty() {
        return Err(AuthError::InvalidResponse(
            "Login response is missing tokens".to_string(),
        ));
    }
    Ok(TokenPair::new(access, refresh))
}

fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
