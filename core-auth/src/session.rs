//! Session Store
//!
//! Owns the in-memory session (tokens, profile, [`AuthState`]) and keeps it
//! in step with durable storage.
//!
//! ## Concurrency
//!
//! - Reads (`access_token`, `current_user`, `state`) are synchronous snapshots
//! - Mutations that touch storage are serialized through one async lock
//! - At most one `/auth/refresh` call is in flight; concurrent callers await
//!   the same shared result
//! - Every login or logout bumps a session epoch. A refresh or validation
//!   that finishes after the epoch moved is discarded instead of resurrecting
//!   a session that was signed out
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{Credentials, SessionStore};
//! use core_runtime::{CoreConfig, EventBus};
//!
//! # async fn example(config: CoreConfig) -> core_auth::Result<()> {
//! let events = EventBus::new(config.event_buffer_size);
//! let session = SessionStore::new(&config, events);
//!
//! let user = session
//!     .login(Credentials::new("clerk@duka.co", "correct-horse"))
//!     .await?;
//! println!("Go to {}", user.role.home_route());
//!
//! session.logout().await;
//! # Ok(())
//! # }
//! ```

use crate::api::AuthApi;
use crate::error::{AuthError, Result, NETWORK_ERROR_MESSAGE};
use crate::token_store::TokenStore;
use crate::types::{
    is_valid_email, AuthState, Credentials, RegistrationForm, Role, TokenPair, UserProfile,
    MIN_PASSWORD_LENGTH,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, EventBus};
use core_runtime::logging::redact_if_sensitive;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

type RefreshFuture = Shared<BoxFuture<'static, Result<String>>>;

/// Access token handed to an outgoing request, tied to the session that
/// issued it.
///
/// Pass it back to [`SessionStore::refresh_after_rejection`] and
/// [`SessionStore::notify_session_expired`] so a late failure can only end
/// the session it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Bearer {
    token: Option<String>,
    epoch: u64,
}

impl Bearer {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

impl std::fmt::Debug for Bearer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bearer")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    tokens: Option<TokenPair>,
    user: Option<UserProfile>,
    auth_state: AuthState,
    epoch: u64,
}

struct Inner {
    api: AuthApi,
    token_store: TokenStore,
    event_bus: EventBus,
    refresh_timeout: Duration,
    state: RwLock<SessionState>,
    /// Serializes storage mutations together with the epoch check
    write_lock: tokio::sync::Mutex<()>,
    pending_refresh: Mutex<Option<RefreshFuture>>,
}

/// Single owner of the authenticated session.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    pub fn new(config: &CoreConfig, event_bus: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                api: AuthApi::new(config),
                token_store: TokenStore::new(Arc::clone(&config.secure_store)),
                event_bus,
                refresh_timeout: config.refresh_timeout,
                state: RwLock::new(SessionState::default()),
                write_lock: tokio::sync::Mutex::new(()),
                pending_refresh: Mutex::new(None),
            }),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.read().auth_state
    }

    pub fn is_authenticated(&self) -> bool {
        let state = self.inner.state.read();
        state.auth_state.is_authenticated() && state.tokens.is_some()
    }

    /// Current access token, without any network activity.
    ///
    /// `None` while restored tokens still await validation of their profile.
    pub fn access_token(&self) -> Option<String> {
        self.bearer().token
    }

    /// Current access token together with the session it belongs to.
    pub fn bearer(&self) -> Bearer {
        let state = self.inner.state.read();
        Bearer {
            token: state
                .tokens
                .as_ref()
                .filter(|_| state.user.is_some())
                .map(|t| t.access_token.clone()),
            epoch: state.epoch,
        }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.state.read().user.clone()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.inner
            .state
            .read()
            .user
            .as_ref()
            .map_or(false, |u| u.has_role(role))
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.inner
            .state
            .read()
            .user
            .as_ref()
            .map_or(false, |u| roles.contains(&u.role))
    }

    /// Signs in with email and password.
    ///
    /// Tokens and profile are persisted before this returns. If the caller
    /// stops awaiting after the backend accepted the credentials, the session
    /// is still committed.
    ///
    /// # Errors
    ///
    /// - `Validation` for missing or malformed input; no request is sent
    /// - `InvalidCredentials` / `AccountInactive` from the backend
    /// - `Unreachable` when the backend could not be reached
    /// - `Storage` when the session could not be persisted; nothing is kept
    #[instrument(skip(self, credentials), fields(email = %redact_if_sensitive("email", &credentials.email)))]
    pub async fn login(&self, credentials: Credentials) -> Result<UserProfile> {
        credentials.validate()?;

        info!("Signing in");
        let grant = match self.inner.api.login(&credentials).await {
            Ok(grant) => grant,
            Err(e) => {
                warn!(kind = %e.kind(), "Sign-in rejected");
                self.inner.emit_auth_error(&e);
                return Err(e);
            }
        };

        let user = grant.user.clone();
        self.commit_detached(grant.tokens, grant.user).await?;

        info!(user_id = %user.id, role = %user.role, "Sign-in completed");
        Ok(user)
    }

    /// Ends the session locally. Never fails.
    ///
    /// Emits `SignedOut` only when a session existed.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.inner.logout().await;
    }

    /// Obtains a new access token using the stored refresh token.
    ///
    /// Concurrent callers share a single backend request. On any failure the
    /// session is cleared and `SessionExpired` is returned.
    pub async fn refresh(&self) -> Result<String> {
        Inner::refresh(&self.inner).await
    }

    /// Returns a token to retry with after `rejected` got a 401.
    ///
    /// If another caller already replaced the rejected token, or a new
    /// session was signed in meanwhile, its token is returned without a new
    /// refresh.
    pub async fn refresh_after_rejection(&self, rejected: &Bearer) -> Result<String> {
        if let Some(current) = self.replacement_for(rejected) {
            debug!("Access token already replaced, reusing it");
            return Ok(current);
        }

        match self.refresh().await {
            Ok(token) => Ok(token),
            Err(e) => match self.replacement_for(rejected) {
                Some(current) => {
                    debug!("Session replaced during refresh, reusing its token");
                    Ok(current)
                }
                None => Err(e),
            },
        }
    }

    fn replacement_for(&self, rejected: &Bearer) -> Option<String> {
        let current = self.bearer();
        let token = current.token?;
        if current.epoch != rejected.epoch || rejected.token.as_deref() != Some(token.as_str()) {
            Some(token)
        } else {
            None
        }
    }

    /// Loads the persisted session into memory without contacting the backend.
    ///
    /// Returns the cached profile when both tokens and profile were stored.
    /// Tokens without a readable profile are kept pending: the state stays
    /// `SignedOut` and [`access_token`](Self::access_token) stays `None` until
    /// [`validate`](Self::validate) succeeds.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Option<UserProfile> {
        let _guard = self.inner.write_lock.lock().await;

        let stored = match self.inner.token_store.load().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                return None;
            }
        };

        let mut state = self.inner.state.write();
        state.auth_state = if stored.is_complete() {
            AuthState::SignedIn
        } else {
            AuthState::SignedOut
        };
        state.tokens = stored.tokens;
        state.user = if state.tokens.is_some() {
            stored.user
        } else {
            None
        };
        state.epoch += 1;

        debug!(state = %state.auth_state, "Session restored from storage");
        if state.auth_state == AuthState::SignedIn {
            state.user.clone()
        } else {
            None
        }
    }

    /// Startup entry point: restore, then confirm the session with the backend.
    ///
    /// Returns the confirmed profile, or `None` when signed out.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Option<UserProfile> {
        self.restore().await;

        if self.inner.state.read().tokens.is_none() {
            debug!("No stored session");
            return None;
        }

        match self.validate().await {
            Ok(user) => Some(user),
            Err(e) => {
                info!(kind = %e.kind(), "Stored session could not be confirmed");
                None
            }
        }
    }

    /// Confirms the current token against `GET /auth/me` and refreshes the
    /// cached profile.
    ///
    /// A 401 triggers one refresh and one retry. Any final failure clears the
    /// session.
    #[instrument(skip(self))]
    pub async fn validate(&self) -> Result<UserProfile> {
        let (token, epoch) = {
            let mut state = self.inner.state.write();
            let token = state.tokens.as_ref().map(|t| t.access_token.clone());
            if token.is_some() {
                state.auth_state = AuthState::Validating;
            }
            (token, state.epoch)
        };

        let Some(token) = token else {
            self.inner.logout_if_current(epoch).await;
            return Err(AuthError::SessionExpired);
        };

        let result = match self.inner.api.me(&token).await {
            Err(e) if e.status() == Some(401) => {
                debug!("Access token rejected during validation, refreshing");
                let rejected = Bearer {
                    token: Some(token.clone()),
                    epoch,
                };
                match self.refresh_after_rejection(&rejected).await {
                    Ok(fresh) => self.inner.api.me(&fresh).await,
                    Err(e) => Err(e),
                }
            }
            other => other,
        };

        let user = match result {
            Ok(user) => user,
            Err(e) => {
                warn!(kind = %e.kind(), "Session validation failed");
                self.inner.logout_if_current(epoch).await;
                return Err(match e.status() {
                    Some(401) => AuthError::SessionExpired,
                    _ => e,
                });
            }
        };

        let _guard = self.inner.write_lock.lock().await;
        if self.inner.state.read().epoch != epoch {
            debug!("Session changed during validation, discarding result");
            return Err(AuthError::SessionExpired);
        }

        if let Err(e) = self.inner.token_store.store_user(&user).await {
            warn!(error = %e, "Failed to cache validated profile");
        }

        {
            let mut state = self.inner.state.write();
            state.user = Some(user.clone());
            state.auth_state = AuthState::SignedIn;
        }
        self.inner.event_bus.emit_auth(AuthEvent::SignedIn {
            user_id: user.id.clone(),
            role: user.role.to_string(),
        });

        info!(user_id = %user.id, "Session validated");
        Ok(user)
    }

    /// Clears the session after a request made with `rejected` could not be
    /// recovered, remembering where the user was.
    ///
    /// A session signed in after `rejected` was issued is left alone. Returns
    /// whether the session ended.
    pub async fn notify_session_expired(
        &self,
        rejected: &Bearer,
        return_to: Option<&str>,
    ) -> bool {
        if !self.inner.expire(rejected.epoch).await {
            debug!("Newer session in place, ignoring expiry");
            return false;
        }
        self.inner.event_bus.emit_auth(AuthEvent::SessionExpired {
            return_to: return_to.map(str::to_string),
        });
        true
    }

    /// Accepts an invitation and creates the account.
    ///
    /// When the backend returns tokens together with the profile, the new user
    /// is signed in exactly as after [`login`](Self::login).
    #[instrument(skip_all, fields(email = %redact_if_sensitive("email", email)))]
    pub async fn complete_registration(
        &self,
        token: &str,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile> {
        let form = RegistrationForm::new(name, email, password);
        form.validate()?;
        if token.trim().is_empty() {
            return Err(AuthError::Validation(
                "Invitation token is required".to_string(),
            ));
        }

        let registration = self.inner.api.register(token.trim(), &form).await?;
        let user = registration.user.clone();

        match registration.tokens {
            Some(tokens) => {
                self.commit_detached(tokens, registration.user).await?;
                info!(user_id = %user.id, "Registration completed and signed in");
            }
            None => info!(user_id = %user.id, "Registration completed"),
        }
        Ok(user)
    }

    /// Asks the backend to email reset instructions. Returns its message.
    #[instrument(skip_all, fields(email = %redact_if_sensitive("email", email)))]
    pub async fn request_password_reset(&self, email: &str) -> Result<String> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }
        if !is_valid_email(email) {
            return Err(AuthError::Validation(
                "Please provide a valid email address".to_string(),
            ));
        }
        self.inner.api.request_password_reset(email).await
    }

    /// Sets a new password using an emailed reset token.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<String> {
        if token.trim().is_empty() {
            return Err(AuthError::Validation("Reset token is required".to_string()));
        }
        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        self.inner
            .api
            .reset_password(token.trim(), new_password)
            .await
    }

    /// Persists and publishes a new session on a task that outlives the caller.
    async fn commit_detached(&self, tokens: TokenPair, user: UserProfile) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        let result = tokio::spawn(async move { inner.commit_session(tokens, user).await })
            .await
            .map_err(|e| AuthError::Internal(format!("Session commit task failed: {}", e)))?;

        if let Err(e) = &result {
            self.inner.emit_auth_error(e);
        }
        result
    }
}

impl Inner {
    async fn commit_session(&self, tokens: TokenPair, user: UserProfile) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.token_store
            .store_session(&tokens, &user)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to persist session");
                e
            })?;

        {
            let mut state = self.state.write();
            state.tokens = Some(tokens);
            state.user = Some(user.clone());
            state.auth_state = AuthState::SignedIn;
            state.epoch += 1;
        }

        self.event_bus.emit_auth(AuthEvent::SignedIn {
            user_id: user.id,
            role: user.role.to_string(),
        });
        Ok(())
    }

    async fn logout(&self) {
        let _guard = self.write_lock.lock().await;
        self.clear_locked().await;
    }

    /// Logs out unless a login or logout already happened since `epoch`.
    async fn logout_if_current(&self, epoch: u64) {
        let _guard = self.write_lock.lock().await;
        if self.state.read().epoch != epoch {
            debug!("Session already replaced, skipping logout");
            return;
        }
        self.clear_locked().await;
    }

    /// Ends the session issued at `epoch`. A newer signed-in session is kept.
    async fn expire(&self, epoch: u64) -> bool {
        let _guard = self.write_lock.lock().await;
        let replaced = {
            let state = self.state.read();
            state.epoch != epoch && state.tokens.is_some() && state.user.is_some()
        };
        if replaced {
            return false;
        }
        self.clear_locked().await;
        true
    }

    /// Caller must hold `write_lock`.
    async fn clear_locked(&self) {
        let (had_session, user_id) = {
            let mut state = self.state.write();
            let had_session = state.tokens.is_some() || state.user.is_some();
            let user_id = state.user.take().map(|u| u.id);
            state.tokens = None;
            state.auth_state = AuthState::SignedOut;
            state.epoch += 1;
            (had_session, user_id)
        };

        if let Err(e) = self.token_store.clear().await {
            warn!(error = %e, "Failed to clear stored session");
        }

        if had_session {
            info!("Signed out");
            self.event_bus
                .emit_auth(AuthEvent::SignedOut { user_id });
        }
    }

    fn refresh(self: &Arc<Self>) -> RefreshFuture {
        let mut pending = self.pending_refresh.lock();
        if let Some(existing) = pending.as_ref() {
            debug!("Joining in-flight token refresh");
            return existing.clone();
        }

        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = inner.run_refresh().await;
            *inner.pending_refresh.lock() = None;
            result
        });

        let shared = async move {
            task.await.unwrap_or_else(|e| {
                Err(AuthError::Internal(format!("Refresh task failed: {}", e)))
            })
        }
        .boxed()
        .shared();

        *pending = Some(shared.clone());
        shared
    }

    #[instrument(skip(self))]
    async fn run_refresh(&self) -> Result<String> {
        let (memory_refresh_token, epoch) = {
            let state = self.state.read();
            (
                state.tokens.as_ref().map(|t| t.refresh_token.clone()),
                state.epoch,
            )
        };

        let refresh_token = match memory_refresh_token {
            Some(token) => Some(token),
            None => self.token_store.refresh_token().await.unwrap_or_else(|e| {
                warn!(error = %e, "Could not read stored refresh token");
                None
            }),
        };

        let Some(refresh_token) = refresh_token else {
            info!("No refresh token available");
            self.logout_if_current(epoch).await;
            return Err(AuthError::SessionExpired);
        };

        self.event_bus.emit_auth(AuthEvent::TokenRefreshing);
        {
            let mut state = self.state.write();
            if state.epoch == epoch && state.auth_state == AuthState::SignedIn {
                state.auth_state = AuthState::TokenRefreshing;
            }
        }

        let outcome = match timeout(self.refresh_timeout, self.api.refresh(&refresh_token)).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::Unreachable {
                message: NETWORK_ERROR_MESSAGE.to_string(),
            }),
        };

        let access_token = match outcome {
            Ok(token) => token,
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Token refresh failed");
                self.logout_if_current(epoch).await;
                return Err(AuthError::SessionExpired);
            }
        };

        let _guard = self.write_lock.lock().await;
        if self.state.read().epoch != epoch {
            debug!("Session changed during refresh, discarding new token");
            return Err(AuthError::SessionExpired);
        }

        if let Err(e) = self.token_store.store_access_token(&access_token).await {
            warn!(error = %e, "Failed to persist refreshed token");
            self.clear_locked().await;
            return Err(AuthError::SessionExpired);
        }

        {
            let mut state = self.state.write();
            state.tokens = Some(TokenPair::new(access_token.clone(), refresh_token));
            if state.auth_state == AuthState::TokenRefreshing {
                state.auth_state = AuthState::SignedIn;
            }
        }

        self.event_bus.emit_auth(AuthEvent::TokenRefreshed);
        info!("Access token refreshed");
        Ok(access_token)
    }

    fn emit_auth_error(&self, error: &AuthError) {
        self.event_bus.emit_auth(AuthEvent::AuthError {
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        });
    }
}
