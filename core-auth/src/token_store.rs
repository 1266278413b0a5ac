//! Session Persistence
//!
//! Stores the token pair and the cached profile through the platform
//! `SecureStore` under three keys: `access_token`, `refresh_token` and `user`.
//!
//! ## Security Features
//!
//! - Token values are never logged or included in error messages
//! - Writing a new session is all-or-nothing: if any write fails, the
//!   previously stored values are put back
//! - Clearing is best-effort across all keys and reports the first failure
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{TokenPair, TokenStore, UserProfile};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SecureStore;
//! # async fn example(secure_store: Arc<dyn SecureStore>, user: UserProfile) -> core_auth::Result<()> {
//! let token_store = TokenStore::new(secure_store);
//!
//! token_store
//!     .store_session(&TokenPair::new("access", "refresh"), &user)
//!     .await?;
//! let stored = token_store.load().await?;
//! assert!(stored.tokens.is_some());
//!
//! token_store.clear().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{TokenPair, UserProfile};
use bridge_traits::storage::SecureStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

const SESSION_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Snapshot of what is persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredSession {
    /// Present only when both tokens are stored
    pub tokens: Option<TokenPair>,
    /// Absent when missing or unreadable
    pub user: Option<UserProfile>,
}

impl StoredSession {
    pub fn is_complete(&self) -> bool {
        self.tokens.is_some() && self.user.is_some()
    }
}

/// Durable storage for the session.
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        debug!("Initializing TokenStore");
        Self { secure_store }
    }

    /// Loads the persisted session.
    ///
    /// A profile that fails to parse is reported as absent rather than as an
    /// error so startup can still validate the tokens.
    pub async fn load(&self) -> Result<StoredSession> {
        let access = self.read_string(ACCESS_TOKEN_KEY).await?;
        let refresh = self.read_string(REFRESH_TOKEN_KEY).await?;

        let tokens = match (access, refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair::new(access, refresh)),
            (None, None) => None,
            _ => {
                warn!("Incomplete token pair in storage, ignoring it");
                None
            }
        };

        let user = match self.secure_store.get_secret(USER_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<UserProfile>(&bytes) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Stored user profile is unreadable");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => return Err(AuthError::storage(e)),
        };

        Ok(StoredSession { tokens, user })
    }

    pub async fn refresh_token(&self) -> Result<Option<String>> {
        self.read_string(REFRESH_TOKEN_KEY).await
    }

    /// Persists a complete session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if any write fails. The previously stored
    /// values have been restored by then.
    pub async fn store_session(&self, tokens: &TokenPair, user: &UserProfile) -> Result<()> {
        let user_json = serde_json::to_vec(user)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize profile: {}", e)))?;

        let snapshot = self.snapshot().await?;

        let writes: [(&str, &[u8]); 3] = [
            (ACCESS_TOKEN_KEY, tokens.access_token.as_bytes()),
            (REFRESH_TOKEN_KEY, tokens.refresh_token.as_bytes()),
            (USER_KEY, &user_json),
        ];

        for (key, value) in writes {
            if let Err(e) = self.secure_store.set_secret(key, value).await {
                warn!(key, error = %e, "Session write failed, restoring previous values");
                self.restore(snapshot).await;
                return Err(AuthError::storage(e));
            }
        }

        info!(user_id = %user.id, "Session persisted");
        Ok(())
    }

    pub async fn store_access_token(&self, access_token: &str) -> Result<()> {
        self.secure_store
            .set_secret(ACCESS_TOKEN_KEY, access_token.as_bytes())
            .await
            .map_err(AuthError::storage)
    }

    pub async fn store_user(&self, user: &UserProfile) -> Result<()> {
        let json = serde_json::to_vec(user)
            .map_err(|e| AuthError::Internal(format!("Failed to serialize profile: {}", e)))?;
        self.secure_store
            .set_secret(USER_KEY, &json)
            .await
            .map_err(AuthError::storage)
    }

    /// Deletes all session keys.
    ///
    /// Every key is attempted even if an earlier delete fails.
    pub async fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in SESSION_KEYS {
            if let Err(e) = self.secure_store.delete_secret(key).await {
                warn!(key, error = %e, "Failed to delete session key");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(AuthError::storage(e)),
            None => {
                debug!("Session storage cleared");
                Ok(())
            }
        }
    }

    async fn read_string(&self, key: &str) -> Result<Option<String>> {
        let Some(bytes) = self
            .secure_store
            .get_secret(key)
            .await
            .map_err(AuthError::storage)?
        else {
            return Ok(None);
        };

        match String::from_utf8(bytes) {
            Ok(value) if !value.is_empty() => Ok(Some(value)),
            Ok(_) => Ok(None),
            Err(_) => {
                warn!(key, "Stored value is not valid UTF-8, ignoring it");
                Ok(None)
            }
        }
    }

    async fn snapshot(&self) -> Result<Vec<(&'static str, Option<Vec<u8>>)>> {
        let mut snapshot = Vec::with_capacity(SESSION_KEYS.len());
        for key in SESSION_KEYS {
            let value = self
                .secure_store
                .get_secret(key)
                .await
                .map_err(AuthError::storage)?;
            snapshot.push((key, value));
        }
        Ok(snapshot)
    }

    async fn restore(&self, snapshot: Vec<(&'static str, Option<Vec<u8>>)>) {
        for (key, value) in snapshot {
            let result = match value {
                Some(bytes) => self.secure_store.set_secret(key, &bytes).await,
                None => self.secure_store.delete_secret(key).await,
            };
            if let Err(e) = result {
                warn!(key, error = %e, "Failed to restore session key");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        data: Mutex<HashMap<String, Vec<u8>>>,
        fail_writes_for: Option<&'static str>,
    }

    #[async_trait]
    impl SecureStore for MemoryStore {
        async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
            if self.fail_writes_for == Some(key) {
                return Err(BridgeError::OperationFailed("disk full".into()));
            }
            self.data.lock().insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self.data.lock().get(key).cloned())
        }

        async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
            self.data.lock().remove(key);
            Ok(())
        }
    }

    fn profile(id: &str, role: Role) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            email: format!("{}@duka.co", id),
            name: "Test".to_string(),
            role,
            created_at: None,
            avatar: None,
        }
    }

    #[tokio::test]
    async fn test_store_and_load_session() {
        let store = TokenStore::new(Arc::new(MemoryStore::default()));
        let tokens = TokenPair::new("a1", "r1");

        store
            .store_session(&tokens, &profile("7", Role::Clerk))
            .await
            .unwrap();

        let loaded = store.load().await.unwrap();
        assert!(loaded.is_complete());
        assert_eq!(loaded.tokens, Some(tokens));
        assert_eq!(loaded.user.unwrap().role, Role::Clerk);
    }

    #[tokio::test]
    async fn test_failed_write_restores_previous_session() {
        let backing = Arc::new(MemoryStore::default());
        let store = TokenStore::new(backing.clone());
        store
            .store_session(&TokenPair::new("old-a", "old-r"), &profile("1", Role::Admin))
            .await
            .unwrap();

        let failing = Arc::new(MemoryStore {
            data: Mutex::new(backing.data.lock().clone()),
            fail_writes_for: Some(USER_KEY),
        });
        let store = TokenStore::new(failing.clone());

        let err = store
            .store_session(&TokenPair::new("new-a", "new-r"), &profile("2", Role::Clerk))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)));

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.tokens, Some(TokenPair::new("old-a", "old-r")));
        assert_eq!(loaded.user.unwrap().id, "1");
    }

    #[tokio::test]
    async fn test_failed_first_write_leaves_empty_storage_empty() {
        let store = TokenStore::new(Arc::new(MemoryStore {
            fail_writes_for: Some(REFRESH_TOKEN_KEY),
            ..Default::default()
        }));

        assert!(store
            .store_session(&TokenPair::new("a", "r"), &profile("3", Role::Merchant))
            .await
            .is_err());

        assert_eq!(store.load().await.unwrap(), StoredSession::default());
    }

    #[tokio::test]
    async fn test_unreadable_profile_is_absent() {
        let backing = Arc::new(MemoryStore::default());
        backing.set_secret(ACCESS_TOKEN_KEY, b"a").await.unwrap();
        backing.set_secret(REFRESH_TOKEN_KEY, b"r").await.unwrap();
        backing.set_secret(USER_KEY, b"{not json").await.unwrap();

        let loaded = TokenStore::new(backing).load().await.unwrap();
        assert!(loaded.tokens.is_some());
        assert!(loaded.user.is_none());
        assert!(!loaded.is_complete());
    }

    #[tokio::test]
    async fn test_half_token_pair_is_ignored() {
        let backing = Arc::new(MemoryStore::default());
        backing.set_secret(ACCESS_TOKEN_KEY, b"a").await.unwrap();

        let loaded = TokenStore::new(backing).load().await.unwrap();
        assert!(loaded.tokens.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_all_keys() {
        let backing = Arc::new(MemoryStore::default());
        let store = TokenStore::new(backing.clone());
        store
            .store_session(&TokenPair::new("a", "r"), &profile("9", Role::Clerk))
            .await
            .unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert!(backing.data.lock().is_empty());
    }

    #[tokio::test]
    async fn test_store_access_token_keeps_refresh_and_user() {
        let store = TokenStore::new(Arc::new(MemoryStore::default()));
        store
            .store_session(&TokenPair::new("a", "r"), &profile("4", Role::Admin))
            .await
            .unwrap();

        store.store_access_token("a2").await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.tokens, Some(TokenPair::new("a2", "r")));
        assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("r"));
        assert_eq!(loaded.user.unwrap().id, "4");
    }
}
