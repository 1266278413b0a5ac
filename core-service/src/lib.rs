//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, secure
//! storage) into one [`CoreService`]: a single [`SessionStore`] and a single
//! [`Gateway`] sharing the same bridges and event bus. Desktop apps typically
//! enable the `desktop-shims` feature, which falls back to the reqwest HTTP
//! client and the OS keychain when no bridge is supplied.
//!
//! There are no global singletons: hosts create the service once and pass it
//! (or its parts) to whatever needs it.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_service::CoreService;
//!
//! let core = CoreService::from_env()?;
//! match core.bootstrap().await {
//!     Some(user) => println!("Welcome back, {}", user.name),
//!     None => println!("Please sign in"),
//! }
//!
//! let clerks = core.admin().list_clerks(None).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod services;

pub use error::{CoreError, Result};
pub use services::{AdminService, InventoryService};

pub use core_auth::{AuthError, AuthState, Credentials, Role, SessionStore, UserProfile};
pub use core_gateway::{Gateway, GatewayError, RequestBody, RequestOptions};
pub use core_runtime::{CoreConfig, CoreEvent, EventBus, EventStream};

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{KeyringSecureStore, ReqwestHttpClient};

use std::sync::Arc;
use tracing::info;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    events: EventBus,
    session: SessionStore,
    gateway: Gateway,
}

impl CoreService {
    /// Create a new service from a validated configuration.
    pub fn new(config: CoreConfig) -> Self {
        let events = EventBus::new(config.event_buffer_size);
        let session = SessionStore::new(&config, events.clone());
        let gateway = Gateway::new(&config, session.clone());

        info!(api_base_url = %config.api_base_url, "Core service created");
        Self {
            config: Arc::new(config),
            events,
            session,
            gateway,
        }
    }

    /// Builds the configuration from `MYDUKA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let config = CoreConfig::from_env()?.build()?;
        Ok(Self::new(config))
    }

    /// Restores and validates the persisted session.
    ///
    /// Returns the signed-in user, or `None` when the host should show the
    /// login screen.
    pub async fn bootstrap(&self) -> Option<UserProfile> {
        self.session.initialize().await
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Subscribe to auth and gateway events.
    pub fn events(&self) -> EventStream {
        self.events.stream()
    }

    pub fn admin(&self) -> AdminService {
        AdminService::new(self.gateway.clone())
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(self.gateway.clone())
    }
}
