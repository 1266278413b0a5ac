//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the MyDuka client core:
//! - Logging and tracing infrastructure
//! - Configuration management (API base URL, timeouts, bridges)
//! - Event bus system for session and gateway notifications
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the session store, the
//! transport gateway and the service façade depend on. It establishes the
//! logging conventions and the event broadcasting mechanism used throughout
//! the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{ApiBaseUrl, CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{AuthEvent, CoreEvent, EventBus, EventStream, GatewayEvent};
