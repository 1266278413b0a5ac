//! # Transport Gateway
//!
//! The single HTTP path for authenticated data requests against the MyDuka
//! backend.
//!
//! ## Features
//!
//! - Bearer token attachment from the [`SessionStore`](core_auth::SessionStore)
//! - One refresh-and-retry on 401, shared with concurrent requests
//! - JSON, raw and multipart bodies
//! - Cancellation through `tokio_util::sync::CancellationToken`
//! - Structured [`GatewayError`]s with backend message, status and code

pub mod error;
pub mod gateway;
pub mod options;

pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayResponse};
pub use options::{RequestBody, RequestOptions};
