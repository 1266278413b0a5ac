//! # Authentication Module
//!
//! Email/password session management for the MyDuka backend.
//!
//! ## Overview
//!
//! This module owns the authenticated session: it signs users in, keeps the
//! access/refresh token pair in the platform secure store, refreshes the
//! access token on demand and exposes the signed-in user's role for
//! role-gated navigation.
//!
//! ## Features
//!
//! - Local validation before any request is sent
//! - Single-flight token refresh shared by all concurrent callers
//! - All-or-nothing persistence of tokens and profile
//! - Startup restore and validation against `/auth/me`
//! - Invitation registration and password reset flows
//! - Auth state event emission

pub mod api;
pub mod error;
pub mod session;
pub mod token_store;
pub mod types;

pub use api::{AuthApi, AuthGrant, Registration};
pub use error::{ApiErrorBody, AuthError, ErrorKind, Result};
pub use session::{Bearer, SessionStore};
pub use token_store::{StoredSession, TokenStore};
pub use types::{
    is_valid_email, login_redirect, AuthState, Credentials, RegistrationForm, Role, TokenPair,
    UserProfile,
};
