//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, and through it `core-auth`,
//! `core-gateway` and the desktop bridges). Host applications can depend on
//! `myduka-workspace` and enable the documented features without needing to
//! wire each crate individually.

#[cfg(any(feature = "desktop-shims", feature = "headless"))]
pub use core_service::*;
