//! Typed wrappers over the gateway for the backend's admin and inventory
//! routes.
//!
//! Inputs are typed and validated locally; backend payloads are returned as
//! JSON values since their shape is owned by the backend.

pub mod admin;
pub mod inventory;

pub use admin::{AdminService, ClerkUpdate, NewClerk, ReportPeriod, SupplyRequestStatus};
pub use inventory::{InventoryService, StockAttachment, StockEntry};

use core_gateway::{GatewayResponse, Result};
use serde_json::Value;

/// Percent-encodes one path segment.
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Body of a successful response, or `Null` when it is empty.
pub(crate) fn json_or_null(response: GatewayResponse) -> Result<Value> {
    if response.is_empty() {
        Ok(Value::Null)
    } else {
        response.json()
    }
}
