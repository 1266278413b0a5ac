//! Clerk inventory operations.

use super::{json_or_null, segment};
use bridge_traits::{HttpMethod, MultipartForm};
use bytes::Bytes;
use core_gateway::{Gateway, GatewayError, RequestBody, RequestOptions, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

/// A stock receipt recorded by a clerk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockEntry {
    pub product_id: String,
    /// Units received
    pub received: u32,
    /// Units received damaged; never more than `received`
    pub spoilt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buying_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selling_price: Option<f64>,
}

impl StockEntry {
    pub fn new(product_id: impl Into<String>, received: u32, spoilt: u32) -> Self {
        Self {
            product_id: product_id.into(),
            received,
            spoilt,
            buying_price: None,
            selling_price: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.product_id.trim().is_empty() {
            return Err(GatewayError::Validation("Product is required".to_string()));
        }
        if self.spoilt > self.received {
            return Err(GatewayError::Validation(
                "Spoilt quantity cannot exceed quantity received".to_string(),
            ));
        }
        Ok(())
    }

    fn into_form(self) -> MultipartForm {
        let mut form = MultipartForm::new()
            .text("product_id", self.product_id)
            .text("received", self.received.to_string())
            .text("spoilt", self.spoilt.to_string());
        if let Some(price) = self.buying_price {
            form = form.text("buying_price", price.to_string());
        }
        if let Some(price) = self.selling_price {
            form = form.text("selling_price", price.to_string());
        }
        form
    }
}

/// File sent along with a stock entry, e.g. a delivery note.
#[derive(Debug, Clone)]
pub struct StockAttachment {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

#[derive(Clone)]
pub struct InventoryService {
    gateway: Gateway,
}

impl InventoryService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    #[instrument(skip(self), fields(product_id = %entry.product_id))]
    pub async fn add_stock(&self, entry: &StockEntry) -> Result<Value> {
        entry.validate()?;
        json_or_null(self.gateway.post_json("/inventory/add_stock", entry).await?)
    }

    /// Records a stock entry with an attached file as a multipart upload.
    #[instrument(skip_all, fields(product_id = %entry.product_id, file = %attachment.file_name))]
    pub async fn add_stock_with_attachment(
        &self,
        entry: StockEntry,
        attachment: StockAttachment,
    ) -> Result<Value> {
        entry.validate()?;
        let form = entry.into_form().file(
            "attachment",
            attachment.file_name,
            attachment.mime_type,
            attachment.data,
        );
        json_or_null(
            self.gateway
                .post_multipart("/inventory/add_stock", form)
                .await?,
        )
    }

    pub async fn supply_requests(&self) -> Result<Value> {
        json_or_null(self.gateway.get("/inventory/supply_requests").await?)
    }

    pub async fn approve_request(&self, request_id: &str) -> Result<Value> {
        self.decide(request_id, "approve").await
    }

    pub async fn decline_request(&self, request_id: &str) -> Result<Value> {
        self.decide(request_id, "decline").await
    }

    async fn decide(&self, request_id: &str, action: &str) -> Result<Value> {
        let path = format!(
            "/inventory/supply_requests/{}/{}",
            segment(request_id),
            action
        );
        json_or_null(
            self.gateway
                .request(HttpMethod::Put, &path, RequestBody::Empty, RequestOptions::new())
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_spoilt_cannot_exceed_received() {
        assert!(StockEntry::new("p-1", 10, 10).validate().is_ok());
        let err = StockEntry::new("p-1", 3, 4).validate().unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }

    #[test]
    fn test_product_required() {
        assert!(StockEntry::new(" ", 1, 0).validate().is_err());
    }

    #[test]
    fn test_entry_serialization_omits_unset_prices() {
        let entry = StockEntry::new("p-9", 20, 1);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"product_id": "p-9", "received": 20, "spoilt": 1})
        );
    }

    #[test]
    fn test_entry_form_fields() {
        let mut entry = StockEntry::new("p-9", 20, 1);
        entry.buying_price = Some(120.5);
        let form = entry.into_form();
        let names: Vec<&str> = form.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["product_id", "received", "spoilt", "buying_price"]);
    }
}
