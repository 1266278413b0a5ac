//! Admin and merchant operations: clerks, supply requests, payments, reports
//! and admin invitations.

use super::{json_or_null, segment};
use core_auth::is_valid_email;
use core_gateway::{Gateway, GatewayError, RequestBody, RequestOptions, Result};
use bridge_traits::HttpMethod;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::{info, instrument};

/// New clerk account.
#[derive(Clone, Serialize)]
pub struct NewClerk {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
}

impl fmt::Debug for NewClerk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewClerk")
            .field("name", &self.name)
            .field("store_id", &self.store_id)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Partial clerk update. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClerkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SupplyRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl SupplyRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupplyRequestStatus::Pending => "PENDING",
            SupplyRequestStatus::Approved => "APPROVED",
            SupplyRequestStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportPeriod {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl ReportPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportPeriod::Daily => "daily",
            ReportPeriod::Weekly => "weekly",
            ReportPeriod::Monthly => "monthly",
            ReportPeriod::Yearly => "yearly",
        }
    }
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

/// Operations available to admins and merchants.
#[derive(Clone)]
pub struct AdminService {
    gateway: Gateway,
}

impl AdminService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Sends an admin invitation. Merchant only.
    ///
    /// Returns the backend confirmation message.
    #[instrument(skip_all)]
    pub async fn invite_admin(&self, email: &str) -> Result<String> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(GatewayError::Validation(
                "Please provide a valid email address".to_string(),
            ));
        }

        let response = self
            .gateway
            .post_json("/auth/invite-admin", &json!({ "email": email }))
            .await?;
        let message = if response.is_empty() {
            None
        } else {
            response.json::<MessageBody>()?.message
        };

        info!("Admin invitation sent");
        Ok(message.unwrap_or_else(|| "Invitation sent successfully".to_string()))
    }

    pub async fn list_clerks(&self, store_id: Option<&str>) -> Result<Value> {
        let mut options = RequestOptions::new();
        if let Some(store_id) = store_id {
            options = options.query("store_id", store_id);
        }
        json_or_null(self.gateway.get_with("/admin/clerk", options).await?)
    }

    #[instrument(skip(self, clerk), fields(store_id = ?clerk.store_id))]
    pub async fn create_clerk(&self, clerk: &NewClerk) -> Result<Value> {
        if clerk.name.trim().is_empty() || clerk.password.is_empty() {
            return Err(GatewayError::Validation(
                "Name and password are required".to_string(),
            ));
        }
        if !is_valid_email(clerk.email.trim()) {
            return Err(GatewayError::Validation(
                "Please provide a valid email address".to_string(),
            ));
        }
        json_or_null(self.gateway.post_json("/admin/clerk", clerk).await?)
    }

    pub async fn update_clerk(&self, clerk_id: &str, update: &ClerkUpdate) -> Result<Value> {
        let path = format!("/admin/clerk/{}", segment(clerk_id));
        json_or_null(self.gateway.patch_json(&path, update).await?)
    }

    /// Activates or deactivates a clerk account.
    pub async fn set_clerk_status(&self, clerk_id: &str, is_active: bool) -> Result<Value> {
        let path = format!("/admin/clerk/{}/status", segment(clerk_id));
        json_or_null(
            self.gateway
                .put_json(&path, &json!({ "is_active": is_active }))
                .await?,
        )
    }

    pub async fn list_supply_requests(
        &self,
        status: Option<SupplyRequestStatus>,
    ) -> Result<Value> {
        let mut options = RequestOptions::new();
        if let Some(status) = status {
            options = options.query("status", status.as_str());
        }
        json_or_null(
            self.gateway
                .get_with("/admin/supply-requests", options)
                .await?,
        )
    }

    pub async fn approve_supply_request(&self, request_id: &str) -> Result<Value> {
        let path = format!("/admin/supply-requests/{}/approve", segment(request_id));
        self.put_empty(&path).await
    }

    pub async fn reject_supply_request(&self, request_id: &str, reason: &str) -> Result<Value> {
        let path = format!("/admin/supply-requests/{}/reject", segment(request_id));
        json_or_null(
            self.gateway
                .put_json(&path, &json!({ "rejection_reason": reason }))
                .await?,
        )
    }

    pub async fn pending_payments(&self) -> Result<Value> {
        json_or_null(self.gateway.get("/admin/payments/pending").await?)
    }

    pub async fn update_payment_status(&self, payment_id: &str, is_paid: bool) -> Result<Value> {
        let path = format!("/admin/payments/{}", segment(payment_id));
        json_or_null(
            self.gateway
                .put_json(&path, &json!({ "is_paid": is_paid }))
                .await?,
        )
    }

    pub async fn store_report(&self, store_id: &str, period: ReportPeriod) -> Result<Value> {
        let path = format!("/admin/reports/store/{}", segment(store_id));
        json_or_null(
            self.gateway
                .get_with(&path, RequestOptions::new().query("period", period.as_str()))
                .await?,
        )
    }

    async fn put_empty(&self, path: &str) -> Result<Value> {
        json_or_null(
            self.gateway
                .request(HttpMethod::Put, path, RequestBody::Empty, RequestOptions::new())
                .await?,
        )
    }
}
