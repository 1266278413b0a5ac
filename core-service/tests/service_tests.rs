//! Integration tests for the core service façade and domain services
//!
//! A recording backend captures every request so these tests can check the
//! wire contract of the admin and inventory services end to end, through the
//! session store and the gateway.

use async_trait::async_trait;
use bridge_traits::{
    error::Result as BridgeResult, storage::SecureStore, HttpBody, HttpClient, HttpMethod,
    HttpRequest, HttpResponse,
};
use core_service::services::{
    ClerkUpdate, NewClerk, ReportPeriod, StockAttachment, StockEntry, SupplyRequestStatus,
};
use core_service::{CoreConfig, CoreService, Credentials, GatewayError, Role};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Mock Implementations
// ============================================================================

#[derive(Default)]
struct MemoryStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
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

/// Records data requests and answers them with `{"ok": true}`.
#[derive(Default)]
struct RecordingBackend {
    requests: Mutex<Vec<HttpRequest>>,
    data_status: Mutex<Option<(u16, Value)>>,
}

impl RecordingBackend {
    fn last(&self) -> HttpRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("a data request was sent")
    }

    fn count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl HttpClient for RecordingBackend {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        if request.url.ends_with("/auth/login") {
            let body = json!({
                "access_token": "a-1",
                "refresh_token": "r-1",
                "user": {"id": 8, "email": "boss@duka.co", "name": "Wambui", "role": "MERCHANT"}
            });
            return Ok(HttpResponse::new(200, serde_json::to_vec(&body).unwrap()));
        }

        self.requests.lock().push(request);
        let (status, body) = self
            .data_status
            .lock()
            .clone()
            .unwrap_or((200, json!({"ok": true})));
        Ok(HttpResponse::new(status, serde_json::to_vec(&body).unwrap()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn service() -> (CoreService, Arc<RecordingBackend>, Arc<MemoryStore>) {
    let backend = Arc::new(RecordingBackend::default());
    let store = Arc::new(MemoryStore::default());
    let config = CoreConfig::builder()
        .api_base_url("https://duka.example.com/api")
        .http_client(backend.clone())
        .secure_store(store.clone())
        .build()
        .unwrap();
    (CoreService::new(config), backend, store)
}

async fn signed_in() -> (CoreService, Arc<RecordingBackend>) {
    let (core, backend, _) = service();
    core.session()
        .login(Credentials::new("boss@duka.co", "correct-horse"))
        .await
        .unwrap();
    (core, backend)
}

fn json_body(request: &HttpRequest) -> Value {
    match &request.body {
        HttpBody::Json(bytes) => serde_json::from_slice(bytes).unwrap(),
        other => panic!("expected JSON body, got {:?}", other),
    }
}

// ============================================================================
// Façade
// ============================================================================

#[tokio::test]
async fn test_bootstrap_without_stored_session() {
    let (core, backend, _) = service();

    assert!(core.bootstrap().await.is_none());
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn test_bootstrap_restores_previous_login() {
    let (core, backend, store) = service();
    core.session()
        .login(Credentials::new("boss@duka.co", "correct-horse"))
        .await
        .unwrap();

    *backend.data_status.lock() = Some((
        200,
        json!({"user": {"id": 8, "email": "boss@duka.co", "name": "Wambui", "role": "merchant"}}),
    ));
    let config = CoreConfig::builder()
        .api_base_url("https://duka.example.com/api")
        .http_client(backend.clone())
        .secure_store(store.clone())
        .build()
        .unwrap();
    let restarted = CoreService::new(config);

    let user = restarted.bootstrap().await.unwrap();
    assert_eq!(user.role, Role::Merchant);
    assert!(restarted.session().has_role(Role::Merchant));
    assert!(backend.last().url.ends_with("/auth/me"));
}

#[tokio::test]
async fn test_services_share_the_session_token() {
    let (core, backend) = signed_in().await;

    core.inventory().supply_requests().await.unwrap();

    let request = backend.last();
    assert_eq!(request.url, "https://duka.example.com/api/inventory/supply_requests");
    assert_eq!(request.header_value("authorization"), Some("Bearer a-1"));
}

// ============================================================================
// Admin service
// ============================================================================

#[tokio::test]
async fn test_invite_admin_validates_locally() {
    let (core, backend) = signed_in().await;

    let err = core.admin().invite_admin("not-an-email").await.unwrap_err();

    assert!(matches!(err, GatewayError::Validation(_)));
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn test_invite_admin_returns_backend_message() {
    let (core, backend) = signed_in().await;
    *backend.data_status.lock() = Some((201, json!({"message": "Invitation emailed"})));

    let message = core.admin().invite_admin(" new.admin@duka.co ").await.unwrap();

    assert_eq!(message, "Invitation emailed");
    let request = backend.last();
    assert!(request.url.ends_with("/auth/invite-admin"));
    assert_eq!(json_body(&request), json!({"email": "new.admin@duka.co"}));
}

#[tokio::test]
async fn test_clerk_management_routes() {
    let (core, backend) = signed_in().await;
    let admin = core.admin();

    admin.list_clerks(Some("12")).await.unwrap();
    assert_eq!(
        backend.last().url,
        "https://duka.example.com/api/admin/clerk?store_id=12"
    );

    admin
        .create_clerk(&NewClerk {
            name: "Kamau".into(),
            email: "kamau@duka.co".into(),
            password: "temporary-pass".into(),
            store_id: Some("12".into()),
        })
        .await
        .unwrap();
    let request = backend.last();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(json_body(&request)["store_id"], "12");

    admin
        .update_clerk(
            "c 7",
            &ClerkUpdate {
                name: Some("Kamau N.".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let request = backend.last();
    assert_eq!(request.method, HttpMethod::Patch);
    assert!(request.url.ends_with("/admin/clerk/c%207"));

    admin.set_clerk_status("7", false).await.unwrap();
    let request = backend.last();
    assert_eq!(request.method, HttpMethod::Put);
    assert!(request.url.ends_with("/admin/clerk/7/status"));
    assert_eq!(json_body(&request), json!({"is_active": false}));
}

#[tokio::test]
async fn test_supply_payment_and_report_routes() {
    let (core, backend) = signed_in().await;
    let admin = core.admin();

    admin
        .list_supply_requests(Some(SupplyRequestStatus::Pending))
        .await
        .unwrap();
    assert!(backend.last().url.ends_with("/admin/supply-requests?status=PENDING"));

    admin.approve_supply_request("41").await.unwrap();
    let request = backend.last();
    assert_eq!(request.method, HttpMethod::Put);
    assert!(request.url.ends_with("/admin/supply-requests/41/approve"));
    assert!(request.body.is_empty());

    admin
        .reject_supply_request("41", "Over budget")
        .await
        .unwrap();
    assert_eq!(
        json_body(&backend.last()),
        json!({"rejection_reason": "Over budget"})
    );

    admin.pending_payments().await.unwrap();
    assert!(backend.last().url.ends_with("/admin/payments/pending"));

    admin.update_payment_status("p-3", true).await.unwrap();
    assert_eq!(json_body(&backend.last()), json!({"is_paid": true}));

    admin.store_report("12", ReportPeriod::Weekly).await.unwrap();
    assert!(backend
        .last()
        .url
        .ends_with("/admin/reports/store/12?period=weekly"));
}

#[tokio::test]
async fn test_backend_error_message_is_preserved() {
    let (core, backend) = signed_in().await;
    *backend.data_status.lock() = Some((403, json!({"error": "Merchants only"})));

    let err = core.admin().pending_payments().await.unwrap_err();

    assert_eq!(err.status(), Some(403));
    assert_eq!(err.to_string(), "Merchants only");
}

// ============================================================================
// Inventory service
// ============================================================================

#[tokio::test]
async fn test_add_stock_posts_json_entry() {
    let (core, backend) = signed_in().await;

    core.inventory()
        .add_stock(&StockEntry::new("p-5", 24, 2))
        .await
        .unwrap();

    let request = backend.last();
    assert!(request.url.ends_with("/inventory/add_stock"));
    assert_eq!(
        json_body(&request),
        json!({"product_id": "p-5", "received": 24, "spoilt": 2})
    );
}

#[tokio::test]
async fn test_invalid_stock_entry_is_not_sent() {
    let (core, backend) = signed_in().await;

    let err = core
        .inventory()
        .add_stock(&StockEntry::new("p-5", 1, 3))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Validation(_)));
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn test_add_stock_with_attachment_is_multipart() {
    let (core, backend) = signed_in().await;

    core.inventory()
        .add_stock_with_attachment(
            StockEntry::new("p-5", 24, 0),
            StockAttachment {
                file_name: "delivery-note.pdf".into(),
                mime_type: Some("application/pdf".into()),
                data: bytes::Bytes::from_static(b"%PDF-1.4"),
            },
        )
        .await
        .unwrap();

    let request = backend.last();
    assert!(request.header_value("content-type").is_none());
    match &request.body {
        HttpBody::Multipart(form) => {
            assert_eq!(form.parts.len(), 4);
            assert_eq!(form.parts[3].name, "attachment");
        }
        other => panic!("expected multipart body, got {:?}", other),
    }
}

#[tokio::test]
async fn test_supply_request_decisions() {
    let (core, backend) = signed_in().await;
    let inventory = core.inventory();

    inventory.approve_request("9").await.unwrap();
    assert!(backend
        .last()
        .url
        .ends_with("/inventory/supply_requests/9/approve"));

    inventory.decline_request("9").await.unwrap();
    let request = backend.last();
    assert_eq!(request.method, HttpMethod::Put);
    assert!(request.url.ends_with("/inventory/supply_requests/9/decline"));
}
