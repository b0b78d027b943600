//! Test helpers: build AppState and router for integration tests.
//!
//! The router is the production one; persistence, object storage and the owner
//! directory are the in-memory collaborators from `vitrina_services::test_helpers`.

use axum_test::TestServer;
use serde_json::{json, Value};
use std::sync::Arc;
use vitrina_api::setup::routes::{setup_routes, RouteOptions};
use vitrina_api::setup::services::build_state;
use vitrina_core::{OwnerEntityType, UploadPolicy};
use vitrina_services::test_helpers::{
    InMemoryUploadRecordStore, MockObjectStorage, MockOwnerDirectory,
};

pub const TEST_USER_ID: &str = "7";

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryUploadRecordStore>,
    pub storage: Arc<MockObjectStorage>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Owners seeded: commerce 42, commerce_branch 7, product 5.
pub fn setup_test_app() -> TestApp {
    let store = Arc::new(InMemoryUploadRecordStore::new());
    let storage = Arc::new(MockObjectStorage::new());
    let owners = Arc::new(MockOwnerDirectory::new());
    owners.add(OwnerEntityType::Commerce, 42);
    owners.add(OwnerEntityType::CommerceBranch, 7);
    owners.add(OwnerEntityType::Product, 5);

    let state = build_state(
        None,
        store.clone(),
        owners,
        storage.clone(),
        UploadPolicy::default(),
    );
    let router = setup_routes(state, &RouteOptions::default());
    let server = TestServer::new(router).expect("Failed to start test server");

    TestApp {
        server,
        store,
        storage,
    }
}

pub fn presign_body(document_type: &str, file_name: &str, mime_type: &str, size: u64) -> Value {
    json!({
        "owner_entity_type": "commerce",
        "owner_entity_id": 42,
        "document_type": document_type,
        "file_name": file_name,
        "mime_type": mime_type,
        "file_size_bytes": size,
    })
}

pub fn confirm_body(token: &str, etag: &str, size: u64) -> Value {
    json!({
        "upload_token": token,
        "s3_metadata": { "etag": etag, "size": size },
    })
}

/// Presign an ID card for commerce 42; returns (upload_token, storage_key).
pub async fn presign_id_card(app: &TestApp, size: u64) -> (String, String) {
    let response = app
        .client()
        .post("/documents/presign")
        .add_header("X-User-Id", TEST_USER_ID)
        .json(&presign_body("ID_CARD", "cedula.pdf", "application/pdf", size))
        .await;
    assert_eq!(response.status_code(), 201);
    let body: Value = response.json();
    (
        body["upload_token"].as_str().unwrap().to_string(),
        body["storage_key"].as_str().unwrap().to_string(),
    )
}

/// Presign, land the object and confirm it; returns the document JSON.
pub async fn upload_confirmed_id_card(app: &TestApp, etag: &str) -> Value {
    let (token, key) = presign_id_card(app, 2048).await;
    app.storage.put_object(&key, 2048, etag);
    let response = app
        .client()
        .post("/documents/confirm")
        .add_header("X-User-Id", TEST_USER_ID)
        .json(&confirm_body(&token, etag, 2048))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    body["document"].clone()
}
