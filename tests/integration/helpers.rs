//! Shared test helpers for integration tests.
//!
//! The application runs against the in-memory entity store and object
//! store; requests go through the full router via `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use nimbus_api::{AppState, build_router};
use nimbus_auth::JwtEncoder;
use nimbus_core::config::{AppConfig, StorageProviderKind};
use nimbus_core::traits::storage::{ObjectStore, PutOptions};
use nimbus_database::MemoryStore;
use nimbus_storage::MemoryObjectStore;

pub const BASE_URL: &str = "http://nimbus.test";

/// A signed-in test user.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Entity store shared with the router
    pub store: MemoryStore,
    /// Object store shared with the router
    pub objects: MemoryObjectStore,
    /// Application config
    pub config: AppConfig,
    encoder: JwtEncoder,
}

impl TestApp {
    /// Create a new test application with the default quota.
    pub fn new() -> Self {
        Self::with_quota(15 * 1024 * 1024 * 1024)
    }

    /// Create a test application with a per-owner quota.
    pub fn with_quota(quota_bytes: i64) -> Self {
        let mut config = AppConfig::default();
        config.server.public_base_url = BASE_URL.to_string();
        config.server.max_upload_size_bytes = 1024 * 1024;
        config.storage.provider = StorageProviderKind::Memory;
        config.storage.quota_bytes = quota_bytes;
        config.auth.jwt_secret = "integration-test-secret".to_string();

        let store = MemoryStore::new();
        let objects = MemoryObjectStore::new();
        let encoder = JwtEncoder::new(&config.auth);
        let state = AppState::build(
            config.clone(),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(objects.clone()),
        );

        Self {
            router: build_router(state),
            store,
            objects,
            config,
            encoder,
        }
    }

    /// Sign a token for a fresh user. The user row appears on first request.
    pub fn user(&self, name: &str) -> TestUser {
        let id = Uuid::new_v4();
        let email = format!("{}@example.com", name.to_lowercase());
        let token = self
            .encoder
            .issue(id, &email, Some(name))
            .expect("Failed to sign token");
        TestUser { id, email, token }
    }

    /// Sign a user in by touching an authenticated route once.
    pub async fn signed_in(&self, name: &str) -> TestUser {
        let user = self.user(name);
        let response = self.get("/api/user", Some(&user)).await;
        assert_eq!(response.status, StatusCode::OK);
        user
    }

    /// Make a JSON request through the router.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        user: Option<&TestUser>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(user) = user {
            req = req.header("Authorization", format!("Bearer {}", user.token));
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        self.send(req).await
    }

    pub async fn get(&self, path: &str, user: Option<&TestUser>) -> TestResponse {
        self.request("GET", path, None, user).await
    }

    pub async fn post(&self, path: &str, body: Value, user: &TestUser) -> TestResponse {
        self.request("POST", path, Some(body), Some(user)).await
    }

    pub async fn patch(&self, path: &str, body: Value, user: &TestUser) -> TestResponse {
        self.request("PATCH", path, Some(body), Some(user)).await
    }

    pub async fn delete(&self, path: &str, user: &TestUser) -> TestResponse {
        self.request("DELETE", path, None, Some(user)).await
    }

    /// POST a multipart form with one `file` part and optional text parts.
    pub async fn upload(
        &self,
        user: &TestUser,
        filename: &str,
        content_type: &str,
        data: &[u8],
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let boundary = "nimbus-test-boundary";
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let req = Request::builder()
            .method("POST")
            .uri("/api/files/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("Authorization", format!("Bearer {}", user.token))
            .body(Body::from(body))
            .expect("Failed to build request");

        self.send(req).await
    }

    /// Create a folder and return its id.
    pub async fn folder(&self, user: &TestUser, name: &str, parent: Option<Uuid>) -> Uuid {
        let response = self
            .post(
                "/api/files/folder",
                json!({ "name": name, "parent_id": parent }),
                user,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.id()
    }

    /// Upload a small file through the proxy path and return its id.
    pub async fn file(&self, user: &TestUser, name: &str, data: &[u8], parent: Option<Uuid>) -> Uuid {
        let parent = parent.map(|p| p.to_string());
        let fields: Vec<(&str, &str)> = parent
            .as_deref()
            .map(|p| vec![("parentId", p)])
            .unwrap_or_default();
        let response = self.upload(user, name, "text/plain", data, &fields).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.id()
    }

    /// Write bytes straight into the object store, as a client holding a
    /// presigned upload grant would.
    pub async fn put_object(&self, key: &str, data: &'static [u8]) {
        self.objects
            .put(key, Bytes::from_static(data), &PutOptions::default())
            .await
            .expect("Failed to put object");
    }

    async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let raw = axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&raw).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
            raw,
        }
    }
}

/// Captured response
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed JSON body (`Null` for non-JSON bodies)
    pub body: Value,
    /// Raw body bytes
    pub raw: Bytes,
}

impl TestResponse {
    /// The `data` member of a success envelope.
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    /// `data.id` parsed as a UUID.
    pub fn id(&self) -> Uuid {
        self.data()["id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("response has no id: {}", self.body))
    }

    /// The `error` code of a failure body.
    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }

    /// Names in a `data` array, in order.
    pub fn names(&self) -> Vec<String> {
        self.data()
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|n| n["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}
