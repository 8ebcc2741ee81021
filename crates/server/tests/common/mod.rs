//! Common test utilities for in-process API testing.
//!
//! [`TestFixture`] builds the full router over a temporary database, so
//! requests go through auth, handlers, the order services and SQLite exactly
//! as in production.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use parcelhub_core::{
    config::{ApiKeyEntry, AuditConfig, AuthConfig, DatabaseConfig, ServerConfig},
    create_audit_system, create_authenticator, AuditStore, AuthMethod, Authenticator, Config,
    SqliteAuditStore, SqliteOrderStore,
};

/// Re-export fixtures for test convenience
pub use parcelhub_core::testing::fixtures;

/// Headers the `none` authenticator reads the actor from.
pub type ActorHeaders = Vec<(&'static str, String)>;

pub fn worker(warehouse_id: &str) -> ActorHeaders {
    staff("worker-1", "warehouse_worker", warehouse_id)
}

pub fn supervisor(warehouse_id: &str) -> ActorHeaders {
    staff("supervisor-1", "supervisor", warehouse_id)
}

pub fn manager(warehouse_id: &str) -> ActorHeaders {
    staff("manager-1", "manager", warehouse_id)
}

pub fn staff(id: &str, role: &str, warehouse_id: &str) -> ActorHeaders {
    vec![
        ("x-actor-id", id.to_string()),
        ("x-actor-type", "staff".to_string()),
        ("x-actor-role", role.to_string()),
        ("x-actor-warehouses", warehouse_id.to_string()),
    ]
}

pub fn forwarder(forwarder_id: &str) -> ActorHeaders {
    vec![
        ("x-actor-id", forwarder_id.to_string()),
        ("x-actor-type", "forwarder".to_string()),
    ]
}

pub fn system() -> ActorHeaders {
    vec![
        ("x-actor-id", "courier-webhook".to_string()),
        ("x-actor-type", "system".to_string()),
    ]
}

pub fn anonymous() -> ActorHeaders {
    Vec::new()
}

/// In-process server over a temporary database.
pub struct TestFixture {
    pub router: Router,
    pub audit_store: Arc<dyn AuditStore>,
    pub order_store: Arc<SqliteOrderStore>,
    /// Keeps the database alive for the fixture's lifetime.
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture using the `none` authenticator (actor headers).
    pub async fn new() -> Self {
        Self::with_auth(AuthConfig {
            method: AuthMethod::None,
            api_keys: vec![],
        })
        .await
    }

    /// Fixture using API keys.
    pub async fn with_api_keys(api_keys: Vec<ApiKeyEntry>) -> Self {
        Self::with_auth(AuthConfig {
            method: AuthMethod::ApiKey,
            api_keys,
        })
        .await
    }

    pub async fn with_auth(auth: AuthConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let authenticator: Arc<dyn Authenticator> =
            Arc::from(create_authenticator(&auth).expect("Failed to create authenticator"));
        let config = Config {
            auth,
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            audit: AuditConfig::default(),
        };

        let order_store = Arc::new(
            SqliteOrderStore::new(&db_path).expect("Failed to create order store"),
        );
        let audit_store: Arc<dyn AuditStore> = Arc::new(
            SqliteAuditStore::new(&db_path).expect("Failed to create audit store"),
        );

        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let state = Arc::new(parcelhub_server::state::AppState::new(
            config,
            authenticator,
            audit_handle,
            Arc::clone(&audit_store),
            order_store.clone(),
            order_store.clone(),
        ));

        Self {
            router: parcelhub_server::api::create_router(state),
            audit_store,
            order_store,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str, actor: &ActorHeaders) -> TestResponse {
        self.request("GET", path, None, actor).await
    }

    pub async fn post(&self, path: &str, body: Value, actor: &ActorHeaders) -> TestResponse {
        self.request("POST", path, Some(body), actor).await
    }

    /// Create an order as a forwarder and return its JSON.
    pub async fn create_order(&self, warehouse_id: &str, forwarder_id: &str) -> Value {
        let response = self
            .post(
                "/api/v1/orders",
                json!({
                    "warehouse_id": warehouse_id,
                    "customer_id": "cust-1",
                    "description": "Winter jacket"
                }),
                &forwarder(forwarder_id),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }

    /// Request a status change.
    pub async fn transition(&self, order_id: &str, status: &str, actor: &ActorHeaders) -> TestResponse {
        self.post(
            &format!("/api/v1/orders/{}/transitions", order_id),
            json!({ "status": status }),
            actor,
        )
        .await
    }

    /// Wait until the audit writer has stored at least `count` events of
    /// `event_type`.
    pub async fn wait_for_audit(&self, event_type: &str, count: i64) {
        let filter = parcelhub_core::AuditFilter::new().with_event_type(event_type);
        for _ in 0..100 {
            if self.audit_store.count(&filter).unwrap_or(0) >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("audit event {} did not arrive", event_type);
    }

    /// Send a request with arbitrary headers.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&'static str, String)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into_owned()))
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
