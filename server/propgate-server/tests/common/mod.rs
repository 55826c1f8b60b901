#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use approval_engine::{
    Action, ApprovalError, ApprovalRequest, ApprovalStatus, ApprovalStore, InMemoryApprovalStore, NewApprovalRequest,
};
use async_trait::async_trait;
use audit_engine::{
    AuditError, AuditEvent, AuditFilter, AuditStore, Category, InMemoryAuditStore, SeverityGroup, Severity,
};
use axum::{
    body::Body,
    body::Bytes,
    extract::{DefaultBodyLimit, Path},
    http::{Request, Response, StatusCode},
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use propgate_server::{
    create_app_with_routes, middleware::AuditSpec, routes::audited, GatewayConfig, PropGateServer, ProtectedOperation,
};

/// Gateway wired to in-memory stores plus a few stand-in business routes
pub struct TestGateway {
    pub server: PropGateServer,
    pub app: Router,
    pub audit_store: Arc<InMemoryAuditStore>,
    pub approval_store: Arc<InMemoryApprovalStore>,
    /// Number of times a business handler actually ran
    pub handler_calls: Arc<AtomicUsize>,
}

impl TestGateway {
    pub fn new() -> Self {
        let audit_store = Arc::new(InMemoryAuditStore::new());
        let approval_store = Arc::new(InMemoryApprovalStore::new());
        let server = PropGateServer::with_stores(GatewayConfig::default(), audit_store.clone(), approval_store.clone());
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let app = create_app_with_routes(server.clone(), business_routes(&server, handler_calls.clone()));

        Self {
            server,
            app,
            audit_store,
            approval_store,
            handler_calls,
        }
    }

    /// Gateway whose stores are supplied by the test
    pub fn with_stores(audit_store: Arc<dyn AuditStore>, approval_store: Arc<dyn ApprovalStore>) -> (PropGateServer, Router, Arc<AtomicUsize>) {
        let server = PropGateServer::with_stores(GatewayConfig::default(), audit_store, approval_store);
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let app = create_app_with_routes(server.clone(), business_routes(&server, handler_calls.clone()));
        (server, app, handler_calls)
    }

    pub fn calls(&self) -> usize {
        self.handler_calls.load(Ordering::SeqCst)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        send(&self.app, request).await
    }

    /// Wait for detached audit writes to land
    pub async fn wait_for_events(&self, expected: usize) -> Vec<AuditEvent> {
        for _ in 0..100 {
            if self.audit_store.len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Give any unexpected extra write a chance to show up
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.audit_store.snapshot()
    }
}

fn business_routes(server: &PropGateServer, calls: Arc<AtomicUsize>) -> Router<PropGateServer> {
    let expense_calls = calls.clone();
    let create_expense = post(move |Json(body): Json<Value>| {
        let calls = expense_calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            (StatusCode::CREATED, Json(json!({"id": "exp-1", "amount": body["amount"]})))
        }
    });

    let property_calls = calls.clone();
    let delete_property = delete(move |Path(_id): Path<String>| {
        let calls = property_calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            StatusCode::NO_CONTENT
        }
    });

    let status_calls = calls.clone();
    let echo_status = post(move |Path(code): Path<u16>| {
        let calls = status_calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
    });

    let payment_calls = calls.clone();
    let delete_payment = delete(move |Path(_id): Path<String>| {
        let calls = payment_calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            StatusCode::NO_CONTENT
        }
    });

    let upload_calls = calls.clone();
    let upload_document = post(move |body: Bytes| {
        let calls = upload_calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            (StatusCode::CREATED, Json(json!({"size": body.len()})))
        }
    })
    .layer(DefaultBodyLimit::disable());

    let double_calls = calls;
    let double_wrapped = post(move || {
        let calls = double_calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            StatusCode::OK
        }
    });
    let spec = AuditSpec::new(Category::System, "job", "run_job");
    let double_wrapped = audited(server, spec.clone(), audited(server, spec, double_wrapped));

    Router::new()
        .route(
            "/api/v1/expenses",
            propgate_server::protected(
                server,
                ProtectedOperation::new("expense", Action::Create, Category::Payment, "create_expense"),
                create_expense,
            ),
        )
        .route(
            "/api/v1/properties/:id",
            propgate_server::protected(
                server,
                ProtectedOperation::new("property", Action::Delete, Category::Property, "delete_property"),
                delete_property,
            ),
        )
        .route(
            "/api/v1/status/:id",
            audited(server, AuditSpec::new(Category::System, "status_echo", "echo_status"), echo_status),
        )
        .route("/api/v1/jobs", double_wrapped)
        .route(
            "/api/v1/payments/:id",
            audited(server, AuditSpec::new(Category::Payment, "payment", "delete_payment"), delete_payment),
        )
        .route(
            "/api/v1/documents",
            audited(server, AuditSpec::new(Category::Property, "document", "upload_document"), upload_document),
        )
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response<Body> = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    (status, value)
}

/// A caller identity sent through the trusted actor headers
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub actor_id: Uuid,
    pub organization_id: Uuid,
    pub role: &'static str,
}

impl Actor {
    pub fn new(role: &'static str) -> Self {
        Self {
            actor_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            role,
        }
    }

    /// Another actor in the same organization
    pub fn colleague(&self, role: &'static str) -> Self {
        Self {
            actor_id: Uuid::new_v4(),
            organization_id: self.organization_id,
            role,
        }
    }

    pub fn request(&self, method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-actor-id", self.actor_id.to_string())
            .header("x-organization-id", self.organization_id.to_string())
            .header("x-actor-role", self.role);

        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }
}

pub fn anonymous_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Audit store whose every operation fails
pub struct FailingAuditStore;

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn insert(&self, _event: &AuditEvent) -> audit_engine::Result<()> {
        Err(AuditError::StorageError("connection refused".to_string()))
    }

    async fn list(&self, _organization_id: Uuid, _filter: &AuditFilter) -> audit_engine::Result<Vec<AuditEvent>> {
        Err(AuditError::StorageError("connection refused".to_string()))
    }

    async fn count_by_category_severity(
        &self,
        _organization_id: Uuid,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> audit_engine::Result<Vec<SeverityGroup>> {
        Err(AuditError::StorageError("connection refused".to_string()))
    }

    async fn purge_older_than(&self, _cutoff: DateTime<Utc>, _severities: &[Severity]) -> audit_engine::Result<u64> {
        Err(AuditError::StorageError("connection refused".to_string()))
    }
}

/// Audit store whose writes never complete
pub struct HangingAuditStore;

#[async_trait]
impl AuditStore for HangingAuditStore {
    async fn insert(&self, _event: &AuditEvent) -> audit_engine::Result<()> {
        std::future::pending().await
    }

    async fn list(&self, _organization_id: Uuid, _filter: &AuditFilter) -> audit_engine::Result<Vec<AuditEvent>> {
        Ok(Vec::new())
    }

    async fn count_by_category_severity(
        &self,
        _organization_id: Uuid,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> audit_engine::Result<Vec<SeverityGroup>> {
        Ok(Vec::new())
    }

    async fn purge_older_than(&self, _cutoff: DateTime<Utc>, _severities: &[Severity]) -> audit_engine::Result<u64> {
        Ok(0)
    }
}

/// Approval store whose every operation fails
pub struct FailingApprovalStore;

#[async_trait]
impl ApprovalStore for FailingApprovalStore {
    async fn create(&self, _request: NewApprovalRequest) -> approval_engine::Result<ApprovalRequest> {
        Err(ApprovalError::StorageError("connection refused".to_string()))
    }

    async fn get(&self, _organization_id: Uuid, _id: Uuid) -> approval_engine::Result<Option<ApprovalRequest>> {
        Err(ApprovalError::StorageError("connection refused".to_string()))
    }

    async fn list(
        &self,
        _organization_id: Uuid,
        _status: Option<ApprovalStatus>,
    ) -> approval_engine::Result<Vec<ApprovalRequest>> {
        Err(ApprovalError::StorageError("connection refused".to_string()))
    }
}
