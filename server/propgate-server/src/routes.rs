use std::sync::Arc;

use approval_engine::Action;
use audit_engine::Category;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, MethodRouter},
    Router,
};

use crate::{
    handlers::{approvals, audit, health},
    middleware::{approval_gate, audit_interceptor, AuditLayerState, AuditSpec, GateLayerState},
    server::PropGateServer,
};

/// Create health check routes
pub fn health_routes() -> Router<PropGateServer> {
    Router::new().route("/health", get(health::health_check))
}

/// Create audit log routes
pub fn audit_routes() -> Router<PropGateServer> {
    Router::new()
        .route("/audit/events", get(audit::list_events).post(audit::submit_event))
        .route("/audit/stats", get(audit::stats))
}

/// Create approval request routes
pub fn approval_routes() -> Router<PropGateServer> {
    Router::new()
        .route("/approvals", get(approvals::list_approvals))
        .route("/approvals/:id", get(approvals::get_approval))
}

/// Create all gateway routes
pub fn create_routes() -> Router<PropGateServer> {
    Router::new()
        .merge(health_routes())
        .nest(
            "/api/v1",
            Router::new()
                .merge(audit_routes())
                .merge(approval_routes()),
        )
}

/// A business operation placed behind the gateway
#[derive(Debug, Clone)]
pub struct ProtectedOperation {
    /// Resource type the approval policy is keyed on, e.g. `expense`
    pub resource_type: String,
    pub action: Action,
    pub category: Category,
    /// Label recorded on the audit event, e.g. `create_expense`
    pub audit_action: String,
}

impl ProtectedOperation {
    pub fn new(
        resource_type: impl Into<String>,
        action: Action,
        category: Category,
        audit_action: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            action,
            category,
            audit_action: audit_action.into(),
        }
    }

    pub fn audit_spec(&self) -> AuditSpec {
        AuditSpec::new(self.category, self.resource_type.clone(), self.audit_action.clone())
    }
}

/// Record one audit event per call of `route`.
pub fn audited(server: &PropGateServer, spec: AuditSpec, route: MethodRouter<PropGateServer>) -> MethodRouter<PropGateServer> {
    let state = AuditLayerState {
        recorder: server.recorder.clone(),
        spec: Arc::new(spec),
    };
    route.layer(from_fn_with_state(state, audit_interceptor))
}

/// Put `route` behind the approval gate and the response interceptor.
///
/// The gate runs first; a deferred call returns 202 without reaching the
/// handler or the interceptor.
pub fn protected(
    server: &PropGateServer,
    operation: ProtectedOperation,
    route: MethodRouter<PropGateServer>,
) -> MethodRouter<PropGateServer> {
    let gate = GateLayerState {
        policy: server.policy.clone(),
        resource_type: Arc::from(operation.resource_type.as_str()),
        action: operation.action,
    };
    audited(server, operation.audit_spec(), route).layer(from_fn_with_state(gate, approval_gate))
}
