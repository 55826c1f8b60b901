//! Approval gate in front of protected mutating handlers.
//!
//! The policy decision is taken before the handler runs. A deferred call
//! never reaches the handler; the caller gets 202 with the id of the pending
//! approval request instead.

use std::sync::Arc;

use approval_engine::{Action, GateRequest, PolicyDecision, PolicyEngine};
use axum::{
    extract::{RawPathParams, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::{buffer_body, payload_from_bytes};
use crate::middleware::auth_context::AuthContext;

/// State handed to [`approval_gate`] for one protected route
#[derive(Clone)]
pub struct GateLayerState {
    pub policy: Arc<PolicyEngine>,
    pub resource_type: Arc<str>,
    pub action: Action,
}

/// Body returned instead of the handler's response when a call is deferred
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredResponse {
    pub success: bool,
    pub message: String,
    pub approval_id: Uuid,
    pub requires_approval: bool,
}

impl DeferredResponse {
    pub fn new(approval_id: Uuid) -> Self {
        Self {
            success: true,
            message: "Request submitted for approval".to_string(),
            approval_id,
            requires_approval: true,
        }
    }
}

impl IntoResponse for DeferredResponse {
    fn into_response(self) -> Response {
        (StatusCode::ACCEPTED, Json(self)).into_response()
    }
}

pub async fn approval_gate(
    State(gate): State<GateLayerState>,
    path: Option<RawPathParams>,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = match AuthContext::from_headers(request.headers()) {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };
    request.extensions_mut().insert(ctx.clone());

    let (request, payload) = if gate.action.is_read() {
        (request, JsonValue::Null)
    } else {
        match buffer_body(request).await {
            Ok((request, bytes)) => (request, bytes.as_ref().map_or(JsonValue::Null, payload_from_bytes)),
            Err(e) => return e.into_response(),
        }
    };

    let resource_id = path
        .as_ref()
        .and_then(|params| params.iter().find(|(name, _)| *name == "id").map(|(_, value)| value.to_string()))
        .or_else(|| payload_resource_id(&payload));

    let decision = gate
        .policy
        .evaluate(GateRequest {
            organization_id: ctx.organization_id,
            actor_id: ctx.actor_id,
            role: ctx.role,
            resource_type: &gate.resource_type,
            action: gate.action,
            resource_id: resource_id.as_deref(),
            payload: &payload,
        })
        .await;

    match decision {
        PolicyDecision::Deferred { approval_id } => DeferredResponse::new(approval_id).into_response(),
        PolicyDecision::Allow(_) => next.run(request).await,
    }
}

/// `id` field of the submitted payload, when the route carries none
fn payload_resource_id(payload: &JsonValue) -> Option<String> {
    match payload.get("id")? {
        JsonValue::String(id) => Some(id.clone()),
        JsonValue::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
