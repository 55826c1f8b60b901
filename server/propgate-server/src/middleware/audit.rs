//! Response interceptor: one audit event per protected call.
//!
//! The handler's response is returned untouched. The event is built once the
//! status is known and handed to the recorder on a detached task, so audit
//! latency and audit failures never reach the caller.

use std::sync::Arc;

use audit_engine::{category_severity, AuditRecorder, Category, NewAuditEvent};
use axum::{
    extract::{OriginalUri, RawPathParams, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

use super::{buffer_body, is_read_method, payload_from_bytes};
use crate::middleware::auth_context::AuthContext;

/// What a protected route records: the action label is supplied per route,
/// never derived from the HTTP method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSpec {
    pub category: Category,
    pub resource_type: String,
    pub action: String,
}

impl AuditSpec {
    pub fn new(category: Category, resource_type: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            category,
            resource_type: resource_type.into(),
            action: action.into(),
        }
    }
}

#[derive(Clone)]
pub struct AuditLayerState {
    pub recorder: AuditRecorder,
    pub spec: Arc<AuditSpec>,
}

/// Set on the request by the outermost interceptor so nested ones pass
/// through.
#[derive(Debug, Clone, Copy)]
struct AuditMarker;

/// What ends up under the `body` metadata key
enum CapturedBody {
    NotApplicable,
    Payload(JsonValue),
    Omitted,
}

pub async fn audit_interceptor(
    State(layer): State<AuditLayerState>,
    path: Option<RawPathParams>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<AuditMarker>().is_some() {
        return next.run(request).await;
    }
    request.extensions_mut().insert(AuditMarker);

    let method = request.method().clone();
    let url = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri().to_string(), |OriginalUri(uri)| uri.to_string());
    let actor = request
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .or_else(|| AuthContext::from_headers(request.headers()).ok());
    let resource_id = path
        .as_ref()
        .and_then(|params| params.iter().find(|(name, _)| *name == "id").map(|(_, value)| value.to_string()));

    let (response, body) = if is_read_method(&method) {
        (next.run(request).await, CapturedBody::NotApplicable)
    } else {
        match buffer_body(request).await {
            Ok((request, Some(bytes))) => (next.run(request).await, CapturedBody::Payload(payload_from_bytes(&bytes))),
            Ok((request, None)) => (next.run(request).await, CapturedBody::Omitted),
            Err(e) => (e.into_response(), CapturedBody::Omitted),
        }
    };

    let Some(actor) = actor else {
        debug!(target: "audit", url = %url, "No actor on request; nothing to audit");
        return response;
    };

    let status = response.status();
    let mut metadata = json!({
        "method": method.as_str(),
        "url": url,
        "status_code": status.as_u16(),
    });
    if let JsonValue::Object(map) = &mut metadata {
        match body {
            CapturedBody::Payload(payload) => {
                map.insert("body".to_string(), payload);
            }
            CapturedBody::Omitted => {
                map.insert("body_omitted".to_string(), JsonValue::Bool(true));
            }
            CapturedBody::NotApplicable => {}
        }
    }

    let spec = &layer.spec;
    let mut event = NewAuditEvent::new(
        actor.scope(),
        spec.category,
        spec.action.clone(),
        spec.resource_type.clone(),
        format!("{} {}", spec.resource_type, spec.action),
    )
    .with_severity(category_severity(spec.category, &spec.action))
    .with_metadata(metadata);
    if let Some(resource_id) = resource_id {
        event = event.with_resource_id(resource_id);
    }
    if status.as_u16() >= 400 {
        event = event.failed(format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("error")
        ));
    }

    drop(layer.recorder.record_detached(event));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_read_methods_carry_no_body() {
        assert!(is_read_method(&Method::GET));
        assert!(is_read_method(&Method::HEAD));
        assert!(is_read_method(&Method::OPTIONS));
        assert!(!is_read_method(&Method::POST));
        assert!(!is_read_method(&Method::DELETE));
    }
}
