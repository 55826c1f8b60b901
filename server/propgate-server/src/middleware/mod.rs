pub mod approval_gate;
pub mod audit;
pub mod auth_context;
pub mod request_context;

pub use approval_gate::{approval_gate, DeferredResponse, GateLayerState};
pub use audit::{audit_interceptor, AuditLayerState, AuditSpec};
pub use auth_context::AuthContext;
pub use request_context::ClientInfo;

use std::time::Instant;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::Request,
    http::Method,
    middleware::Next,
    response::Response,
};
use serde_json::Value as JsonValue;

use crate::error::ApiError;

/// Largest request body the gate and interceptor will buffer
pub const MAX_BUFFERED_BODY: usize = 2 * 1024 * 1024;

/// Request timing middleware
pub async fn request_timing_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        duration_ms = start.elapsed().as_millis(),
        status = response.status().as_u16(),
        "Request processed"
    );

    response
}

pub(crate) fn is_read_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Read the whole body and put an identical copy back on the request.
///
/// Only bodies whose size is known up front and within [`MAX_BUFFERED_BODY`]
/// are read. Anything else is passed through unread and yields `None`.
pub(crate) async fn buffer_body(request: Request) -> Result<(Request, Option<Bytes>), ApiError> {
    let within_limit = request
        .body()
        .size_hint()
        .upper()
        .and_then(|len| usize::try_from(len).ok())
        .is_some_and(|len| len <= MAX_BUFFERED_BODY);
    if !within_limit {
        return Ok((request, None));
    }

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BUFFERED_BODY)
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {}", e)))?;

    Ok((Request::from_parts(parts, Body::from(bytes.clone())), Some(bytes)))
}

/// Interpret a request body as JSON. Non-JSON bodies are kept as text, an
/// empty body becomes `null`.
pub(crate) fn payload_from_bytes(bytes: &Bytes) -> JsonValue {
    if bytes.is_empty() {
        return JsonValue::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_from_bytes() {
        assert_eq!(payload_from_bytes(&Bytes::new()), JsonValue::Null);
        assert_eq!(payload_from_bytes(&Bytes::from_static(br#"{"amount":12}"#)), json!({"amount": 12}));
        assert_eq!(payload_from_bytes(&Bytes::from_static(b"name=x")), json!("name=x"));
    }

    #[tokio::test]
    async fn test_buffer_body_preserves_bytes() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/expenses")
            .body(Body::from(r#"{"amount":1000}"#))
            .unwrap();

        let (request, bytes) = buffer_body(request).await.unwrap();
        let replayed = axum::body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes, Some(replayed));
    }

    #[tokio::test]
    async fn test_buffer_body_passes_oversized_bodies_through() {
        let upload = vec![b'x'; MAX_BUFFERED_BODY + 1];
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/documents")
            .body(Body::from(upload.clone()))
            .unwrap();

        let (request, bytes) = buffer_body(request).await.unwrap();
        assert!(bytes.is_none());
        let forwarded = axum::body::to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(forwarded.len(), upload.len());
    }
}
