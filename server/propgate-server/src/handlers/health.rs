use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::PropGateServer;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    /// `postgres` or `memory`
    pub storage: String,
}

/// Liveness probe. Storage reachability is not checked here.
pub async fn health_check(State(server): State<PropGateServer>) -> Json<HealthResponse> {
    let storage = if server.config.database.url.is_some() {
        "postgres"
    } else {
        "memory"
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: storage.to_string(),
    })
}
