//! PropGate server - audit trail and approval gating for property management
//!
//! The gateway sits in front of business handlers. Mutating calls pass the
//! approval gate first; calls that reach their handler are recorded by the
//! response interceptor. The server also exposes the audit log and pending
//! approval requests to privileged roles.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

// Re-export commonly used types
pub use config::GatewayConfig;
pub use error::*;
pub use routes::{audited, protected, ProtectedOperation};
pub use server::PropGateServer;

use axum::{middleware::from_fn, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Create the main application router with the gateway's own routes
pub fn create_app(server: PropGateServer) -> Router {
    create_app_with_routes(server, Router::new())
}

/// Create the application router, merging in business routes that were
/// wrapped with [`protected`] or [`audited`].
pub fn create_app_with_routes(server: PropGateServer, business_routes: Router<PropGateServer>) -> Router {
    routes::create_routes()
        .merge(business_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(middleware::request_timing_middleware)),
        )
        .with_state(server)
}
