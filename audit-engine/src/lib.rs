//! Audit logging engine for PropGate
//!
//! This crate records one immutable, organization-scoped event per sensitive
//! operation and serves the read side of that log:
//! - Normalizing recorder that never fails its caller ([`AuditRecorder`])
//! - Filtered, paginated listing and two-level rollup statistics
//!   ([`AuditQueryService`])
//! - Age/severity based retention ([`RetentionSweeper`])
//! - Pluggable storage: PostgreSQL for production, in-memory for tests
//!
//! # Event Categories
//!
//! - **Auth**: login, logout, token refresh
//! - **Property / Tenant / Payment / User**: business record changes
//! - **Security**: permission changes, suspicious access
//! - **System**: scheduled jobs, maintenance
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use audit_engine::{AuditRecorder, AuditScope, InMemoryAuditStore};
//! use serde_json::json;
//! use uuid::Uuid;
//!
//! # async fn run() {
//! let store = Arc::new(InMemoryAuditStore::new());
//! let recorder = AuditRecorder::new(store);
//!
//! let scope = AuditScope::actor(Uuid::new_v4(), Uuid::new_v4());
//! recorder
//!     .log_property(scope, "delete_property", "prop-42", json!({"reason": "sold"}))
//!     .await;
//! # }
//! ```

pub mod entry;
pub mod error;
pub mod query;
pub mod recorder;
pub mod retention;
pub mod store;

pub use entry::*;
pub use error::*;
pub use query::{rollup, AuditQueryService, CategoryRollup, SeverityCount, DEFAULT_STATS_WINDOW_DAYS};
pub use recorder::{category_severity, is_delete_action, AuditRecorder};
pub use retention::{RetentionSweeper, DEFAULT_RETENTION_DAYS};
pub use store::{AuditFilter, AuditStore, InMemoryAuditStore, PgAuditStore, SeverityGroup, DEFAULT_LIST_LIMIT};
