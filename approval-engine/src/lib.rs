//! Approval gating for PropGate
//!
//! Mutating operations on sensitive resources can be deferred instead of
//! executed. The [`PolicyEngine`] decides per attempt whether the caller may
//! proceed; when it may not, the full payload is captured as a pending
//! [`ApprovalRequest`] for a human to resolve later.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use approval_engine::{Action, GatePolicy, GateRequest, InMemoryApprovalStore, PolicyEngine, Role};
//! use serde_json::json;
//! use uuid::Uuid;
//!
//! # async fn run() {
//! let engine = PolicyEngine::new(GatePolicy::default(), Arc::new(InMemoryApprovalStore::new()));
//! let payload = json!({"amount": 1200, "description": "Boiler replacement"});
//!
//! let decision = engine
//!     .evaluate(GateRequest {
//!         organization_id: Uuid::new_v4(),
//!         actor_id: Uuid::new_v4(),
//!         role: Role::Agent,
//!         resource_type: "expense",
//!         action: Action::Create,
//!         resource_id: None,
//!         payload: &payload,
//!     })
//!     .await;
//! assert!(decision.is_deferred());
//! # }
//! ```

pub mod error;
pub mod policy;
pub mod request;
pub mod store;

pub use error::*;
pub use policy::{
    payload_amount, Action, AllowReason, GatePolicy, GateRequest, PolicyDecision, PolicyEngine, Role,
    DEFAULT_EXPENSE_AMOUNT_THRESHOLD,
};
pub use request::{ApprovalRequest, ApprovalStatus, NewApprovalRequest, TargetResource, NEW_RESOURCE_SENTINEL};
pub use store::{ApprovalStore, InMemoryApprovalStore, PgApprovalStore};
