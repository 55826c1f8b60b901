//! Approval gate policy
//!
//! Decides whether a mutating operation may run now or has to wait for a
//! human decision. Rules are applied in order:
//!
//! 1. privileged roles (`super_admin`, `admin`) are always allowed
//! 2. reads are always allowed
//! 3. actions not configured as gated for the resource type are allowed
//! 4. expense creation below the configured amount threshold is allowed
//! 5. anything else is deferred: a pending [`ApprovalRequest`] is stored
//!
//! If storing the request fails the engine fails open and allows the
//! operation, logging the failure. There is no de-duplication: two identical
//! attempts each create their own pending request.
//!
//! [`ApprovalRequest`]: crate::request::ApprovalRequest

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::ApprovalError;
use crate::request::{NewApprovalRequest, TargetResource};
use crate::store::ApprovalStore;

pub const DEFAULT_EXPENSE_AMOUNT_THRESHOLD: f64 = 500.0;

/// Role tiers, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Agent,
    Tenant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Agent => "agent",
            Self::Tenant => "tenant",
        }
    }

    /// The two highest tiers bypass approval gates and may read the audit log.
    pub fn is_privileged(self) -> bool {
        matches!(self, Self::SuperAdmin | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ApprovalError;

    /// Accepts `super_admin`, `SuperAdmin`, `super-admin`, `Agent`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "superadmin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "agent" => Ok(Self::Agent),
            "tenant" => Ok(Self::Tenant),
            _ => Err(ApprovalError::InvalidRole(s.to_string())),
        }
    }
}

/// The operation a caller is attempting on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn is_read(self) -> bool {
        matches!(self, Self::Read)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(ApprovalError::InvalidAction(other.to_string())),
        }
    }
}

/// Which resource/action pairs require approval, and the expense bypass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatePolicy {
    /// Expense creations strictly below this amount skip the gate
    pub expense_amount_threshold: f64,
    /// Resource type (lowercase) -> gated actions
    pub gated_actions: HashMap<String, Vec<Action>>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        let gated_actions = [
            ("property", vec![Action::Update, Action::Delete]),
            ("tenant", vec![Action::Delete]),
            ("payment", vec![Action::Update, Action::Delete]),
            ("expense", vec![Action::Create, Action::Update, Action::Delete]),
            ("user", vec![Action::Delete]),
        ]
        .into_iter()
        .map(|(resource, actions)| (resource.to_string(), actions))
        .collect();

        Self {
            expense_amount_threshold: DEFAULT_EXPENSE_AMOUNT_THRESHOLD,
            gated_actions,
        }
    }
}

impl GatePolicy {
    pub fn is_gated(&self, resource_type: &str, action: Action) -> bool {
        self.gated_actions
            .get(&resource_type.to_ascii_lowercase())
            .is_some_and(|actions| actions.contains(&action))
    }

    /// Expense creation with a numeric `amount` below the threshold.
    fn is_small_expense(&self, resource_type: &str, action: Action, payload: &JsonValue) -> bool {
        resource_type.eq_ignore_ascii_case("expense")
            && action == Action::Create
            && payload_amount(payload).is_some_and(|amount| amount < self.expense_amount_threshold)
    }
}

/// Numeric `amount` field of a payload. Numeric strings are accepted.
pub fn payload_amount(payload: &JsonValue) -> Option<f64> {
    match payload.get("amount")? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// An attempted operation as seen by the gate.
#[derive(Debug, Clone)]
pub struct GateRequest<'a> {
    pub organization_id: Uuid,
    pub actor_id: Uuid,
    pub role: Role,
    pub resource_type: &'a str,
    pub action: Action,
    pub resource_id: Option<&'a str>,
    pub payload: &'a JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    Privileged,
    ReadOnly,
    NotGated,
    BelowThreshold,
    /// The approval store failed; the operation is let through
    StoreUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow(AllowReason),
    Deferred { approval_id: Uuid },
}

impl PolicyDecision {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred { .. })
    }
}

pub struct PolicyEngine {
    policy: GatePolicy,
    store: Arc<dyn ApprovalStore>,
}

impl PolicyEngine {
    pub fn new(policy: GatePolicy, store: Arc<dyn ApprovalStore>) -> Self {
        Self { policy, store }
    }

    pub fn policy(&self) -> &GatePolicy {
        &self.policy
    }

    /// Decide whether `request` may proceed. Never returns an error; a
    /// failing approval store results in `Allow(StoreUnavailable)`.
    pub async fn evaluate(&self, request: GateRequest<'_>) -> PolicyDecision {
        if let Some(reason) = self.bypass_reason(&request) {
            debug!(
                resource_type = request.resource_type,
                action = %request.action,
                role = %request.role,
                reason = ?reason,
                "Approval gate bypassed"
            );
            return PolicyDecision::Allow(reason);
        }

        let pending = NewApprovalRequest {
            organization_id: request.organization_id,
            requested_by: request.actor_id,
            resource_type: request.resource_type.to_ascii_lowercase(),
            resource_id: TargetResource::from_optional(request.resource_id),
            action: request.action.as_str().to_string(),
            payload: request.payload.clone(),
        };

        match self.store.create(pending).await {
            Ok(created) => {
                info!(
                    approval_id = %created.id,
                    organization_id = %created.organization_id,
                    resource_type = %created.resource_type,
                    action = %created.action,
                    "Operation deferred pending approval"
                );
                PolicyDecision::Deferred {
                    approval_id: created.id,
                }
            }
            Err(e) => {
                error!(
                    error = %e,
                    organization_id = %request.organization_id,
                    resource_type = request.resource_type,
                    action = %request.action,
                    "Failed to persist approval request; allowing operation"
                );
                PolicyDecision::Allow(AllowReason::StoreUnavailable)
            }
        }
    }

    fn bypass_reason(&self, request: &GateRequest<'_>) -> Option<AllowReason> {
        if request.role.is_privileged() {
            Some(AllowReason::Privileged)
        } else if request.action.is_read() {
            Some(AllowReason::ReadOnly)
        } else if !self.policy.is_gated(request.resource_type, request.action) {
            Some(AllowReason::NotGated)
        } else if self
            .policy
            .is_small_expense(request.resource_type, request.action, request.payload)
        {
            Some(AllowReason::BelowThreshold)
        } else {
            None
        }
    }
}
