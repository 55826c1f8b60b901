// Approval request types
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::ApprovalError;

/// Stored in place of a resource id when the gated operation would have
/// created the resource.
pub const NEW_RESOURCE_SENTINEL: &str = "new";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Transitions are one-way: pending may resolve to approved or rejected,
    /// and a resolved request never changes again.
    pub fn can_transition_to(self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected)
        )
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = ApprovalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(ApprovalError::InvalidStatus(other.to_string())),
        }
    }
}

/// The resource an approval request refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetResource {
    /// The operation would create the resource; it has no id yet
    New,
    Existing(String),
}

impl TargetResource {
    pub fn from_optional(resource_id: Option<&str>) -> Self {
        match resource_id {
            Some(id) if !id.is_empty() => Self::Existing(id.to_string()),
            _ => Self::New,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::New => NEW_RESOURCE_SENTINEL,
            Self::Existing(id) => id,
        }
    }
}

impl From<String> for TargetResource {
    fn from(value: String) -> Self {
        if value == NEW_RESOURCE_SENTINEL {
            Self::New
        } else {
            Self::Existing(value)
        }
    }
}

impl From<TargetResource> for String {
    fn from(value: TargetResource) -> Self {
        value.as_str().to_string()
    }
}

/// A deferred mutating operation waiting for a human decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub requested_by: Uuid,
    pub resource_type: String,
    pub resource_id: TargetResource,
    pub action: String,
    /// Full payload of the attempted operation
    pub payload: JsonValue,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewApprovalRequest {
    pub organization_id: Uuid,
    pub requested_by: Uuid,
    pub resource_type: String,
    pub resource_id: TargetResource,
    pub action: String,
    pub payload: JsonValue,
}

impl NewApprovalRequest {
    /// Build the pending record. Creation is the only place a status is set
    /// by this crate.
    pub fn into_pending(self, now: DateTime<Utc>) -> ApprovalRequest {
        ApprovalRequest {
            id: Uuid::new_v4(),
            organization_id: self.organization_id,
            requested_by: self.requested_by,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            action: self.action,
            payload: self.payload,
            status: ApprovalStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
