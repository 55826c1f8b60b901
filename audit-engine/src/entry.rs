// Audit event types and structures
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::AuditError;

/// Severity of an audit event.
///
/// Ordered from least to most severe. `High` and `Critical` events are never
/// removed by the retention sweeper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Severities the retention sweeper is allowed to delete.
    pub const PURGEABLE: [Severity; 2] = [Self::Low, Self::Medium];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn is_purgeable(self) -> bool {
        Self::PURGEABLE.contains(&self)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(AuditError::InvalidSeverity(other.to_string())),
        }
    }
}

/// Functional area an audit event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Auth,
    Property,
    Tenant,
    Payment,
    User,
    System,
    Security,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Self::Auth,
        Self::Property,
        Self::Tenant,
        Self::Payment,
        Self::User,
        Self::System,
        Self::Security,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Property => "property",
            Self::Tenant => "tenant",
            Self::Payment => "payment",
            Self::User => "user",
            Self::System => "system",
            Self::Security => "security",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| AuditError::InvalidCategory(s.to_string()))
    }
}

/// A persisted, immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Absent for system-generated events
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub description: String,
    pub severity: Severity,
    pub category: Category,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
    pub metadata: JsonValue,
    pub success: bool,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// An audit event as submitted by a caller, before normalization.
///
/// Optional fields are filled in by [`NewAuditEvent::into_event`]: severity
/// falls back to `low`, success to `true`, metadata to an empty object.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub organization_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub description: String,
    pub severity: Option<Severity>,
    pub category: Category,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub success: Option<bool>,
    pub error_message: Option<String>,
}

impl NewAuditEvent {
    pub fn new(
        scope: AuditScope,
        category: Category,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            organization_id: scope.organization_id,
            actor_id: scope.actor_id,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            description: description.into(),
            severity: None,
            category,
            before: None,
            after: None,
            metadata: None,
            success: None,
            error_message: None,
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_snapshots(mut self, before: Option<JsonValue>, after: Option<JsonValue>) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    /// Mark the event as a failed operation.
    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = Some(false);
        self.error_message = Some(error_message.into());
        self
    }

    /// Normalize into a persistable record stamped with `timestamp`.
    pub fn into_event(self, timestamp: DateTime<Utc>) -> AuditEvent {
        let success = self.success != Some(false);
        AuditEvent {
            id: Uuid::new_v4(),
            organization_id: self.organization_id,
            actor_id: self.actor_id,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            description: self.description,
            severity: self.severity.unwrap_or_default(),
            category: self.category,
            before: self.before,
            after: self.after,
            metadata: self
                .metadata
                .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new())),
            success,
            error_message: if success { None } else { self.error_message },
            timestamp,
        }
    }
}

/// Who an event is attributed to and which organization owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditScope {
    pub organization_id: Uuid,
    pub actor_id: Option<Uuid>,
}

impl AuditScope {
    pub fn actor(organization_id: Uuid, actor_id: Uuid) -> Self {
        Self {
            organization_id,
            actor_id: Some(actor_id),
        }
    }

    pub fn system(organization_id: Uuid) -> Self {
        Self {
            organization_id,
            actor_id: None,
        }
    }
}
