//! Audit event recorder
//!
//! The recorder is the single write path into the audit store. Its public
//! contract is that it never fails: persistence errors are logged on the
//! `audit` target and the event is dropped (at-most-once delivery, no retry
//! queue). Callers that cannot tolerate a lost event must not rely on it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::entry::{AuditScope, Category, NewAuditEvent, Severity};
use crate::store::AuditStore;

/// Writes normalized audit events to an [`AuditStore`].
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Normalize and persist one event. Never returns an error.
    ///
    /// The timestamp is taken here, at write time, not when the triggering
    /// request arrived.
    pub async fn record(&self, event: NewAuditEvent) {
        let event = event.into_event(Utc::now());

        match self.store.insert(&event).await {
            Ok(()) => debug!(
                target: "audit",
                event_id = %event.id,
                organization_id = %event.organization_id,
                action = %event.action,
                "Audit event recorded"
            ),
            Err(e) => error!(
                target: "audit",
                error = %e,
                organization_id = %event.organization_id,
                action = %event.action,
                category = %event.category,
                "Failed to persist audit event; event dropped"
            ),
        }
    }

    /// Dispatch [`AuditRecorder::record`] onto the runtime without waiting
    /// for it. The handle is only useful to tests; production callers drop it.
    pub fn record_detached(&self, event: NewAuditEvent) -> JoinHandle<()> {
        let recorder = self.clone();
        tokio::spawn(async move { recorder.record(event).await })
    }

    /// Authentication attempt (login, logout, token refresh, ...).
    pub async fn log_auth(&self, scope: AuditScope, action: &str, success: bool, metadata: JsonValue) {
        let mut event = NewAuditEvent::new(
            scope,
            Category::Auth,
            action,
            "auth",
            format!("Authentication event: {}", action),
        )
        .with_metadata(metadata);
        if let Some(actor_id) = scope.actor_id {
            event = event.with_resource_id(actor_id.to_string());
        }
        let event = if success {
            event.with_severity(Severity::Low)
        } else {
            event
                .with_severity(Severity::Medium)
                .failed(format!("Authentication {} failed", action))
        };
        self.record(event).await;
    }

    pub async fn log_property(&self, scope: AuditScope, action: &str, property_id: &str, details: JsonValue) {
        self.record(escalating_event(scope, Category::Property, "property", action, property_id, details))
            .await;
    }

    pub async fn log_tenant(&self, scope: AuditScope, action: &str, tenant_id: &str, details: JsonValue) {
        self.record(escalating_event(scope, Category::Tenant, "tenant", action, tenant_id, details))
            .await;
    }

    pub async fn log_user(&self, scope: AuditScope, action: &str, user_id: &str, details: JsonValue) {
        self.record(escalating_event(scope, Category::User, "user", action, user_id, details))
            .await;
    }

    /// Money movement is always at least `medium`.
    pub async fn log_payment(&self, scope: AuditScope, action: &str, payment_id: &str, details: JsonValue) {
        let event = NewAuditEvent::new(
            scope,
            Category::Payment,
            action,
            "payment",
            format!("Payment {}", action),
        )
        .with_resource_id(payment_id)
        .with_severity(Severity::Medium)
        .with_metadata(details);
        self.record(event).await;
    }

    /// Security-relevant occurrence; defaults to `high` when no severity is given.
    pub async fn log_security(
        &self,
        scope: AuditScope,
        action: &str,
        description: &str,
        severity: Option<Severity>,
        details: JsonValue,
    ) {
        let event = NewAuditEvent::new(scope, Category::Security, action, "security", description)
            .with_severity(severity.unwrap_or(Severity::High))
            .with_metadata(details);
        self.record(event).await;
    }

    /// System-generated event with no acting user.
    pub async fn log_system(
        &self,
        organization_id: uuid::Uuid,
        action: &str,
        description: &str,
        severity: Option<Severity>,
        details: JsonValue,
    ) {
        let event = NewAuditEvent::new(
            AuditScope::system(organization_id),
            Category::System,
            action,
            "system",
            description,
        )
        .with_severity(severity.unwrap_or_default())
        .with_metadata(details);
        self.record(event).await;
    }
}

/// Whether an action label names a deletion.
pub fn is_delete_action(action: &str) -> bool {
    action.to_ascii_lowercase().contains("delete")
}

/// Severity the domain entry points assign to `action` in `category`.
///
/// Deletions escalate to `high` only for properties, tenants and users.
pub fn category_severity(category: Category, action: &str) -> Severity {
    match category {
        Category::Property | Category::Tenant | Category::User if is_delete_action(action) => Severity::High,
        Category::Payment => Severity::Medium,
        Category::Security => Severity::High,
        _ => Severity::Low,
    }
}

fn escalating_event(
    scope: AuditScope,
    category: Category,
    resource_type: &str,
    action: &str,
    resource_id: &str,
    details: JsonValue,
) -> NewAuditEvent {
    let severity = category_severity(category, action);
    let mut label = resource_type.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    NewAuditEvent::new(scope, category, action, resource_type, format!("{} {}", label, action))
        .with_resource_id(resource_id)
        .with_severity(severity)
        .with_metadata(details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::store::{AuditFilter, InMemoryAuditStore, MockAuditStore};
    use serde_json::json;
    use uuid::Uuid;

    fn recorder() -> (Arc<InMemoryAuditStore>, AuditRecorder) {
        let store = Arc::new(InMemoryAuditStore::new());
        (store.clone(), AuditRecorder::new(store))
    }

    #[tokio::test]
    async fn test_record_swallows_store_failures() {
        let mut store = MockAuditStore::new();
        store
            .expect_insert()
            .times(1)
            .returning(|_| Err(AuditError::StorageError("connection refused".to_string())));
        let recorder = AuditRecorder::new(Arc::new(store));

        let org = Uuid::new_v4();
        recorder
            .record(NewAuditEvent::new(AuditScope::system(org), Category::System, "boot", "system", "Boot"))
            .await;
    }

    #[tokio::test]
    async fn test_record_stamps_time_at_write() {
        let (store, recorder) = recorder();
        let org = Uuid::new_v4();
        let before = Utc::now();

        recorder
            .record(NewAuditEvent::new(AuditScope::system(org), Category::System, "boot", "system", "Boot"))
            .await;

        let stored = store.snapshot();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].timestamp >= before);
        assert!(stored[0].timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn test_detached_record_completes_in_background() {
        let (store, recorder) = recorder();
        let org = Uuid::new_v4();

        let handle = recorder.record_detached(NewAuditEvent::new(
            AuditScope::system(org),
            Category::System,
            "nightly_report",
            "system",
            "Report generated",
        ));
        handle.await.unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_actions_escalate_for_property_tenant_and_user() {
        let (store, recorder) = recorder();
        let org = Uuid::new_v4();
        let scope = AuditScope::actor(org, Uuid::new_v4());

        recorder.log_property(scope, "delete_property", "p-1", json!({})).await;
        recorder.log_tenant(scope, "bulk_delete", "t-1", json!({})).await;
        recorder.log_user(scope, "Delete", "u-1", json!({})).await;
        recorder.log_property(scope, "update_property", "p-1", json!({})).await;

        let events = store.snapshot();
        let severities: Vec<Severity> = events.iter().map(|e| e.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::High, Severity::High, Severity::High, Severity::Low]
        );
        assert_eq!(events[0].description, "Property delete_property");
        assert_eq!(events[1].category, Category::Tenant);
        assert_eq!(events[2].resource_type, "user");
    }

    #[tokio::test]
    async fn test_payment_delete_is_not_escalated_past_medium() {
        let (store, recorder) = recorder();
        let scope = AuditScope::actor(Uuid::new_v4(), Uuid::new_v4());

        recorder.log_payment(scope, "delete_payment", "pay-9", json!({"amount": 120})).await;

        let event = &store.snapshot()[0];
        assert_eq!(event.severity, Severity::Medium);
        assert_eq!(event.resource_id.as_deref(), Some("pay-9"));
    }

    #[test]
    fn test_category_severity() {
        assert_eq!(category_severity(Category::Property, "DELETE_property"), Severity::High);
        assert_eq!(category_severity(Category::User, "delete"), Severity::High);
        assert_eq!(category_severity(Category::Tenant, "update_tenant"), Severity::Low);
        assert_eq!(category_severity(Category::Payment, "delete_payment"), Severity::Medium);
        assert_eq!(category_severity(Category::System, "delete_cache"), Severity::Low);
        assert_eq!(category_severity(Category::Security, "lockout"), Severity::High);
    }

    #[tokio::test]
    async fn test_failed_auth_is_recorded_as_unsuccessful() {
        let (store, recorder) = recorder();
        let org = Uuid::new_v4();
        let actor = Uuid::new_v4();

        recorder
            .log_auth(AuditScope::actor(org, actor), "login", false, json!({"reason": "bad password"}))
            .await;

        let events = store.list(org, &AuditFilter::default()).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
        assert_eq!(events[0].severity, Severity::Medium);
        assert_eq!(events[0].resource_id, Some(actor.to_string()));
        assert!(events[0].error_message.is_some());
    }

    #[tokio::test]
    async fn test_security_and_system_defaults() {
        let (store, recorder) = recorder();
        let org = Uuid::new_v4();

        recorder
            .log_security(
                AuditScope::actor(org, Uuid::new_v4()),
                "permission_escalation",
                "Role changed to admin",
                None,
                json!({}),
            )
            .await;
        recorder.log_system(org, "retention_sweep", "Purged old events", None, json!({"deleted": 4})).await;

        let events = store.snapshot();
        assert_eq!(events[0].severity, Severity::High);
        assert_eq!(events[1].severity, Severity::Low);
        assert_eq!(events[1].actor_id, None);
    }
}
