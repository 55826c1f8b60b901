use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::entry::{AuditEvent, Category, Severity};
use crate::error::Result;

pub mod postgres;

pub use postgres::PgAuditStore;

pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Filters for listing an organization's audit events.
///
/// `None` values act as wildcards. Time bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditFilter {
    pub actor_id: Option<Uuid>,
    pub category: Option<Category>,
    pub severity: Option<Severity>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: u32,
    pub skip: u32,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            actor_id: None,
            category: None,
            severity: None,
            resource_type: None,
            resource_id: None,
            start: None,
            end: None,
            limit: DEFAULT_LIST_LIMIT,
            skip: 0,
        }
    }
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        self.actor_id.map_or(true, |id| event.actor_id == Some(id))
            && self.category.map_or(true, |c| event.category == c)
            && self.severity.map_or(true, |s| event.severity == s)
            && self
                .resource_type
                .as_ref()
                .map_or(true, |t| &event.resource_type == t)
            && self
                .resource_id
                .as_ref()
                .map_or(true, |id| event.resource_id.as_ref() == Some(id))
            && self.start.map_or(true, |start| event.timestamp >= start)
            && self.end.map_or(true, |end| event.timestamp <= end)
    }
}

/// First aggregation stage: event count for one (category, severity) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeverityGroup {
    pub category: Category,
    pub severity: Severity,
    pub count: u64,
}

/// Persistence contract for audit events.
///
/// Events are append-only: there is no update operation, and deletion only
/// happens through [`AuditStore::purge_older_than`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a single event
    async fn insert(&self, event: &AuditEvent) -> Result<()>;

    /// List events for an organization, newest first
    async fn list(&self, organization_id: Uuid, filter: &AuditFilter) -> Result<Vec<AuditEvent>>;

    /// Count events per (category, severity) with a timestamp in `[from, to]`
    async fn count_by_category_severity(
        &self,
        organization_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SeverityGroup>>;

    /// Delete events older than `cutoff` whose severity is in `severities`.
    /// Returns the number of rows removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>, severities: &[Severity]) -> Result<u64>;
}

/// In-memory audit store for testing and development
#[derive(Default)]
pub struct InMemoryAuditStore {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Copy of every stored event, in insertion order
    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn insert(&self, event: &AuditEvent) -> Result<()> {
        self.events.write().push(event.clone());
        Ok(())
    }

    async fn list(&self, organization_id: Uuid, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        let mut matched: Vec<AuditEvent> = self
            .events
            .read()
            .iter()
            .filter(|event| event.organization_id == organization_id && filter.matches(event))
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(matched
            .into_iter()
            .skip(filter.skip as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn count_by_category_severity(
        &self,
        organization_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SeverityGroup>> {
        let mut groups: Vec<SeverityGroup> = Vec::new();
        let events = self.events.read();

        for event in events.iter().filter(|event| {
            event.organization_id == organization_id && event.timestamp >= from && event.timestamp <= to
        }) {
            match groups
                .iter_mut()
                .find(|g| g.category == event.category && g.severity == event.severity)
            {
                Some(group) => group.count += 1,
                None => groups.push(SeverityGroup {
                    category: event.category,
                    severity: event.severity,
                    count: 1,
                }),
            }
        }

        Ok(groups)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>, severities: &[Severity]) -> Result<u64> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|event| !(event.timestamp < cutoff && severities.contains(&event.severity)));
        Ok((before - events.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditScope, NewAuditEvent};
    use chrono::Duration;
    use serde_json::json;

    fn event(org: Uuid, category: Category, severity: Severity, age_days: i64) -> AuditEvent {
        NewAuditEvent::new(AuditScope::system(org), category, "update_property", "property", "Property update")
            .with_severity(severity)
            .into_event(Utc::now() - Duration::days(age_days))
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_organization_and_sorted_desc() {
        let store = InMemoryAuditStore::new();
        let org = Uuid::new_v4();
        let other_org = Uuid::new_v4();

        store.insert(&event(org, Category::Property, Severity::Low, 3)).await.unwrap();
        store.insert(&event(org, Category::Property, Severity::Low, 1)).await.unwrap();
        store.insert(&event(other_org, Category::Property, Severity::Low, 0)).await.unwrap();
        store.insert(&event(org, Category::Property, Severity::Low, 2)).await.unwrap();

        let listed = store.list(org, &AuditFilter::default()).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|e| e.organization_id == org));
        assert!(listed.windows(2).all(|pair| pair[0].timestamp >= pair[1].timestamp));
    }

    #[tokio::test]
    async fn test_list_applies_skip_and_limit_after_sorting() {
        let store = InMemoryAuditStore::new();
        let org = Uuid::new_v4();
        for age in 0..5 {
            store.insert(&event(org, Category::Tenant, Severity::Medium, age)).await.unwrap();
        }

        let filter = AuditFilter {
            limit: 2,
            skip: 1,
            ..AuditFilter::default()
        };
        let all = store.list(org, &AuditFilter::default()).await.unwrap();
        let page = store.list(org, &filter).await.unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, all[1].id);
        assert_eq!(page[1].id, all[2].id);
    }

    #[tokio::test]
    async fn test_filter_by_time_range_and_resource() {
        let store = InMemoryAuditStore::new();
        let org = Uuid::new_v4();
        let mut recent = event(org, Category::Payment, Severity::Medium, 1);
        recent.resource_id = Some("pay-1".to_string());
        store.insert(&recent).await.unwrap();
        store.insert(&event(org, Category::Payment, Severity::Medium, 10)).await.unwrap();

        let filter = AuditFilter {
            start: Some(Utc::now() - Duration::days(5)),
            end: Some(Utc::now()),
            resource_id: Some("pay-1".to_string()),
            ..AuditFilter::default()
        };
        let listed = store.list(org, &filter).await.unwrap();
        assert_eq!(listed, vec![recent]);
    }

    #[tokio::test]
    async fn test_metadata_round_trips_unchanged() {
        let store = InMemoryAuditStore::new();
        let org = Uuid::new_v4();
        let metadata = json!({
            "nested": {"list": [1, 2.5, "three", null, true], "empty": {}},
            "unicode": "café ☕",
            "big": 9_007_199_254_740_991_i64
        });
        let recorded = NewAuditEvent::new(AuditScope::system(org), Category::System, "import", "system", "Import")
            .with_metadata(metadata.clone())
            .into_event(Utc::now());
        store.insert(&recorded).await.unwrap();

        let listed = store.list(org, &AuditFilter::default()).await.unwrap();
        assert_eq!(listed[0].metadata, metadata);
        assert_eq!(
            serde_json::to_vec(&listed[0].metadata).unwrap(),
            serde_json::to_vec(&metadata).unwrap()
        );
    }

    #[tokio::test]
    async fn test_purge_only_touches_requested_severities() {
        let store = InMemoryAuditStore::new();
        let org = Uuid::new_v4();
        for severity in Severity::ALL {
            store.insert(&event(org, Category::Security, severity, 200)).await.unwrap();
        }

        let removed = store
            .purge_older_than(Utc::now() - Duration::days(90), &Severity::PURGEABLE)
            .await
            .unwrap();

        assert_eq!(removed, 2);
        let remaining: Vec<Severity> = store.snapshot().into_iter().map(|e| e.severity).collect();
        assert_eq!(remaining, vec![Severity::High, Severity::Critical]);
    }
}
