//! Audit listing and rollup statistics
//!
//! Statistics are computed in two stages: the store counts events per
//! (category, severity) pair, then [`rollup`] regroups those counts by
//! category, keeping the per-severity breakdown next to a category total.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::entry::{AuditEvent, Category, Severity};
use crate::error::Result;
use crate::store::{AuditFilter, AuditStore, SeverityGroup};

pub const DEFAULT_STATS_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeverityCount {
    pub severity: Severity,
    pub count: u64,
}

/// Second aggregation stage: one entry per category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRollup {
    pub category: Category,
    pub severities: Vec<SeverityCount>,
    pub total: u64,
}

/// Regroup (category, severity) counts by category.
///
/// Categories and severities come out in their declaration order. Duplicate
/// input pairs are merged, so every input count lands in exactly one bucket.
pub fn rollup(groups: &[SeverityGroup]) -> Vec<CategoryRollup> {
    let mut rollups: Vec<CategoryRollup> = Vec::new();

    for group in groups {
        let index = match rollups.iter().position(|r| r.category == group.category) {
            Some(index) => index,
            None => {
                rollups.push(CategoryRollup {
                    category: group.category,
                    severities: Vec::new(),
                    total: 0,
                });
                rollups.len() - 1
            }
        };
        let Some(entry) = rollups.get_mut(index) else {
            continue;
        };

        match entry.severities.iter_mut().find(|s| s.severity == group.severity) {
            Some(existing) => existing.count += group.count,
            None => entry.severities.push(SeverityCount {
                severity: group.severity,
                count: group.count,
            }),
        }
        entry.total += group.count;
    }

    for entry in &mut rollups {
        entry.severities.sort_by_key(|s| s.severity);
    }
    rollups.sort_by_key(|r| r.category);
    rollups
}

/// Read side of the audit log.
#[derive(Clone)]
pub struct AuditQueryService {
    store: Arc<dyn AuditStore>,
}

impl AuditQueryService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// List events, surfacing storage failures to the caller.
    pub async fn try_list_events(&self, organization_id: Uuid, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        self.store.list(organization_id, filter).await
    }

    /// List events newest first. A storage failure is logged and yields an
    /// empty list.
    pub async fn list_events(&self, organization_id: Uuid, filter: &AuditFilter) -> Vec<AuditEvent> {
        self.try_list_events(organization_id, filter)
            .await
            .unwrap_or_else(|e| {
                error!(target: "audit", error = %e, organization_id = %organization_id, "Audit listing failed");
                Vec::new()
            })
    }

    /// Rollup over `[now - window_days, now]`, surfacing storage failures.
    pub async fn try_stats(&self, organization_id: Uuid, window_days: u32) -> Result<Vec<CategoryRollup>> {
        let (from, to) = stats_window(Utc::now(), window_days);
        let groups = self
            .store
            .count_by_category_severity(organization_id, from, to)
            .await?;
        Ok(rollup(&groups))
    }

    /// Rollup statistics. A storage failure is logged and yields no categories.
    pub async fn stats(&self, organization_id: Uuid, window_days: u32) -> Vec<CategoryRollup> {
        self.try_stats(organization_id, window_days)
            .await
            .unwrap_or_else(|e| {
                error!(target: "audit", error = %e, organization_id = %organization_id, "Audit stats failed");
                Vec::new()
            })
    }
}

fn stats_window(now: DateTime<Utc>, window_days: u32) -> (DateTime<Utc>, DateTime<Utc>) {
    (days_before(now, window_days), now)
}

/// `now` minus `days`, saturating at the Unix epoch. Events are timestamped
/// at write time so nothing older can exist.
pub(crate) fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    Duration::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .map_or(DateTime::<Utc>::UNIX_EPOCH, |from| from.max(DateTime::<Utc>::UNIX_EPOCH))
}
