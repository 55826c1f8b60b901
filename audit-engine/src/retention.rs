//! Age and severity based purge of audit events.
//!
//! Only `low` and `medium` events are ever eligible; `high` and `critical`
//! events are kept indefinitely regardless of age. Scheduling the sweep is
//! left to the caller (cron, the `purge` CLI command, ...).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::entry::Severity;
use crate::error::Result;
use crate::query::days_before;
use crate::store::AuditStore;

pub const DEFAULT_RETENTION_DAYS: u32 = 90;

pub struct RetentionSweeper {
    store: Arc<dyn AuditStore>,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Delete purgeable events older than `retention_days` and return how
    /// many were removed.
    pub async fn purge(&self, retention_days: u32) -> Result<u64> {
        let cutoff = retention_cutoff(Utc::now(), retention_days);
        let deleted = self
            .store
            .purge_older_than(cutoff, &Severity::PURGEABLE)
            .await?;

        info!(
            target: "audit",
            deleted_count = deleted,
            retention_days = retention_days,
            cutoff = %cutoff,
            "Purged expired audit events"
        );

        Ok(deleted)
    }
}

fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    days_before(now, retention_days)
}
