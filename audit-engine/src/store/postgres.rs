//! PostgreSQL-backed audit store
//!
//! Events live in the `audit_events` table, created on demand by
//! [`PgAuditStore::initialize_schema`]. Severity and category are stored as their lowercase names
//! and parsed back through the closed enums, so a row holding an unknown
//! value surfaces as [`AuditError::InvalidRow`] instead of leaking through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::entry::{AuditEvent, Category, Severity};
use crate::error::{AuditError, Result};
use crate::store::{AuditFilter, AuditStore, SeverityGroup};

const SELECT_COLUMNS: &str = "SELECT id, organization_id, actor_id, action, resource_type, resource_id, \
     description, severity, category, before_value, after_value, metadata, success, \
     error_message, created_at FROM audit_events WHERE organization_id = ";

/// PostgreSQL audit event store
#[derive(Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the append-only `audit_events` table and its indexes
    pub async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_events (
                id UUID PRIMARY KEY,
                organization_id UUID NOT NULL,
                actor_id UUID,
                action TEXT NOT NULL,
                resource_type TEXT NOT NULL,
                resource_id TEXT,
                description TEXT NOT NULL,
                severity TEXT NOT NULL DEFAULT 'low',
                category TEXT NOT NULL,
                before_value JSONB,
                after_value JSONB,
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                success BOOLEAN NOT NULL DEFAULT TRUE,
                error_message TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_audit_events_org_created \
             ON audit_events(organization_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_events_severity_created ON audit_events(severity, created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_audit_events_actor ON audit_events(actor_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    organization_id: Uuid,
    actor_id: Option<Uuid>,
    action: String,
    resource_type: String,
    resource_id: Option<String>,
    description: String,
    severity: String,
    category: String,
    before_value: Option<Json<JsonValue>>,
    after_value: Option<Json<JsonValue>>,
    metadata: Json<JsonValue>,
    success: bool,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditEventRow> for AuditEvent {
    type Error = AuditError;

    fn try_from(row: AuditEventRow) -> Result<Self> {
        let severity = row
            .severity
            .parse::<Severity>()
            .map_err(|e| AuditError::InvalidRow(format!("event {}: {}", row.id, e)))?;
        let category = row
            .category
            .parse::<Category>()
            .map_err(|e| AuditError::InvalidRow(format!("event {}: {}", row.id, e)))?;

        Ok(AuditEvent {
            id: row.id,
            organization_id: row.organization_id,
            actor_id: row.actor_id,
            action: row.action,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            description: row.description,
            severity,
            category,
            before: row.before_value.map(|Json(value)| value),
            after: row.after_value.map(|Json(value)| value),
            metadata: row.metadata.0,
            success: row.success,
            error_message: row.error_message,
            timestamp: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    category: String,
    severity: String,
    count: i64,
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn insert(&self, event: &AuditEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                id, organization_id, actor_id, action, resource_type, resource_id,
                description, severity, category, before_value, after_value,
                metadata, success, error_message, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(event.id)
        .bind(event.organization_id)
        .bind(event.actor_id)
        .bind(&event.action)
        .bind(&event.resource_type)
        .bind(&event.resource_id)
        .bind(&event.description)
        .bind(event.severity.as_str())
        .bind(event.category.as_str())
        .bind(event.before.as_ref().map(Json))
        .bind(event.after.as_ref().map(Json))
        .bind(Json(&event.metadata))
        .bind(event.success)
        .bind(&event.error_message)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| AuditError::StorageError(format!("Failed to insert audit event: {}", e)))?;

        debug!(event_id = %event.id, "Audit event stored");
        Ok(())
    }

    async fn list(&self, organization_id: Uuid, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(SELECT_COLUMNS);
        query.push_bind(organization_id);

        if let Some(actor_id) = filter.actor_id {
            query.push(" AND actor_id = ").push_bind(actor_id);
        }
        if let Some(category) = filter.category {
            query.push(" AND category = ").push_bind(category.as_str());
        }
        if let Some(severity) = filter.severity {
            query.push(" AND severity = ").push_bind(severity.as_str());
        }
        if let Some(resource_type) = &filter.resource_type {
            query.push(" AND resource_type = ").push_bind(resource_type.clone());
        }
        if let Some(resource_id) = &filter.resource_id {
            query.push(" AND resource_id = ").push_bind(resource_id.clone());
        }
        if let Some(start) = filter.start {
            query.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = filter.end {
            query.push(" AND created_at <= ").push_bind(end);
        }

        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(filter.limit))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.skip));

        let rows: Vec<AuditEventRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(AuditEvent::try_from).collect()
    }

    async fn count_by_category_severity(
        &self,
        organization_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SeverityGroup>> {
        let rows: Vec<GroupRow> = sqlx::query_as(
            r#"
            SELECT category, severity, COUNT(*) AS count
            FROM audit_events
            WHERE organization_id = $1
              AND created_at >= $2
              AND created_at <= $3
            GROUP BY category, severity
            "#,
        )
        .bind(organization_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<SeverityGroup> {
                Ok(SeverityGroup {
                    category: row.category.parse()?,
                    severity: row.severity.parse()?,
                    count: u64::try_from(row.count).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>, severities: &[Severity]) -> Result<u64> {
        let names: Vec<&str> = severities.iter().map(|s| s.as_str()).collect();

        let result = sqlx::query(
            r#"
            DELETE FROM audit_events
            WHERE created_at < $1
              AND severity = ANY($2)
            "#,
        )
        .bind(cutoff)
        .bind(names)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
