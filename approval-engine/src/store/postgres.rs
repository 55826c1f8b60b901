//! PostgreSQL-backed approval request store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApprovalError, Result};
use crate::request::{ApprovalRequest, ApprovalStatus, NewApprovalRequest, TargetResource};
use crate::store::ApprovalStore;

#[derive(Clone)]
pub struct PgApprovalStore {
    pool: PgPool,
}

impl PgApprovalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `approval_requests` table. Rows are never deleted here.
    pub async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS approval_requests (
                id UUID PRIMARY KEY,
                organization_id UUID NOT NULL,
                requested_by UUID NOT NULL,
                resource_type TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                action TEXT NOT NULL,
                payload JSONB NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'approved', 'rejected')),
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_approval_requests_org_status \
             ON approval_requests(organization_id, status, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ApprovalRow {
    id: Uuid,
    organization_id: Uuid,
    requested_by: Uuid,
    resource_type: String,
    resource_id: String,
    action: String,
    payload: Json<JsonValue>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApprovalRow> for ApprovalRequest {
    type Error = ApprovalError;

    fn try_from(row: ApprovalRow) -> Result<Self> {
        Ok(ApprovalRequest {
            id: row.id,
            organization_id: row.organization_id,
            requested_by: row.requested_by,
            resource_type: row.resource_type,
            resource_id: TargetResource::from(row.resource_id),
            action: row.action,
            payload: row.payload.0,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_APPROVALS: &str = r#"
    SELECT id, organization_id, requested_by, resource_type, resource_id,
           action, payload, status, created_at, updated_at
    FROM approval_requests
"#;

#[async_trait]
impl ApprovalStore for PgApprovalStore {
    async fn create(&self, request: NewApprovalRequest) -> Result<ApprovalRequest> {
        let pending = request.into_pending(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO approval_requests (
                id, organization_id, requested_by, resource_type, resource_id,
                action, payload, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(pending.id)
        .bind(pending.organization_id)
        .bind(pending.requested_by)
        .bind(&pending.resource_type)
        .bind(pending.resource_id.as_str())
        .bind(&pending.action)
        .bind(Json(&pending.payload))
        .bind(pending.status.as_str())
        .bind(pending.created_at)
        .bind(pending.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ApprovalError::StorageError(format!("Failed to create approval request: {}", e)))?;

        info!(
            approval_id = %pending.id,
            organization_id = %pending.organization_id,
            resource_type = %pending.resource_type,
            action = %pending.action,
            "Approval request created"
        );
        Ok(pending)
    }

    async fn get(&self, organization_id: Uuid, id: Uuid) -> Result<Option<ApprovalRequest>> {
        let row: Option<ApprovalRow> =
            sqlx::query_as(&format!("{} WHERE organization_id = $1 AND id = $2", SELECT_APPROVALS))
                .bind(organization_id)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ApprovalRequest::try_from).transpose()
    }

    async fn list(&self, organization_id: Uuid, status: Option<ApprovalStatus>) -> Result<Vec<ApprovalRequest>> {
        let rows: Vec<ApprovalRow> = sqlx::query_as(&format!(
            "{} WHERE organization_id = $1 AND ($2::TEXT IS NULL OR status = $2) ORDER BY created_at DESC",
            SELECT_APPROVALS
        ))
        .bind(organization_id)
        .bind(status.map(ApprovalStatus::as_str))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ApprovalRequest::try_from).collect()
    }
}
