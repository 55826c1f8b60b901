use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use approval_engine::{ApprovalStore, InMemoryApprovalStore, PgApprovalStore, PolicyEngine};
use audit_engine::{AuditQueryService, AuditRecorder, AuditStore, InMemoryAuditStore, PgAuditStore, RetentionSweeper};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::GatewayConfig;

/// Shared gateway state, one instance per process, cloned into handlers
#[derive(Clone)]
pub struct PropGateServer {
    pub config: Arc<GatewayConfig>,
    /// Single write path into the audit log
    pub recorder: AuditRecorder,
    pub audit_queries: Arc<AuditQueryService>,
    pub retention: Arc<RetentionSweeper>,
    pub policy: Arc<PolicyEngine>,
    pub approvals: Arc<dyn ApprovalStore>,
}

impl PropGateServer {
    /// Build the gateway from configuration, connecting to PostgreSQL when a
    /// database URL is set and falling back to in-memory stores otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the database is configured but unreachable, or the schema
    /// cannot be created.
    pub async fn new(config: GatewayConfig) -> Result<Self> {
        match config.database.url.clone() {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database.max_connections)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(&url)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                info!(max_connections = config.database.max_connections, "Connected to PostgreSQL");
                Self::new_with_pool(config, pool).await
            }
            None => {
                warn!("No database URL configured; audit events and approval requests are kept in memory only");
                Ok(Self::in_memory(config))
            }
        }
    }

    /// Build the gateway on an existing pool, creating tables if needed.
    ///
    /// # Errors
    ///
    /// Fails if schema initialization fails.
    pub async fn new_with_pool(config: GatewayConfig, pool: PgPool) -> Result<Self> {
        let audit_store = PgAuditStore::new(pool.clone());
        audit_store
            .initialize_schema()
            .await
            .context("Failed to initialize audit schema")?;

        let approval_store = PgApprovalStore::new(pool);
        approval_store
            .initialize_schema()
            .await
            .context("Failed to initialize approval schema")?;

        Ok(Self::with_stores(config, Arc::new(audit_store), Arc::new(approval_store)))
    }

    /// Development/test gateway backed by in-memory stores
    pub fn in_memory(config: GatewayConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(InMemoryAuditStore::new()),
            Arc::new(InMemoryApprovalStore::new()),
        )
    }

    pub fn with_stores(
        config: GatewayConfig,
        audit_store: Arc<dyn AuditStore>,
        approval_store: Arc<dyn ApprovalStore>,
    ) -> Self {
        let policy = PolicyEngine::new(config.policy.clone(), approval_store.clone());

        Self {
            config: Arc::new(config),
            recorder: AuditRecorder::new(audit_store.clone()),
            audit_queries: Arc::new(AuditQueryService::new(audit_store.clone())),
            retention: Arc::new(RetentionSweeper::new(audit_store)),
            policy: Arc::new(policy),
            approvals: approval_store,
        }
    }
}
