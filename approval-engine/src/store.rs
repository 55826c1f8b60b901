use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::request::{ApprovalRequest, ApprovalStatus, NewApprovalRequest};

pub mod postgres;

pub use postgres::PgApprovalStore;

/// Repository interface for approval requests.
///
/// Only creation and reads live here; resolving a request (approve/reject)
/// belongs to whichever service owns the approval workflow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Persist a new pending request
    async fn create(&self, request: NewApprovalRequest) -> Result<ApprovalRequest>;

    /// Fetch a single request within an organization
    async fn get(&self, organization_id: Uuid, id: Uuid) -> Result<Option<ApprovalRequest>>;

    /// List an organization's requests, newest first
    async fn list(&self, organization_id: Uuid, status: Option<ApprovalStatus>) -> Result<Vec<ApprovalRequest>>;
}

/// In-memory approval store for testing and development
#[derive(Default)]
pub struct InMemoryApprovalStore {
    requests: RwLock<Vec<ApprovalRequest>>,
}

impl InMemoryApprovalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.read().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ApprovalRequest> {
        self.requests.read().clone()
    }
}

#[async_trait]
impl ApprovalStore for InMemoryApprovalStore {
    async fn create(&self, request: NewApprovalRequest) -> Result<ApprovalRequest> {
        let stored = request.into_pending(Utc::now());
        self.requests.write().push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, organization_id: Uuid, id: Uuid) -> Result<Option<ApprovalRequest>> {
        Ok(self
            .requests
            .read()
            .iter()
            .find(|r| r.id == id && r.organization_id == organization_id)
            .cloned())
    }

    async fn list(&self, organization_id: Uuid, status: Option<ApprovalStatus>) -> Result<Vec<ApprovalRequest>> {
        let mut matched: Vec<ApprovalRequest> = self
            .requests
            .read()
            .iter()
            .filter(|r| r.organization_id == organization_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched)
    }
}
