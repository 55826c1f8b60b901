//! Read-only view of approval requests. Resolving them is owned elsewhere.

use approval_engine::{ApprovalRequest, ApprovalStatus};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{api_success, api_unavailable, ApiError, ApiResponse};
use crate::middleware::AuthContext;
use crate::server::PropGateServer;

#[derive(Debug, Default, Deserialize)]
pub struct ListApprovalsQuery {
    pub status: Option<String>,
}

pub async fn list_approvals(
    State(server): State<PropGateServer>,
    ctx: AuthContext,
    query: Result<Query<ListApprovalsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<ApprovalRequest>>>, ApiError> {
    ctx.require_privileged()?;
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<ApprovalStatus>)
        .transpose()?;

    match server.approvals.list(ctx.organization_id, status).await {
        Ok(requests) => Ok(Json(api_success(requests))),
        Err(e) => {
            warn!(error = %e, organization_id = %ctx.organization_id, "Approval listing unavailable");
            Ok(Json(api_unavailable()))
        }
    }
}

pub async fn get_approval(
    State(server): State<PropGateServer>,
    ctx: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ApprovalRequest>>, ApiError> {
    ctx.require_privileged()?;

    server
        .approvals
        .get(ctx.organization_id, id)
        .await?
        .map(|request| Json(api_success(request)))
        .ok_or_else(|| ApiError::not_found("approval_request"))
}
