//! Audit log endpoints: listing, rollup statistics and manual submission.

use audit_engine::{AuditEvent, AuditFilter, Category, CategoryRollup, NewAuditEvent, Severity};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{api_success, api_success_with_meta, api_unavailable, ApiError, ApiResponse, ResponseMetadata};
use crate::middleware::{AuthContext, ClientInfo};
use crate::server::PropGateServer;

/// Query parameters accepted by `GET /api/v1/audit/events`
#[derive(Debug, Default, Deserialize)]
pub struct ListEventsQuery {
    pub actor_id: Option<Uuid>,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

impl ListEventsQuery {
    /// Validate the closed-vocabulary parameters and build a store filter.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unknown category or severity, or a
    /// date that is neither RFC 3339 nor `YYYY-MM-DD`.
    pub fn into_filter(self, default_limit: u32) -> Result<AuditFilter, ApiError> {
        Ok(AuditFilter {
            actor_id: self.actor_id,
            category: self.category.as_deref().map(str::parse::<Category>).transpose()?,
            severity: self.severity.as_deref().map(str::parse::<Severity>).transpose()?,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            start: self
                .start_date
                .as_deref()
                .map(|value| parse_date_bound("start_date", value, DateBound::Start))
                .transpose()?,
            end: self
                .end_date
                .as_deref()
                .map(|value| parse_date_bound("end_date", value, DateBound::End))
                .transpose()?,
            limit: self.limit.unwrap_or(default_limit),
            skip: self.skip.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum DateBound {
    Start,
    End,
}

/// Accept a full RFC 3339 timestamp or a bare calendar date. A bare start
/// date means midnight UTC, a bare end date covers the whole day.
fn parse_date_bound(field: &str, value: &str, bound: DateBound) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ApiError::invalid_field(field, format!("expected RFC 3339 timestamp or YYYY-MM-DD, got '{}'", value)))?;
    let time = match bound {
        DateBound::Start => NaiveTime::MIN,
        DateBound::End => NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN),
    };
    Ok(date.and_time(time).and_utc())
}

pub async fn list_events(
    State(server): State<PropGateServer>,
    ctx: AuthContext,
    query: Result<Query<ListEventsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<AuditEvent>>>, ApiError> {
    ctx.require_privileged()?;
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let filter = query.into_filter(server.config.audit.default_limit)?;

    match server.audit_queries.try_list_events(ctx.organization_id, &filter).await {
        Ok(events) => {
            let metadata = ResponseMetadata {
                count: events.len(),
                limit: filter.limit,
                skip: filter.skip,
            };
            Ok(Json(api_success_with_meta(events, metadata)))
        }
        Err(e) => {
            warn!(target: "audit", error = %e, organization_id = %ctx.organization_id, "Audit listing unavailable");
            Ok(Json(api_unavailable()))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub days: Option<u32>,
}

pub async fn stats(
    State(server): State<PropGateServer>,
    ctx: AuthContext,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<Vec<CategoryRollup>>>, ApiError> {
    ctx.require_privileged()?;
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let days = query.days.unwrap_or(server.config.audit.stats_window_days);

    match server.audit_queries.try_stats(ctx.organization_id, days).await {
        Ok(rollup) => Ok(Json(api_success(rollup))),
        Err(e) => {
            warn!(target: "audit", error = %e, organization_id = %ctx.organization_id, days, "Audit stats unavailable");
            Ok(Json(api_unavailable()))
        }
    }
}

/// Body of `POST /api/v1/audit/events`. Everything is optional at the
/// serde level so absent required fields can be reported together.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitEventRequest {
    pub action: Option<String>,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub metadata: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct SubmittedEvent {
    pub action: String,
    pub resource_type: String,
    pub category: Category,
    pub severity: Severity,
}

fn required(value: Option<String>, name: &str, missing: &mut Vec<String>) -> String {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => v,
        _ => {
            missing.push(name.to_string());
            String::new()
        }
    }
}

/// Merge the caller's metadata with the captured client details.
fn merge_client_info(metadata: Option<JsonValue>, client: &ClientInfo) -> JsonValue {
    let mut merged = match metadata {
        Some(JsonValue::Object(map)) => map,
        Some(JsonValue::Null) | None => Map::new(),
        Some(other) => Map::from_iter([("data".to_string(), other)]),
    };
    merged.insert("ip_address".to_string(), json!(client.ip_address));
    merged.insert("user_agent".to_string(), json!(client.user_agent));
    JsonValue::Object(merged)
}

pub async fn submit_event(
    State(server): State<PropGateServer>,
    ctx: AuthContext,
    client: ClientInfo,
    body: Result<Json<SubmitEventRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<SubmittedEvent>>), ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut missing = Vec::new();
    let action = required(body.action, "action", &mut missing);
    let resource = required(body.resource, "resource", &mut missing);
    let description = required(body.description, "description", &mut missing);
    let category = required(body.category, "category", &mut missing);
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(missing));
    }

    let category: Category = category.parse()?;
    let severity = body
        .severity
        .as_deref()
        .map(str::parse::<Severity>)
        .transpose()?
        .unwrap_or_default();

    let mut event = NewAuditEvent::new(ctx.scope(), category, action.clone(), resource.clone(), description)
        .with_severity(severity)
        .with_metadata(merge_client_info(body.metadata, &client));
    if let Some(resource_id) = body.resource_id.filter(|id| !id.is_empty()) {
        event = event.with_resource_id(resource_id);
    }

    drop(server.recorder.record_detached(event));
    info!(
        target: "audit",
        organization_id = %ctx.organization_id,
        actor_id = %ctx.actor_id,
        action = %action,
        "Manual audit event submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(api_success(SubmittedEvent {
            action,
            resource_type: resource,
            category,
            severity,
        })),
    ))
}
