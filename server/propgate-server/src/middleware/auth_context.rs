//! Actor context extraction
//!
//! Identity is resolved upstream; the authenticator forwards the caller as
//! trusted headers and this module only parses them. A request without a
//! complete, well-formed actor is rejected with 401.

use std::str::FromStr;

use approval_engine::Role;
use audit_engine::AuditScope;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ORGANIZATION_ID_HEADER: &str = "x-organization-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub actor_id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn new(actor_id: Uuid, organization_id: Uuid, role: Role) -> Self {
        Self {
            actor_id,
            organization_id,
            role,
        }
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }

    /// Audit scope attributing events to this actor
    pub fn scope(&self) -> AuditScope {
        AuditScope::actor(self.organization_id, self.actor_id)
    }

    /// Reject callers below the two privileged tiers
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authorization`] for non-privileged roles.
    pub fn require_privileged(&self) -> Result<(), ApiError> {
        if self.is_privileged() {
            Ok(())
        } else {
            Err(ApiError::authorization(format!(
                "Role '{}' may not access this resource",
                self.role
            )))
        }
    }

    /// Parse the actor headers.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Authentication`] if a header is missing or malformed.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        Ok(Self {
            actor_id: parse_header(headers, ACTOR_ID_HEADER)?,
            organization_id: parse_header(headers, ORGANIZATION_ID_HEADER)?,
            role: parse_header(headers, ACTOR_ROLE_HEADER)?,
        })
    }
}

fn parse_header<T: FromStr>(headers: &HeaderMap, name: &str) -> Result<T, ApiError> {
    let raw = headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::authentication(format!("Missing {} header", name)))?;

    raw.parse()
        .map_err(|_| ApiError::authentication(format!("Invalid {} header", name)))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // The approval gate may already have parsed the actor
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(ctx.clone());
        }
        Self::from_headers(&parts.headers)
    }
}
