//! Caller identity
//!
//! Identity arrives as an `X-Owner-Id` UUID header set by the fronting
//! auth layer; token verification itself is that layer's problem. Every
//! mutating handler extracts `OwnerIdentity` and operates only on the
//! caller's own entities.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use types::ids::OwnerId;
use uuid::Uuid;

use crate::error::AppError;

pub const OWNER_HEADER: &str = "x-owner-id";

#[derive(Debug, Clone, Copy)]
pub struct OwnerIdentity(pub OwnerId);

#[async_trait]
impl<S> FromRequestParts<S> for OwnerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| AppError::Unauthorized("missing X-Owner-Id header".into()))?;
        let owner = raw
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s).ok())
            .map(OwnerId::from_uuid)
            .ok_or_else(|| AppError::Unauthorized("malformed X-Owner-Id header".into()))?;
        Ok(OwnerIdentity(owner))
    }
}
