//! The single `authenticate(credential, op) -> AUC` helper invoked at the
//! request edge (spec's "Mixin/decorator authentication wrappers" redesign
//! note): resolves AUC, then checks the op's rate limit before returning
//! control to the handler. Every handler receives an already-resolved `Auc`.

use axum::http::HeaderMap;

use crate::domain::{Auc, Credential};
use crate::errors::CoreError;
use crate::rate_limiter::{team_op_key, RateLimitDecision};

use super::error::ApiError;
use super::state::AppState;

pub fn extract_bearer(headers: &HeaderMap) -> Result<Credential, ApiError> {
    let raw = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(CoreError::Auth)?;
    Ok(Credential(raw.to_string()))
}

pub async fn authenticate(state: &AppState, credential: &Credential, op: &str) -> Result<Auc, ApiError> {
    let auc = state.auc.resolve(credential, op).await?;

    let key = team_op_key(&auc.team.to_string(), op);
    let limit = auc.rate_limits.get(op);
    match state.rate_limiter.admit(&key, limit) {
        RateLimitDecision::Allow { .. } => Ok(auc),
        RateLimitDecision::Deny { retry_after_ms, .. } => Err(CoreError::RateLimited { retry_after_ms }.into()),
    }
}
