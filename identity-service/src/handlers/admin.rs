use axum::Json;
use serde::Serialize;
use service_core::error::AppError;

use crate::middleware::CurrentIdentity;
use crate::models::AssuranceLevel;

#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub subject: String,
    pub scopes: Vec<String>,
    pub assurance: AssuranceLevel,
    pub assurance_level: u8,
}

/// Who the admin console sees as signed in. Reached only through the scope gate.
pub async fn session_summary(identity: CurrentIdentity) -> Result<Json<SessionSummary>, AppError> {
    let ctx = identity
        .context()
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Not authenticated")))?;

    let mut scopes: Vec<String> = ctx.scopes.iter().cloned().collect();
    scopes.sort();

    Ok(Json(SessionSummary {
        subject: ctx.subject.clone(),
        scopes,
        assurance: ctx.assurance,
        assurance_level: ctx.assurance.ordinal(),
    }))
}
