use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use tower_sessions::Session;

use super::auth::CurrentIdentity;
use crate::services::{RequestShape, ScopeDecision, ScopeRequirement, SessionStore};
use crate::AppState;

/// Admits callers holding any scope of `requirement`.
///
/// Interactive denials redirect to the authorization endpoint until the
/// breaker trips; asynchronous denials get a JSON 401 straight away.
pub async fn require_any_scope(
    State(state): State<AppState>,
    requirement: ScopeRequirement,
    session: Session,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<CurrentIdentity>()
        .cloned()
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Identity missing from request extensions"
            ))
        })?;

    let shape = RequestShape::from_headers(req.headers());
    let return_url = format!(
        "{}{}",
        state.config.base_url,
        req.uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| req.uri().path())
    );

    // Asynchronous callers never need the record.
    let mut record = match shape {
        RequestShape::Asynchronous => Default::default(),
        RequestShape::Interactive => session.get_record().await?.unwrap_or_default(),
    };

    let outcome = state.scope_authorizer.authorize(
        identity.context(),
        &requirement,
        shape,
        &mut record,
        &return_url,
    );

    if outcome.record_changed {
        session.save_record(&record).await?;
    }

    let response = match outcome.decision {
        ScopeDecision::Allow => next.run(req).await,
        ScopeDecision::Redirect(redirect) => {
            (StatusCode::FOUND, [(header::LOCATION, redirect.location())]).into_response()
        }
        ScopeDecision::Reject | ScopeDecision::Unauthorized => unauthorized(),
    };

    Ok(response)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized" })),
    )
        .into_response()
}
