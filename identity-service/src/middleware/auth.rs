use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use tower_sessions::Session;

use crate::models::{AuthContext, SessionRecord};
use crate::services::{SessionStore, TokenValidator};
use crate::AppState;

/// Build the request's identity from the session record.
///
/// A record without tokens, or with tokens that fail validation, yields an
/// anonymous caller. The record itself is never touched here.
pub fn resolve(
    record: Option<&SessionRecord>,
    validator: &dyn TokenValidator,
) -> Option<AuthContext> {
    let tokens = record?.tokens.as_ref()?;

    match validator.validate(tokens) {
        Ok(claims) => Some(AuthContext {
            subject: claims.subject,
            scopes: claims.scopes,
            assurance: claims.assurance,
            expires_at: claims.expires_at,
        }),
        Err(e) => {
            tracing::debug!(error = %e, "Held token failed validation, continuing anonymously");
            None
        }
    }
}

/// Resolves the identity of every request and stores it as [`CurrentIdentity`].
///
/// A browser session whose server-side sign-in session has ended is emptied
/// first, so a sign-out elsewhere takes effect here too.
pub async fn resolve_auth_context(
    State(state): State<AppState>,
    session: Session,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let mut record = session.get_record().await?;

    if let Some(user_session_id) = record.as_ref().and_then(|r| r.user_session_id.as_deref()) {
        if !state.user_sessions.is_active(user_session_id).await? {
            tracing::info!("Sign-in session no longer active, clearing browser session");
            session.save_record(&SessionRecord::default()).await?;
            record = None;
        }
    }

    let identity = resolve(record.as_ref(), state.token_validator.as_ref());
    req.extensions_mut().insert(CurrentIdentity(identity));

    Ok(next.run(req).await)
}

/// Identity resolved for this request; `None` inside means anonymous.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Option<AuthContext>);

impl CurrentIdentity {
    pub fn context(&self) -> Option<&AuthContext> {
        self.0.as_ref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentIdentity>()
            .cloned()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "Identity missing from request extensions"
                ))
            })
    }
}
