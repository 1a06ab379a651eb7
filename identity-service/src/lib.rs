pub mod config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::{Request, State},
    middleware::{from_fn, from_fn_with_state, Next},
    routing::get,
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, RequestId},
};
use sqlx::postgres::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::config::IdentityConfig;
use crate::services::{
    CredentialRotation, CredentialStore, ScopeAuthorizer, ScopeRequirement,
    SecondFactorEnrollment, StepUpGate, TokenValidator, TotpEngine, UserSessionRegistry,
};
use crate::utils::Argon2PasswordHasher;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IdentityConfig>,
    /// Absent when running on in-memory collaborators.
    pub db: Option<PgPool>,
    pub token_validator: Arc<dyn TokenValidator>,
    pub user_sessions: Arc<dyn UserSessionRegistry>,
    pub step_up: StepUpGate,
    pub scope_authorizer: ScopeAuthorizer,
    pub enrollment: SecondFactorEnrollment,
    pub rotation: CredentialRotation,
}

impl AppState {
    pub fn new(
        config: IdentityConfig,
        db: Option<PgPool>,
        credentials: Arc<dyn CredentialStore>,
        user_sessions: Arc<dyn UserSessionRegistry>,
        token_validator: Arc<dyn TokenValidator>,
    ) -> Self {
        let hasher = Arc::new(Argon2PasswordHasher);

        let step_up = StepUpGate::new(
            config.step_up.authorize_path.clone(),
            config.step_up.account_client_id.clone(),
        );
        let scope_authorizer = ScopeAuthorizer::new(StepUpGate::new(
            config.step_up.authorize_path.clone(),
            config.authorization.admin_client_id.clone(),
        ));
        let enrollment = SecondFactorEnrollment::new(
            credentials.clone(),
            hasher.clone(),
            Arc::new(TotpEngine::new(config.otp.issuer.clone())),
        );
        let rotation =
            CredentialRotation::new(credentials, hasher, Arc::new(config.password_policy));

        Self {
            config: Arc::new(config),
            db,
            token_validator,
            user_sessions,
            step_up,
            scope_authorizer,
            enrollment,
            rotation,
        }
    }
}

/// Application routes, before the global layers.
pub fn routes(state: &AppState) -> Router<AppState> {
    let admin_requirement =
        ScopeRequirement::any_of([state.config.authorization.admin_scope.clone()]);

    let admin_routes = Router::new()
        .route("/admin/session", get(handlers::session_summary))
        .route_layer(from_fn_with_state(
            state.clone(),
            move |state: State<AppState>, session: Session, req: Request, next: Next| {
                middleware::require_any_scope(
                    state,
                    admin_requirement.clone(),
                    session,
                    req,
                    next,
                )
            },
        ));

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/account/otp",
            get(handlers::otp_page).post(handlers::otp_submit),
        )
        .route(
            "/account/change-password",
            get(handlers::change_password_page).post(handlers::change_password),
        )
        .merge(admin_routes)
}

/// Global layers shared by every route.
pub fn apply_layers(router: Router<AppState>, state: &AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(state.config.session.cookie_name.clone())
        .with_secure(state.config.session.secure_cookie)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            state.config.session.inactivity_minutes,
        )));

    let mut app = router
        .layer(from_fn_with_state(
            state.clone(),
            middleware::resolve_auth_context,
        ))
        .with_state(state.clone())
        .layer(session_layer);

    if state.config.http_request_logging {
        app = app.layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    request_id = %span_request_id(request),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ));
    }

    app.layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_seconds,
        )))
}

/// Correlation id set by `request_id_middleware`, which runs outside the trace layer.
fn span_request_id<B>(request: &service_core::axum::http::Request<B>) -> &str {
    request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.as_str())
        .unwrap_or("-")
}

pub fn build_router(state: AppState) -> Router {
    apply_layers(routes(&state), &state)
}

/// Service health check
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let database = match &state.db {
        Some(pool) => {
            db::health_check(pool).await?;
            "up"
        }
        None => "in-memory",
    };

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": database
        }
    })))
}
