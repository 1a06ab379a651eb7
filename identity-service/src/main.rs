use identity_service::{
    build_router,
    config::IdentityConfig,
    db,
    services::{
        CredentialStore, InMemoryCredentialStore, InMemoryUserSessionRegistry, JwtTokenValidator,
        PgCredentialStore, PgUserSessionRegistry, UserSessionRegistry,
    },
    AppState,
};
use service_core::observability::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = IdentityConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity service"
    );

    let (pool, credentials, user_sessions): (
        _,
        Arc<dyn CredentialStore>,
        Arc<dyn UserSessionRegistry>,
    ) = match &config.database {
        Some(database) => {
            let pool = db::connect(database).await?;
            (
                Some(pool.clone()),
                Arc::new(PgCredentialStore::new(pool.clone())),
                Arc::new(PgUserSessionRegistry::new(pool)),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory credential store");
            (
                None,
                Arc::new(InMemoryCredentialStore::new()),
                Arc::new(InMemoryUserSessionRegistry::new()),
            )
        }
    };

    let token_validator = JwtTokenValidator::from_rsa_pem_file(
        &config.token.public_key_path,
        config.token.issuer.as_deref(),
        config.token.audience.as_deref(),
    )
    .map_err(service_core::error::AppError::ConfigError)?;

    let addr = config.common.socket_addr();
    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );

    let state = AppState::new(
        config,
        pool,
        credentials,
        user_sessions,
        Arc::new(token_validator),
    );
    let app = build_router(state);

    let _guard = service_span.enter();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
