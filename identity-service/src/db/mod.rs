//! PostgreSQL pool for the credential and user-session tables.

use crate::config::DatabaseConfig;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Open the pool and bring the schema up to date when configured to.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, AppError> {
    let pool = create_pool(config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to PostgreSQL");
        AppError::DatabaseError(anyhow::anyhow!(e))
    })?;

    if config.run_migrations {
        run_migrations(&pool).await?;
    } else {
        tracing::info!("Skipping database migrations");
    }

    Ok(pool)
}

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(
        max_connections = config.max_connections,
        "Connecting to PostgreSQL..."
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.url)
        .await?;

    tracing::info!("Successfully connected to PostgreSQL");

    Ok(pool)
}

/// Apply `migrations/` (credential and user-session tables).
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<(), AppError> {
    sqlx::query("SELECT 1").execute(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Database health check failed");
        AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
    })?;
    Ok(())
}
