//! Server-side sign-in sessions, consulted to honour sign-outs made elsewhere.

use async_trait::async_trait;
use dashmap::DashSet;
use service_core::error::AppError;
use sqlx::postgres::PgPool;

#[async_trait]
pub trait UserSessionRegistry: Send + Sync {
    /// False once the sign-in session was ended or revoked.
    async fn is_active(&self, session_identifier: &str) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgUserSessionRegistry {
    pool: PgPool,
}

impl PgUserSessionRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserSessionRegistry for PgUserSessionRegistry {
    async fn is_active(&self, session_identifier: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_sessions WHERE session_identifier = $1)",
        )
        .bind(session_identifier)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(exists)
    }
}

#[derive(Default)]
pub struct InMemoryUserSessionRegistry {
    active: DashSet<String>,
}

impl InMemoryUserSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, session_identifier: impl Into<String>) {
        self.active.insert(session_identifier.into());
    }

    pub fn end(&self, session_identifier: &str) {
        self.active.remove(session_identifier);
    }
}

#[async_trait]
impl UserSessionRegistry for InMemoryUserSessionRegistry {
    async fn is_active(&self, session_identifier: &str) -> Result<bool, AppError> {
        Ok(self.active.contains(session_identifier))
    }
}
