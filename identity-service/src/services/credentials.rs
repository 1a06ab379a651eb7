//! Durable storage of user credentials.

use async_trait::async_trait;
use dashmap::DashMap;
use service_core::error::AppError;
use sqlx::postgres::PgPool;

use crate::models::UserCredential;

/// Credential store collaborator.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_by_subject(&self, subject: &str) -> Result<Option<UserCredential>, AppError>;

    /// Persist every mutable column of `credential` in one write.
    async fn update(&self, credential: &UserCredential) -> Result<UserCredential, AppError>;
}

/// The credential of an authenticated subject; its absence is a server fault.
pub async fn require_credential(
    store: &dyn CredentialStore,
    subject: &str,
) -> Result<UserCredential, AppError> {
    store.get_by_subject(subject).await?.ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!(
            "Authenticated subject {} has no credential record",
            subject
        ))
    })
}

/// PostgreSQL-backed credential store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get_by_subject(&self, subject: &str) -> Result<Option<UserCredential>, AppError> {
        sqlx::query_as::<_, UserCredential>("SELECT * FROM user_credentials WHERE subject = $1")
            .bind(subject)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn update(&self, credential: &UserCredential) -> Result<UserCredential, AppError> {
        sqlx::query_as::<_, UserCredential>(
            r#"
            UPDATE user_credentials
            SET password_hash = $2,
                otp_secret = $3,
                otp_enabled = $4,
                recovery_code_hash = $5,
                recovery_code_issued_utc = $6,
                updated_utc = $7
            WHERE subject = $1
            RETURNING *
            "#,
        )
        .bind(&credential.subject)
        .bind(&credential.password_hash)
        .bind(&credential.otp_secret)
        .bind(credential.otp_enabled)
        .bind(&credential.recovery_code_hash)
        .bind(credential.recovery_code_issued_utc)
        .bind(credential.updated_utc)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?
        .ok_or_else(|| {
            AppError::NotFound(anyhow::anyhow!(
                "No credential for subject {}",
                credential.subject
            ))
        })
    }
}

/// In-process credential store for dev mode and tests.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    credentials: DashMap<String, UserCredential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, credential: UserCredential) {
        self.credentials
            .insert(credential.subject.clone(), credential);
    }

    pub fn get(&self, subject: &str) -> Option<UserCredential> {
        self.credentials.get(subject).map(|c| c.value().clone())
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_by_subject(&self, subject: &str) -> Result<Option<UserCredential>, AppError> {
        Ok(self.get(subject))
    }

    async fn update(&self, credential: &UserCredential) -> Result<UserCredential, AppError> {
        match self.credentials.get_mut(&credential.subject) {
            Some(mut existing) => {
                *existing = credential.clone();
                Ok(credential.clone())
            }
            None => Err(AppError::NotFound(anyhow::anyhow!(
                "No credential for subject {}",
                credential.subject
            ))),
        }
    }
}
