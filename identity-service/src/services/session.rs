//! Typed access to the browser session.

use async_trait::async_trait;
use service_core::error::AppError;
use tower_sessions::Session;

use crate::models::SessionRecord;

/// Key under which the whole [`SessionRecord`] is stored.
pub const SESSION_RECORD_KEY: &str = "identity.record";

/// Session store collaborator, bound to the session of the current request.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_record(&self) -> Result<Option<SessionRecord>, AppError>;

    async fn save_record(&self, record: &SessionRecord) -> Result<(), AppError>;
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    tracing::error!(error = %e, "Session store failure");
    AppError::SessionError(e.to_string())
}

#[async_trait]
impl SessionStore for Session {
    async fn get_record(&self) -> Result<Option<SessionRecord>, AppError> {
        let stored = self
            .get::<serde_json::Value>(SESSION_RECORD_KEY)
            .await
            .map_err(session_error)?;

        let Some(value) = stored else {
            return Ok(None);
        };

        match SessionRecord::decode(value) {
            Some(record) => Ok(Some(record)),
            None => {
                self.remove::<serde_json::Value>(SESSION_RECORD_KEY)
                    .await
                    .map_err(session_error)?;
                Ok(None)
            }
        }
    }

    async fn save_record(&self, record: &SessionRecord) -> Result<(), AppError> {
        self.insert(SESSION_RECORD_KEY, record)
            .await
            .map_err(session_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_empty_session_has_no_record() {
        let session = session();
        assert_eq!(session.get_record().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let session = session();
        let record = SessionRecord {
            redirect_retries: Some(1),
            ..SessionRecord::default()
        };

        session.save_record(&record).await.unwrap();

        assert_eq!(session.get_record().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_undecodable_record_is_removed() {
        let session = session();
        session
            .insert(SESSION_RECORD_KEY, json!({ "version": 99 }))
            .await
            .unwrap();

        assert_eq!(session.get_record().await.unwrap(), None);
        let raw: Option<serde_json::Value> = session.get(SESSION_RECORD_KEY).await.unwrap();
        assert!(raw.is_none());
    }
}
