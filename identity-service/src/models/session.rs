//! Typed contents of a browser session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bumped whenever the stored shape changes; records with another version are
/// discarded instead of being half-read.
pub const SESSION_RECORD_VERSION: u32 = 1;

/// Everything this service keeps in a browser session, stored under a single key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub version: u32,
    /// Server-side sign-in session this browser session belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_enrollment: Option<PendingEnrollment>,
    /// Consecutive authorization redirects for this browser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_retries: Option<u8>,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self {
            version: SESSION_RECORD_VERSION,
            user_session_id: None,
            tokens: None,
            pending_enrollment: None,
            redirect_retries: None,
        }
    }
}

impl SessionRecord {
    pub fn with_tokens(tokens: TokenReference) -> Self {
        Self {
            tokens: Some(tokens),
            ..Self::default()
        }
    }

    /// Decode a stored value, treating anything of another shape or version as absent.
    pub fn decode(value: serde_json::Value) -> Option<Self> {
        match serde_json::from_value::<SessionRecord>(value) {
            Ok(record) if record.version == SESSION_RECORD_VERSION => Some(record),
            Ok(record) => {
                tracing::debug!(
                    stored_version = record.version,
                    expected_version = SESSION_RECORD_VERSION,
                    "Discarding session record with unexpected version"
                );
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, "Discarding undecodable session record");
                None
            }
        }
    }
}

/// The token bundle obtained at sign-in, held opaquely in the session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReference {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenReference")
            .field("access_token", &"[redacted]")
            .field("id_token", &self.id_token.as_ref().map(|_| "[redacted]"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// A second-factor secret shown to the user but not yet confirmed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEnrollment {
    pub secret: String,
    pub provisioning_image: String,
}

impl fmt::Debug for PendingEnrollment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEnrollment")
            .field("secret", &"[redacted]")
            .field("provisioning_image_len", &self.provisioning_image.len())
            .finish()
    }
}
