//! Durable credential state of an end user.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt;

/// Password hash, second factor and recovery state for one subject.
///
/// Invariants kept by the mutators below: `otp_secret` is only set while
/// `otp_enabled`, and a recovery code never outlives a password rotation.
#[derive(Clone, PartialEq, Eq, FromRow)]
pub struct UserCredential {
    pub subject: String,
    pub password_hash: String,
    pub otp_secret: Option<String>,
    pub otp_enabled: bool,
    pub recovery_code_hash: Option<String>,
    pub recovery_code_issued_utc: Option<DateTime<Utc>>,
    pub updated_utc: DateTime<Utc>,
}

impl UserCredential {
    pub fn new(subject: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            password_hash: password_hash.into(),
            otp_secret: None,
            otp_enabled: false,
            recovery_code_hash: None,
            recovery_code_issued_utc: None,
            updated_utc: Utc::now(),
        }
    }

    pub fn enable_second_factor(&mut self, secret: String) {
        self.otp_secret = Some(secret);
        self.otp_enabled = true;
        self.updated_utc = Utc::now();
    }

    pub fn disable_second_factor(&mut self) {
        self.otp_secret = None;
        self.otp_enabled = false;
        self.updated_utc = Utc::now();
    }

    /// Replace the password hash. A direct credential change supersedes any
    /// outstanding recovery path, so the recovery code goes with it.
    pub fn rotate_password(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.recovery_code_hash = None;
        self.recovery_code_issued_utc = None;
        self.updated_utc = Utc::now();
    }

    pub fn issue_recovery_code(&mut self, code_hash: String, issued_at: DateTime<Utc>) {
        self.recovery_code_hash = Some(code_hash);
        self.recovery_code_issued_utc = Some(issued_at);
        self.updated_utc = Utc::now();
    }

    pub fn has_outstanding_recovery_code(&self) -> bool {
        self.recovery_code_hash.is_some()
    }
}

impl fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredential")
            .field("subject", &self.subject)
            .field("otp_enabled", &self.otp_enabled)
            .field("recovery_code_issued_utc", &self.recovery_code_issued_utc)
            .field("updated_utc", &self.updated_utc)
            .finish_non_exhaustive()
    }
}
