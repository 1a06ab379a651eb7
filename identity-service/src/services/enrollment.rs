//! Second-factor (TOTP) enrollment state machine.
//!
//! `disabled -> pending-confirmation` happens when the page is viewed: a fresh
//! secret is generated and kept in the session only. Confirming it with the
//! current password and a valid code moves to `enabled`. Disabling needs the
//! password alone.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use service_core::error::AppError;

use super::credentials::{require_credential, CredentialStore};
use super::otp::OneTimeCodeEngine;
use crate::models::{AuthContext, PendingEnrollment, SessionRecord};
use crate::utils::{Password, PasswordHashString, PasswordHasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnrollmentRejection {
    #[error("Authentication failed. Check your password and try again.")]
    AuthenticationFailed,

    #[error("OTP code is required.")]
    CodeRequired,

    #[error("No pending OTP enrollment. Reload the page to generate a new secret.")]
    NoPendingEnrollment,

    #[error("Incorrect OTP Code. OTP codes are time-sensitive and change every 30 seconds. Make sure you're using the most recent code generated by your authenticator app.")]
    CodeInvalid,
}

/// What the enrollment page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentView {
    pub otp_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_image: Option<String>,
}

impl EnrollmentView {
    fn new(otp_enabled: bool, pending: Option<&PendingEnrollment>) -> Self {
        Self {
            otp_enabled,
            secret: pending.map(|p| p.secret.clone()),
            provisioning_image: pending.map(|p| p.provisioning_image.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    Enabled,
    Disabled,
    /// Re-render the current state; `pending` is kept for another attempt.
    Rejected {
        reason: EnrollmentRejection,
        otp_enabled: bool,
        pending: Option<PendingEnrollment>,
    },
}

impl EnrollmentOutcome {
    fn rejected(
        reason: EnrollmentRejection,
        otp_enabled: bool,
        pending: Option<PendingEnrollment>,
    ) -> Self {
        tracing::debug!(reason = ?reason, "Second factor submission rejected");
        EnrollmentOutcome::Rejected {
            reason,
            otp_enabled,
            pending,
        }
    }

    /// The page a rejection re-renders.
    pub fn view(&self) -> Option<EnrollmentView> {
        match self {
            EnrollmentOutcome::Rejected {
                otp_enabled,
                pending,
                ..
            } => Some(EnrollmentView::new(*otp_enabled, pending.as_ref())),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct SecondFactorEnrollment {
    credentials: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    otp: Arc<dyn OneTimeCodeEngine>,
}

impl SecondFactorEnrollment {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        otp: Arc<dyn OneTimeCodeEngine>,
    ) -> Self {
        Self {
            credentials,
            hasher,
            otp,
        }
    }

    /// Every view while disabled replaces the pending secret in `record`.
    #[tracing::instrument(skip_all, fields(subject = %ctx.subject))]
    pub async fn view(
        &self,
        ctx: &AuthContext,
        record: &mut SessionRecord,
    ) -> Result<EnrollmentView, AppError> {
        let credential = require_credential(self.credentials.as_ref(), &ctx.subject).await?;

        if credential.otp_enabled {
            record.pending_enrollment = None;
            return Ok(EnrollmentView::new(true, None));
        }

        let generated = self.otp.generate_secret(&ctx.subject).map_err(|e| {
            tracing::error!(error = %e, "Failed to generate second factor secret");
            AppError::InternalError(e)
        })?;

        let pending = PendingEnrollment {
            secret: generated.secret,
            provisioning_image: generated.provisioning_image,
        };
        let view = EnrollmentView::new(false, Some(&pending));
        record.pending_enrollment = Some(pending);

        Ok(view)
    }

    #[tracing::instrument(skip_all, fields(subject = %ctx.subject))]
    pub async fn submit(
        &self,
        ctx: &AuthContext,
        record: &mut SessionRecord,
        password: &Password,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<EnrollmentOutcome, AppError> {
        let mut credential = require_credential(self.credentials.as_ref(), &ctx.subject).await?;
        let stored_hash = PasswordHashString::new(credential.password_hash.clone());
        let password_ok = self.hasher.verify(&stored_hash, password);

        if credential.otp_enabled {
            if !password_ok {
                return Ok(EnrollmentOutcome::rejected(
                    EnrollmentRejection::AuthenticationFailed,
                    true,
                    None,
                ));
            }

            credential.disable_second_factor();
            self.credentials.update(&credential).await?;
            tracing::info!("Second factor disabled");
            return Ok(EnrollmentOutcome::Disabled);
        }

        let pending = record.pending_enrollment.clone();

        if !password_ok {
            return Ok(EnrollmentOutcome::rejected(
                EnrollmentRejection::AuthenticationFailed,
                false,
                pending,
            ));
        }

        let code = code.trim();
        if code.is_empty() {
            return Ok(EnrollmentOutcome::rejected(
                EnrollmentRejection::CodeRequired,
                false,
                pending,
            ));
        }

        let Some(pending_secret) = pending.as_ref().map(|p| p.secret.clone()) else {
            return Ok(EnrollmentOutcome::rejected(
                EnrollmentRejection::NoPendingEnrollment,
                false,
                None,
            ));
        };

        if !self.otp.validate_code(code, &pending_secret, now) {
            return Ok(EnrollmentOutcome::rejected(
                EnrollmentRejection::CodeInvalid,
                false,
                pending,
            ));
        }

        credential.enable_second_factor(pending_secret);
        self.credentials.update(&credential).await?;
        record.pending_enrollment = None;
        tracing::info!("Second factor enabled");

        Ok(EnrollmentOutcome::Enabled)
    }
}
