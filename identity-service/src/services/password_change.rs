use std::sync::Arc;
use thiserror::Error;

use service_core::error::AppError;

use super::credentials::{require_credential, CredentialStore};
use super::policy::PasswordPolicyValidator;
use crate::models::AuthContext;
use crate::utils::{Password, PasswordHashString, PasswordHasher};

#[derive(Debug, Clone)]
pub struct ChangePasswordForm {
    pub current_password: Password,
    pub new_password: Password,
    pub new_password_confirmation: Password,
}

/// The first failed precondition of a password change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordChangeRejection {
    #[error("Current password is required.")]
    CurrentPasswordRequired,

    #[error("Authentication failed. Check your current password and try again.")]
    CurrentPasswordMismatch,

    #[error("New password is required.")]
    NewPasswordRequired,

    #[error("The new password confirmation does not match the password.")]
    ConfirmationMismatch,

    #[error("{0}")]
    PolicyViolation(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordChangeOutcome {
    Changed,
    Rejected(PasswordChangeRejection),
}

/// Verified password change. A successful change also voids any outstanding
/// recovery code, in the same write as the new hash.
#[derive(Clone)]
pub struct CredentialRotation {
    credentials: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    policy: Arc<dyn PasswordPolicyValidator>,
}

impl CredentialRotation {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
        policy: Arc<dyn PasswordPolicyValidator>,
    ) -> Self {
        Self {
            credentials,
            hasher,
            policy,
        }
    }

    #[tracing::instrument(skip_all, fields(subject = %ctx.subject))]
    pub async fn change_password(
        &self,
        ctx: &AuthContext,
        form: ChangePasswordForm,
    ) -> Result<PasswordChangeOutcome, AppError> {
        // Decided on the form alone, before any store access.
        if form.current_password.is_blank() {
            return Ok(Self::rejected(PasswordChangeRejection::CurrentPasswordRequired));
        }

        let mut credential = require_credential(self.credentials.as_ref(), &ctx.subject).await?;

        if let Err(rejection) = self.check_preconditions(&credential.password_hash, &form) {
            return Ok(Self::rejected(rejection));
        }

        let new_hash = self.hasher.hash(&form.new_password).map_err(|e| {
            tracing::error!(error = %e, "Failed to hash new password");
            AppError::InternalError(e)
        })?;

        credential.rotate_password(new_hash.into_string());
        self.credentials.update(&credential).await?;
        tracing::info!("Password changed");

        Ok(PasswordChangeOutcome::Changed)
    }

    fn rejected(rejection: PasswordChangeRejection) -> PasswordChangeOutcome {
        tracing::debug!(reason = ?rejection, "Password change rejected");
        PasswordChangeOutcome::Rejected(rejection)
    }

    /// Ordered, first failure wins. The current password is known to be non-blank.
    fn check_preconditions(
        &self,
        stored_hash: &str,
        form: &ChangePasswordForm,
    ) -> Result<(), PasswordChangeRejection> {
        let stored_hash = PasswordHashString::new(stored_hash.to_string());
        if !self.hasher.verify(&stored_hash, &form.current_password) {
            return Err(PasswordChangeRejection::CurrentPasswordMismatch);
        }

        if form.new_password.is_blank() {
            return Err(PasswordChangeRejection::NewPasswordRequired);
        }

        if form.new_password != form.new_password_confirmation {
            return Err(PasswordChangeRejection::ConfirmationMismatch);
        }

        self.policy
            .validate(form.new_password.as_str())
            .map_err(|violation| PasswordChangeRejection::PolicyViolation(violation.0))
    }
}
