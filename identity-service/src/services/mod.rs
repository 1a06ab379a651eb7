//! Services layer for identity-service.
//!
//! The pipeline components are pure over an explicit `AuthContext` and the
//! session record; collaborators sit behind traits.

pub mod credentials;
pub mod enrollment;
pub mod otp;
pub mod password_change;
pub mod policy;
pub mod scope;
pub mod session;
pub mod step_up;
pub mod token;
pub mod user_sessions;

pub use credentials::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};
pub use enrollment::{
    EnrollmentOutcome, EnrollmentRejection, EnrollmentView, SecondFactorEnrollment,
};
pub use otp::{GeneratedSecret, OneTimeCodeEngine, TotpEngine};
pub use password_change::{
    ChangePasswordForm, CredentialRotation, PasswordChangeOutcome, PasswordChangeRejection,
};
pub use policy::{PasswordPolicy, PasswordPolicyValidator, PolicyViolation};
pub use scope::{
    RequestShape, RetryState, ScopeAuthorizer, ScopeDecision, ScopeOutcome, ScopeRequirement,
    MAX_REDIRECT_RETRIES,
};
pub use session::SessionStore;
pub use step_up::{ReauthRedirect, StepUp, StepUpGate};
pub use token::{Claims, JwtTokenValidator, TokenError, TokenValidator};
pub use user_sessions::{InMemoryUserSessionRegistry, PgUserSessionRegistry, UserSessionRegistry};
