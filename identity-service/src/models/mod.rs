//! Domain models for identity-service.

pub mod assurance;
pub mod context;
pub mod credential;
pub mod session;

pub use assurance::AssuranceLevel;
pub use context::AuthContext;
pub use credential::UserCredential;
pub use session::{PendingEnrollment, SessionRecord, TokenReference, SESSION_RECORD_VERSION};
