pub mod auth;
pub mod scope_auth;

pub use auth::{resolve, resolve_auth_context, CurrentIdentity};
pub use scope_auth::require_any_scope;
