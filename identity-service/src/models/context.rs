use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

use super::AssuranceLevel;

/// The authenticated identity of one request.
///
/// Rebuilt from the session on every request and never persisted. Consumers
/// receive it as an explicit argument; `None` stands for an anonymous caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthContext {
    pub subject: String,
    pub scopes: HashSet<String>,
    pub assurance: AssuranceLevel,
    pub expires_at: DateTime<Utc>,
}

impl AuthContext {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}
