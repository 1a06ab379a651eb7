//! Scope-based authorization with a bounded redirect-loop breaker.
//!
//! An interactive caller that lacks every acceptable scope is sent back to the
//! authorization endpoint, in the hope of coming back with a token that carries
//! one. If that keeps failing the browser would bounce forever, so the number
//! of consecutive redirects is kept in the session and the third denial in a
//! row ends with a plain "unauthorized" instead.
//!
//! ```text
//! NoAttempt --deny--> Retrying(1) --deny--> Retrying(2) --deny--> TerminalDenied
//!     ^                    |                     |                    |
//!     +------- allow ------+------- allow -------+   (counter cleared)+
//! ```
//!
//! Asynchronous callers (`X-Requested-With: XMLHttpRequest`) get an immediate
//! structured rejection and never touch the counter.

use axum::http::HeaderMap;
use std::collections::HashSet;

use super::step_up::{ReauthRedirect, StepUpGate};
use crate::models::{AuthContext, SessionRecord};

/// Consecutive redirects allowed before the breaker trips.
pub const MAX_REDIRECT_RETRIES: u8 = 2;

/// Accepted when the caller holds any one of the scopes (exact match).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRequirement {
    any_of: HashSet<String>,
}

impl ScopeRequirement {
    pub fn any_of<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            any_of: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_met_by(&self, ctx: Option<&AuthContext>) -> bool {
        ctx.is_some_and(|ctx| self.any_of.iter().any(|scope| ctx.has_scope(scope)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// A browser navigation that can follow a redirect.
    Interactive,
    /// A script call that expects a machine-readable answer.
    Asynchronous,
}

impl RequestShape {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let is_xhr = headers
            .get("x-requested-with")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));

        if is_xhr {
            RequestShape::Asynchronous
        } else {
            RequestShape::Interactive
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    NoAttempt,
    Retrying(u8),
    TerminalDenied,
}

impl RetryState {
    pub fn from_counter(counter: Option<u8>) -> Self {
        match counter {
            None | Some(0) => RetryState::NoAttempt,
            Some(n) => RetryState::Retrying(n.min(MAX_REDIRECT_RETRIES)),
        }
    }

    pub fn on_denial(self) -> Self {
        match self {
            RetryState::NoAttempt | RetryState::TerminalDenied => RetryState::Retrying(1),
            RetryState::Retrying(n) if n < MAX_REDIRECT_RETRIES => RetryState::Retrying(n + 1),
            RetryState::Retrying(_) => RetryState::TerminalDenied,
        }
    }

    /// What the session stores for this state; terminal resets to absent.
    pub fn counter(self) -> Option<u8> {
        match self {
            RetryState::Retrying(n) => Some(n),
            RetryState::NoAttempt | RetryState::TerminalDenied => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeDecision {
    Allow,
    /// Structured rejection for asynchronous callers.
    Reject,
    Redirect(ReauthRedirect),
    /// The breaker tripped; answer without redirecting.
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeOutcome {
    pub decision: ScopeDecision,
    /// The session record was mutated and must be saved.
    pub record_changed: bool,
}

#[derive(Debug, Clone)]
pub struct ScopeAuthorizer {
    reauth: StepUpGate,
}

impl ScopeAuthorizer {
    /// `reauth` names the authorization endpoint and client used for redirects.
    pub fn new(reauth: StepUpGate) -> Self {
        Self { reauth }
    }

    pub fn authorize(
        &self,
        ctx: Option<&AuthContext>,
        requirement: &ScopeRequirement,
        shape: RequestShape,
        record: &mut SessionRecord,
        return_url: &str,
    ) -> ScopeOutcome {
        let allowed = requirement.is_met_by(ctx);

        if shape == RequestShape::Asynchronous {
            return ScopeOutcome {
                decision: if allowed {
                    ScopeDecision::Allow
                } else {
                    ScopeDecision::Reject
                },
                record_changed: false,
            };
        }

        if allowed {
            let record_changed = record.redirect_retries.take().is_some();
            return ScopeOutcome {
                decision: ScopeDecision::Allow,
                record_changed,
            };
        }

        let next = RetryState::from_counter(record.redirect_retries).on_denial();
        record.redirect_retries = next.counter();

        tracing::info!(
            subject = ctx.map(|c| c.subject.as_str()).unwrap_or("anonymous"),
            retry_state = ?next,
            "Scope requirement not met"
        );

        let decision = match next {
            RetryState::TerminalDenied => ScopeDecision::Unauthorized,
            _ => ScopeDecision::Redirect(self.reauth.redirect(None, return_url)),
        };

        ScopeOutcome {
            decision,
            record_changed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssuranceLevel;
    use chrono::Utc;

    fn ctx(scopes: &[&str]) -> AuthContext {
        AuthContext {
            subject: "admin-1".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            assurance: AssuranceLevel::Password,
            expires_at: Utc::now(),
        }
    }

    fn authorizer() -> ScopeAuthorizer {
        ScopeAuthorizer::new(StepUpGate::new("/auth/authorize", "admin-console"))
    }

    fn requirement() -> ScopeRequirement {
        ScopeRequirement::any_of(["authserver:manage", "authserver:admin"])
    }

    #[test]
    fn test_any_of_exact_match() {
        let req = requirement();

        assert!(req.is_met_by(Some(&ctx(&["openid", "authserver:admin"]))));
        assert!(!req.is_met_by(Some(&ctx(&["authserver:*", "authserver:manag"]))));
        assert!(!req.is_met_by(None));
    }

    #[test]
    fn test_retry_state_transitions() {
        let first = RetryState::NoAttempt.on_denial();
        let second = first.on_denial();
        let third = second.on_denial();

        assert_eq!(first, RetryState::Retrying(1));
        assert_eq!(second, RetryState::Retrying(2));
        assert_eq!(third, RetryState::TerminalDenied);
        assert_eq!(third.counter(), None);
        assert_eq!(RetryState::from_counter(Some(7)), RetryState::Retrying(2));
    }

    #[test]
    fn test_counter_non_decreasing_then_terminal() {
        let authorizer = authorizer();
        let user = ctx(&["openid"]);
        let mut record = SessionRecord::default();

        let mut counters = Vec::new();
        let mut decisions = Vec::new();
        for _ in 0..3 {
            let outcome = authorizer.authorize(
                Some(&user),
                &requirement(),
                RequestShape::Interactive,
                &mut record,
                "https://id.example.test/admin",
            );
            assert!(outcome.record_changed);
            counters.push(record.redirect_retries);
            decisions.push(outcome.decision);
        }

        assert_eq!(counters, vec![Some(1), Some(2), None]);
        assert!(matches!(decisions[0], ScopeDecision::Redirect(_)));
        assert!(matches!(decisions[1], ScopeDecision::Redirect(_)));
        assert_eq!(decisions[2], ScopeDecision::Unauthorized);
    }

    #[test]
    fn test_redirect_returns_to_original_url() {
        let mut record = SessionRecord::default();
        let outcome = authorizer().authorize(
            None,
            &requirement(),
            RequestShape::Interactive,
            &mut record,
            "https://id.example.test/admin/session?tab=1",
        );

        let ScopeDecision::Redirect(redirect) = outcome.decision else {
            panic!("expected redirect");
        };
        assert_eq!(redirect.return_url, "https://id.example.test/admin/session?tab=1");
        assert_eq!(redirect.client_id, "admin-console");
    }

    #[test]
    fn test_allow_clears_counter() {
        let mut record = SessionRecord {
            redirect_retries: Some(2),
            ..SessionRecord::default()
        };

        let outcome = authorizer().authorize(
            Some(&ctx(&["authserver:manage"])),
            &requirement(),
            RequestShape::Interactive,
            &mut record,
            "/admin",
        );

        assert_eq!(outcome.decision, ScopeDecision::Allow);
        assert!(outcome.record_changed);
        assert_eq!(record.redirect_retries, None);
    }

    #[test]
    fn test_allow_without_counter_leaves_record_alone() {
        let mut record = SessionRecord::default();
        let outcome = authorizer().authorize(
            Some(&ctx(&["authserver:admin"])),
            &requirement(),
            RequestShape::Interactive,
            &mut record,
            "/admin",
        );

        assert_eq!(outcome.decision, ScopeDecision::Allow);
        assert!(!outcome.record_changed);
    }

    #[test]
    fn test_asynchronous_never_touches_counter() {
        let mut record = SessionRecord {
            redirect_retries: Some(1),
            ..SessionRecord::default()
        };

        let denied = authorizer().authorize(
            None,
            &requirement(),
            RequestShape::Asynchronous,
            &mut record,
            "/admin",
        );
        let allowed = authorizer().authorize(
            Some(&ctx(&["authserver:admin"])),
            &requirement(),
            RequestShape::Asynchronous,
            &mut record,
            "/admin",
        );

        assert_eq!(denied.decision, ScopeDecision::Reject);
        assert_eq!(allowed.decision, ScopeDecision::Allow);
        assert!(!denied.record_changed && !allowed.record_changed);
        assert_eq!(record.redirect_retries, Some(1));
    }

    #[test]
    fn test_request_shape_detection() {
        let mut headers = HeaderMap::new();
        assert_eq!(RequestShape::from_headers(&headers), RequestShape::Interactive);

        headers.insert("x-requested-with", "XMLHttpRequest".parse().unwrap());
        assert_eq!(RequestShape::from_headers(&headers), RequestShape::Asynchronous);
    }
}
