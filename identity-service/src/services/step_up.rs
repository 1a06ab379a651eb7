//! Assurance-level gating of sensitive operations.

use crate::models::{AssuranceLevel, AuthContext};

/// Where and how to send the browser to authenticate again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReauthRedirect {
    pub authorize_path: String,
    pub client_id: String,
    /// Requested level, `None` leaves it to the authorization server.
    pub acr_hint: Option<AssuranceLevel>,
    pub return_url: String,
}

impl ReauthRedirect {
    /// Value for the `Location` header.
    pub fn location(&self) -> String {
        let mut location = format!(
            "{}?client_id={}",
            self.authorize_path,
            urlencoding::encode(&self.client_id)
        );
        if let Some(acr) = self.acr_hint {
            location.push_str("&acr_values=");
            location.push_str(&urlencoding::encode(acr.acr()));
        }
        location.push_str("&redirect_uri=");
        location.push_str(&urlencoding::encode(&self.return_url));
        location
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepUp {
    Satisfied,
    /// Not performed here, the caller turns it into a response.
    Required(ReauthRedirect),
}

#[derive(Debug, Clone)]
pub struct StepUpGate {
    authorize_path: String,
    client_id: String,
}

impl StepUpGate {
    pub fn new(authorize_path: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            authorize_path: authorize_path.into(),
            client_id: client_id.into(),
        }
    }

    /// Anonymous callers never satisfy; an equal level does.
    pub fn is_satisfied(ctx: Option<&AuthContext>, required: AssuranceLevel) -> bool {
        ctx.is_some_and(|ctx| ctx.assurance >= required)
    }

    pub fn check(
        &self,
        ctx: Option<&AuthContext>,
        required: AssuranceLevel,
        return_path: &str,
    ) -> StepUp {
        if Self::is_satisfied(ctx, required) {
            return StepUp::Satisfied;
        }

        tracing::debug!(
            subject = ctx.map(|c| c.subject.as_str()).unwrap_or("anonymous"),
            current = ?ctx.map(|c| c.assurance),
            required = %required,
            "Step-up authentication required"
        );

        StepUp::Required(self.redirect(Some(required), return_path))
    }

    pub fn redirect(&self, acr_hint: Option<AssuranceLevel>, return_url: &str) -> ReauthRedirect {
        ReauthRedirect {
            authorize_path: self.authorize_path.clone(),
            client_id: self.client_id.clone(),
            acr_hint,
            return_url: return_url.to_string(),
        }
    }
}
