//! Password strength policy.

use std::str::FromStr;
use thiserror::Error;

const MAX_PASSWORD_LENGTH: usize = 64;

/// A candidate password that the policy refuses, with a reason fit for the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct PolicyViolation(pub String);

impl PolicyViolation {
    fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Password policy collaborator.
pub trait PasswordPolicyValidator: Send + Sync {
    fn validate(&self, candidate: &str) -> Result<(), PolicyViolation>;
}

/// Built-in policy levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordPolicy {
    None,
    #[default]
    Low,
    Medium,
    High,
}

struct Rules {
    min_length: usize,
    require_upper: bool,
    require_lower: bool,
    require_digit: bool,
    require_symbol: bool,
}

impl PasswordPolicy {
    fn rules(self) -> Rules {
        match self {
            PasswordPolicy::None => Rules {
                min_length: 1,
                require_upper: false,
                require_lower: false,
                require_digit: false,
                require_symbol: false,
            },
            PasswordPolicy::Low => Rules {
                min_length: 6,
                require_upper: false,
                require_lower: false,
                require_digit: false,
                require_symbol: false,
            },
            PasswordPolicy::Medium => Rules {
                min_length: 8,
                require_upper: true,
                require_lower: true,
                require_digit: true,
                require_symbol: false,
            },
            PasswordPolicy::High => Rules {
                min_length: 10,
                require_upper: true,
                require_lower: true,
                require_digit: true,
                require_symbol: true,
            },
        }
    }
}

impl PasswordPolicyValidator for PasswordPolicy {
    fn validate(&self, candidate: &str) -> Result<(), PolicyViolation> {
        let rules = self.rules();
        let length = candidate.chars().count();

        if length < rules.min_length {
            return Err(PolicyViolation::new(format!(
                "The minimum length for the password is {} characters.",
                rules.min_length
            )));
        }
        if length > MAX_PASSWORD_LENGTH {
            return Err(PolicyViolation::new(format!(
                "The maximum length for the password is {} characters.",
                MAX_PASSWORD_LENGTH
            )));
        }
        if rules.require_upper && !candidate.chars().any(char::is_uppercase) {
            return Err(PolicyViolation::new(
                "As per our policy, an uppercase character is required in the password.",
            ));
        }
        if rules.require_lower && !candidate.chars().any(char::is_lowercase) {
            return Err(PolicyViolation::new(
                "As per our policy, a lowercase character is required in the password.",
            ));
        }
        if rules.require_digit && !candidate.chars().any(|c| c.is_ascii_digit()) {
            return Err(PolicyViolation::new(
                "As per our policy, your password must contain a numerical digit.",
            ));
        }
        if rules.require_symbol && candidate.chars().all(char::is_alphanumeric) {
            return Err(PolicyViolation::new(
                "As per our policy, a special character/symbol is required in the password.",
            ));
        }
        Ok(())
    }
}

impl FromStr for PasswordPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(PasswordPolicy::None),
            "low" => Ok(PasswordPolicy::Low),
            "medium" => Ok(PasswordPolicy::Medium),
            "high" => Ok(PasswordPolicy::High),
            _ => Err(format!("Invalid password policy: {}", s)),
        }
    }
}
