//! Authentication assurance levels (ACR values).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How strongly the holder of a token proved their identity.
///
/// The ordering is meaningful: `Password < PasswordMfaPending < PasswordMfa`.
/// A level is only ever read from a validated token; nothing in this service
/// raises it locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssuranceLevel {
    #[serde(rename = "urn:identity:acr:pwd")]
    Password = 1,
    #[serde(rename = "urn:identity:acr:pwd:otp_ifpossible")]
    PasswordMfaPending = 2,
    #[serde(rename = "urn:identity:acr:pwd:otp_mandatory")]
    PasswordMfa = 3,
}

impl AssuranceLevel {
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// The `acr` claim value carried by tokens and sent as the `acr_values` hint.
    pub const fn acr(self) -> &'static str {
        match self {
            AssuranceLevel::Password => "urn:identity:acr:pwd",
            AssuranceLevel::PasswordMfaPending => "urn:identity:acr:pwd:otp_ifpossible",
            AssuranceLevel::PasswordMfa => "urn:identity:acr:pwd:otp_mandatory",
        }
    }

    pub fn from_acr(acr: &str) -> Option<Self> {
        match acr {
            "urn:identity:acr:pwd" => Some(AssuranceLevel::Password),
            "urn:identity:acr:pwd:otp_ifpossible" => Some(AssuranceLevel::PasswordMfaPending),
            "urn:identity:acr:pwd:otp_mandatory" => Some(AssuranceLevel::PasswordMfa),
            _ => None,
        }
    }
}

impl fmt::Display for AssuranceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.acr())
    }
}

impl FromStr for AssuranceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(level) = Self::from_acr(s) {
            return Ok(level);
        }
        match s.to_lowercase().as_str() {
            "1" | "level1" | "password" => Ok(AssuranceLevel::Password),
            "2" | "level2" | "password_mfa_pending" => Ok(AssuranceLevel::PasswordMfaPending),
            "3" | "level3" | "password_mfa" => Ok(AssuranceLevel::PasswordMfa),
            _ => Err(format!("Invalid assurance level: {}", s)),
        }
    }
}
