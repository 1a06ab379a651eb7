use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use thiserror::Error;

use crate::models::{AssuranceLevel, TokenReference};

/// Structured claims of a validated token bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: String,
    pub scopes: HashSet<String>,
    pub assurance: AssuranceLevel,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token carries no subject")]
    MissingSubject,
}

/// Validates a held token bundle. Pure apart from reading the clock.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, tokens: &TokenReference) -> Result<Claims, TokenError>;
}

#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    #[serde(default)]
    sub: Option<String>,
    exp: i64,
    /// Space separated, as in OAuth 2.0
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    acr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    acr: Option<String>,
}

/// JWT validation of the session's token bundle.
///
/// Scopes come from the access token; subject and `acr` from the id token when
/// one is held, otherwise from the access token. A missing or unknown `acr`
/// counts as password-only.
#[derive(Clone)]
pub struct JwtTokenValidator {
    decoding_key: DecodingKey,
    access_validation: Validation,
    id_validation: Validation,
}

impl JwtTokenValidator {
    pub fn new(
        decoding_key: DecodingKey,
        algorithm: Algorithm,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> Self {
        let mut access_validation = Validation::new(algorithm);
        access_validation.validate_exp = true;
        if let Some(issuer) = issuer {
            access_validation.set_issuer(&[issuer]);
        }
        match audience {
            Some(audience) => access_validation.set_audience(&[audience]),
            None => access_validation.validate_aud = false,
        }

        // The id token audience is the client that signed the user in.
        let mut id_validation = access_validation.clone();
        id_validation.validate_aud = false;

        Self {
            decoding_key,
            access_validation,
            id_validation,
        }
    }

    /// RS256 with the issuer's public key read from a PEM file.
    pub fn from_rsa_pem_file(
        public_key_path: &str,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> Result<Self, anyhow::Error> {
        let public_key_pem = fs::read_to_string(public_key_path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read public key from {}: {}",
                public_key_path,
                e
            )
        })?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse public key: {}", e))?;

        tracing::info!("Token validator initialized with RS256 key");

        Ok(Self::new(decoding_key, Algorithm::RS256, issuer, audience))
    }

    /// HS256 with a shared secret.
    pub fn from_secret(secret: &[u8], issuer: Option<&str>, audience: Option<&str>) -> Self {
        Self::new(
            DecodingKey::from_secret(secret),
            Algorithm::HS256,
            issuer,
            audience,
        )
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid(e.to_string()),
    }
}

impl TokenValidator for JwtTokenValidator {
    fn validate(&self, tokens: &TokenReference) -> Result<Claims, TokenError> {
        let access = decode::<AccessTokenClaims>(
            &tokens.access_token,
            &self.decoding_key,
            &self.access_validation,
        )
        .map_err(map_jwt_error)?
        .claims;

        let id = tokens
            .id_token
            .as_deref()
            .map(|id_token| {
                decode::<IdTokenClaims>(id_token, &self.decoding_key, &self.id_validation)
                    .map(|data| data.claims)
                    .map_err(map_jwt_error)
            })
            .transpose()?;

        let subject = id
            .as_ref()
            .and_then(|c| c.sub.clone())
            .or(access.sub)
            .filter(|s| !s.is_empty())
            .ok_or(TokenError::MissingSubject)?;

        let acr = id.as_ref().and_then(|c| c.acr.as_deref()).or(access.acr.as_deref());
        let assurance = acr
            .and_then(AssuranceLevel::from_acr)
            .unwrap_or(AssuranceLevel::Password);

        let scopes = access
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let expires_at = Utc
            .timestamp_opt(access.exp, 0)
            .single()
            .ok_or_else(|| TokenError::Invalid(format!("exp out of range: {}", access.exp)))?;

        Ok(Claims {
            subject,
            scopes,
            assurance,
            expires_at,
        })
    }
}
