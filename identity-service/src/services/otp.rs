//! Time-based one-time codes (RFC 6238).

use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

const OTP_DIGITS: usize = 6;
const OTP_STEP_SECONDS: u64 = 30;
/// Steps accepted on either side of the current one.
const OTP_SKEW: u8 = 1;

/// A freshly generated shared secret and its scannable form.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedSecret {
    /// Base32, as typed into authenticator apps.
    pub secret: String,
    /// `data:image/png;base64,...` QR code of the `otpauth://` URI.
    pub provisioning_image: String,
}

impl std::fmt::Debug for GeneratedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedSecret").finish_non_exhaustive()
    }
}

/// One-time code collaborator.
pub trait OneTimeCodeEngine: Send + Sync {
    fn generate_secret(&self, account_name: &str) -> Result<GeneratedSecret, anyhow::Error>;

    fn validate_code(&self, code: &str, secret: &str, now: DateTime<Utc>) -> bool;
}

/// SHA1, six digits, 30 second steps, one step of tolerance.
#[derive(Debug, Clone)]
pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    fn totp(&self, secret: Vec<u8>, account_name: &str) -> Result<TOTP, anyhow::Error> {
        // ':' separates issuer and account in otpauth labels
        TOTP::new(
            Algorithm::SHA1,
            OTP_DIGITS,
            OTP_SKEW,
            OTP_STEP_SECONDS,
            secret,
            Some(self.issuer.replace(':', "")),
            account_name.replace(':', "_"),
        )
        .map_err(|e| anyhow::anyhow!("TOTP init error: {}", e))
    }

    fn decode_secret(secret: &str) -> Result<Vec<u8>, anyhow::Error> {
        Secret::Encoded(secret.trim().to_string())
            .to_bytes()
            .map_err(|e| anyhow::anyhow!("Invalid base32 secret: {:?}", e))
    }

    /// The code an authenticator would show for `secret` at `now`.
    pub fn generate_code(&self, secret: &str, now: DateTime<Utc>) -> Result<String, anyhow::Error> {
        let totp = self.totp(Self::decode_secret(secret)?, "code")?;
        Ok(totp.generate(unix_seconds(now)))
    }
}

fn unix_seconds(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp()).unwrap_or(0)
}

impl OneTimeCodeEngine for TotpEngine {
    fn generate_secret(&self, account_name: &str) -> Result<GeneratedSecret, anyhow::Error> {
        let secret_bytes = Secret::generate_secret()
            .to_bytes()
            .map_err(|e| anyhow::anyhow!("Secret gen error: {:?}", e))?;

        let totp = self.totp(secret_bytes, account_name)?;
        let qr = totp
            .get_qr_base64()
            .map_err(|e| anyhow::anyhow!("QR gen error: {}", e))?;

        Ok(GeneratedSecret {
            secret: totp.get_secret_base32(),
            provisioning_image: format!("data:image/png;base64,{}", qr),
        })
    }

    fn validate_code(&self, code: &str, secret: &str, now: DateTime<Utc>) -> bool {
        let code = code.trim();
        if code.len() != OTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }

        let totp = match Self::decode_secret(secret).and_then(|bytes| self.totp(bytes, "code")) {
            Ok(totp) => totp,
            Err(e) => {
                tracing::warn!(error = %e, "Unusable one-time code secret");
                return false;
            }
        };

        totp.check(code, unix_seconds(now))
    }
}
