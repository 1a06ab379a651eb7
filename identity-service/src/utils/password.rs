use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Argon2,
};
use std::fmt;

/// Newtype for a plaintext password so it never shows up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when nothing but whitespace was entered.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([redacted])")
    }
}

/// Newtype for password hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Password hashing collaborator.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error>;

    /// Constant-time check of `password` against a stored hash.
    fn verify(&self, hash: &PasswordHashString, password: &Password) -> bool;
}

/// Argon2id with the crate's default parameters and a random salt per hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2PasswordHasher;

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, anyhow::Error> {
        hash_password(password)
    }

    fn verify(&self, hash: &PasswordHashString, password: &Password) -> bool {
        match verify_password(password, hash) {
            Ok(()) => true,
            Err(VerifyError::Mismatch) => false,
            Err(VerifyError::MalformedHash(e)) => {
                tracing::warn!(error = %e, "Stored password hash could not be parsed");
                false
            }
        }
    }
}

#[derive(Debug)]
enum VerifyError {
    Mismatch,
    MalformedHash(String),
}

/// Hash a password using Argon2
///
/// Salt is automatically generated and included in the hash.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<(), VerifyError> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| VerifyError::MalformedHash(e.to_string()))?;

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| VerifyError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password() {
        let password = Password::new("mySecurePassword123");
        let hash = hash_password(&password).expect("Failed to hash password");

        assert!(hash.as_str().starts_with("$argon2"));
    }

    #[test]
    fn test_verify_correct_and_incorrect() {
        let hasher = Argon2PasswordHasher;
        let hash = hasher.hash(&Password::new("mySecurePassword123")).unwrap();

        assert!(hasher.verify(&hash, &Password::new("mySecurePassword123")));
        assert!(!hasher.verify(&hash, &Password::new("wrongPassword")));
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        let hasher = Argon2PasswordHasher;
        let hash = PasswordHashString::new("not-a-phc-string".to_string());

        assert!(!hasher.verify(&hash, &Password::new("anything")));
    }

    #[test]
    fn test_different_hashes_for_same_password() {
        let password = Password::new("mySecurePassword123");
        let hash1 = hash_password(&password).unwrap();
        let hash2 = hash_password(&password).unwrap();

        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_blank_detection_and_redacted_debug() {
        assert!(Password::new("   \t").is_blank());
        assert!(!Password::new(" a ").is_blank());
        assert_eq!(format!("{:?}", Password::new("hunter2")), "Password([redacted])");
    }
}
