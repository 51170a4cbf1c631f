use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::ApiError;

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Register / reset / change-password policy: minimum length and a matching
/// confirmation field. `field` names the offending field in the response.
pub fn validate_new_password(
    password: &str,
    confirmation: &str,
    field: &str,
) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            field,
            "Password must be at least 8 characters long.",
        ));
    }
    if password != confirmation {
        return Err(ApiError::validation(field, "Passwords don't match."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(verify_password(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn new_password_policy_rejects_short_passwords() {
        let err = validate_new_password("short", "short", "password").unwrap_err();
        assert!(err.to_string().contains("at least 8"));
    }

    #[test]
    fn new_password_policy_rejects_mismatched_confirmation() {
        let err = validate_new_password("long-enough", "different", "new_password").unwrap_err();
        assert!(err.to_string().contains("don't match"));
    }

    #[test]
    fn new_password_policy_accepts_valid_pair() {
        assert!(validate_new_password("long-enough", "long-enough", "password").is_ok());
    }
}
