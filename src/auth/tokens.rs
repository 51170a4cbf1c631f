use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// What an account token authorizes. Stored as text in `account_tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    VerifyEmail,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::PasswordReset => "password_reset",
        }
    }
}

/// Generates a secret for email links: 32 random bytes, base64url encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Only the SHA-256 digest of a token is persisted; the plaintext goes out
/// in the email link and is never stored.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// User ids appear in verification / reset URLs base64url-encoded.
pub fn encode_uid(user_id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(user_id.as_bytes())
}

pub fn decode_uid(encoded: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    Uuid::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43); // 32 bytes base64url, no padding
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn digest_is_stable_and_hides_the_token() {
        let token = generate_token();
        let d1 = token_digest(&token);
        let d2 = token_digest(&token);
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64); // sha-256 hex
        assert_ne!(d1, token);
    }

    #[test]
    fn uid_roundtrip() {
        let id = Uuid::new_v4();
        let encoded = encode_uid(id);
        assert_eq!(decode_uid(&encoded), Some(id));
    }

    #[test]
    fn decode_uid_rejects_garbage() {
        assert_eq!(decode_uid("not-base64!!"), None);
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode(b"too-short")), None);
    }

    #[test]
    fn purpose_strings() {
        assert_eq!(TokenPurpose::VerifyEmail.as_str(), "verify_email");
        assert_eq!(TokenPurpose::PasswordReset.as_str(), "password_reset");
    }
}
