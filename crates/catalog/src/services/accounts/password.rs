//! Password hashing and verification.
//!
//! New hashes are always Argon2id. Legacy SHA-256 digests are verified for
//! accounts created before the migration and replaced on the next login.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use super::AuthError;
use crate::models::account::StoredPassword;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Argon2 hash of a random secret. Verified in place of a real hash for
/// unknown, inactive and password-less accounts.
static DUMMY_HASH: LazyLock<StoredPassword> = LazyLock::new(|| {
    hash_password_blocking(&generate_token())
        .map_or(StoredPassword::Unrecognized, |hash| StoredPassword::parse(&hash))
});

/// Validate password strength.
pub(super) fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id off the async executor.
pub(super) async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password_blocking(&password))
        .await
        .map_err(|_| AuthError::PasswordHash)?
}

/// Verify a password against a stored hash off the async executor.
pub(super) async fn verify_password(password: &str, stored: &StoredPassword) -> bool {
    let password = password.to_owned();
    let stored = stored.clone();
    tokio::task::spawn_blocking(move || verify_password_blocking(&password, &stored))
        .await
        .unwrap_or(false)
}

/// Run a full verification that always fails.
pub(super) async fn verify_dummy_password(password: &str) {
    let password = password.to_owned();
    let _ = tokio::task::spawn_blocking(move || verify_password_blocking(&password, &DUMMY_HASH)).await;
}

/// Opaque single-use token: 32 random bytes, URL-safe base64.
pub(super) fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
}

fn hash_password_blocking(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

fn verify_password_blocking(password: &str, stored: &StoredPassword) -> bool {
    match stored {
        StoredPassword::Modern(hash) => PasswordHash::new(hash).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        }),
        StoredPassword::Legacy(digest) => legacy_digest(password) == *digest,
        StoredPassword::Unrecognized => false,
    }
}

fn legacy_digest(password: &str) -> String {
    Sha256::digest(password.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("12345678").is_ok());
        // Counted in characters, not bytes.
        assert!(validate_password("ééééééé").is_err());
    }

    #[tokio::test]
    async fn test_modern_round_trip() {
        let hash = hash_password("secret123").await.unwrap();
        let stored = StoredPassword::parse(&hash);
        assert!(matches!(stored, StoredPassword::Modern(_)));

        assert!(verify_password("secret123", &stored).await);
        assert!(!verify_password("secret124", &stored).await);
    }

    #[tokio::test]
    async fn test_legacy_digest_verifies() {
        let stored = StoredPassword::parse(&legacy_digest("secret123").to_ascii_uppercase());
        assert!(stored.is_legacy());
        assert!(verify_password("secret123", &stored).await);
        assert!(!verify_password("wrong", &stored).await);
    }

    #[tokio::test]
    async fn test_unrecognized_never_verifies() {
        assert!(!verify_password("", &StoredPassword::Unrecognized).await);
    }

    #[tokio::test]
    async fn test_dummy_hash_is_argon2() {
        assert!(matches!(*DUMMY_HASH, StoredPassword::Modern(_)));
        assert!(!verify_password("", &DUMMY_HASH).await);
        verify_dummy_password("secret123").await;
    }

    #[test]
    fn test_tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
