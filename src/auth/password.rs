use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;

/// Checked when the account does not exist, so an unknown username costs the
/// same argon2 work as a wrong password.
static DECOY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("decoy-credential").ok());

/// Hash a password into a salted argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {e}"))
}

/// Constant-time check of `password` against a stored PHC hash. A malformed
/// stored hash verifies as false.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}

/// Burn one verification against the decoy hash. The result is meaningless.
pub fn verify_decoy(password: &str) -> bool {
    match DECOY_HASH.as_deref() {
        Some(hash) => verify_password(password, hash),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("correct h0rse", &hash));
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn garbage_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn decoy_hash_is_a_real_argon2_hash() {
        let decoy = DECOY_HASH.as_deref().expect("decoy hash");
        assert!(decoy.starts_with("$argon2id$"));
        assert!(PasswordHash::new(decoy).is_ok());
        assert!(!verify_decoy("Segura#2024"));
    }
}
