use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

/// Hash a plaintext password into a PHC-format argon2id string with a
/// fresh random salt per call.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    match Argon2::default().hash_password(plain.as_bytes(), &salt) {
        Ok(hash) => Ok(hash.to_string()),
        Err(e) => {
            error!(error = %e, "password hashing failed");
            Err(anyhow::anyhow!("password hashing failed: {e}"))
        }
    }
}

/// Check a plaintext password against a stored PHC hash. A mismatch is
/// `Ok(false)`; only a hash that cannot be parsed is an error.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        anyhow::anyhow!("stored password hash is malformed: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_phc_argon2id_hashes_with_fresh_salts() {
        let first = hash_password("gatekit-pw-fixture").unwrap();
        let second = hash_password("gatekit-pw-fixture").unwrap();
        assert!(first.starts_with("$argon2id$"));
        // Fresh salt per call, so equal passwords never share a hash.
        assert_ne!(first, second);
    }

    #[test]
    fn verifies_matching_passwords_including_non_ascii() {
        for password in ["plain-ascii-password", "pässwörd-日本語-🔑"] {
            let hash = hash_password(password).unwrap();
            assert!(verify_password(password, &hash).unwrap());
        }
    }

    #[test]
    fn mismatch_is_false_not_an_error() {
        let hash = hash_password("the-real-password").unwrap();
        assert!(!verify_password("the-wrong-password", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        assert!(verify_password("anything", "").is_err());
        assert!(verify_password("anything", "$argon2id$not-a-phc-string").is_err());
    }
}
