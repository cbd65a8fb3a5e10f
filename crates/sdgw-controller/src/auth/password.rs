//! Password hashing and verification using bcrypt.
//!
//! User records under `users/{username}` hold the bcrypt hash as their
//! raw value.

use bcrypt::{hash, verify, DEFAULT_COST};

/// Hash a password with the default bcrypt cost.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password, DEFAULT_COST)
}

/// Verify a password against a stored bcrypt hash.
pub fn verify_password(password: &str, hashed: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hashed)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hashed = hash_password("mysecret").unwrap();
        assert!(verify_password("mysecret", &hashed).unwrap());
        assert!(!verify_password("wrongpassword", &hashed).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("anything", "not-a-bcrypt-hash").is_err());
    }
}
