//! JWT token issuance and validation.

use base64::Engine as _;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore as _;

use super::claims::Claims;
use crate::util::unix_now;

/// Token lifetime: two hours from issuance.
pub const TOKEN_TTL_SECS: i64 = 2 * 60 * 60;

/// Manages bearer-token creation and validation with a process-wide secret.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    /// Create a new `JwtManager` with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a token for the given user.
    pub fn issue(&self, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            username: username.to_string(),
            exp: unix_now() + TOKEN_TTL_SECS,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Validate a token's signature and expiry and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let data =
            jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(data.claims)
    }
}

/// Resolve the signing secret: the configured value when set, otherwise
/// 32 random bytes, base64-encoded. A generated secret invalidates all
/// outstanding tokens on restart.
pub fn resolve_secret(configured: Option<&str>) -> String {
    if let Some(secret) = configured {
        if !secret.is_empty() {
            return secret.to_string();
        }
    }
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_jwt() -> JwtManager {
        JwtManager::new(b"test-secret-key-for-testing")
    }

    #[test]
    fn issue_and_validate() {
        let jwt = test_jwt();
        let token = jwt.issue("alice").unwrap();

        let claims = jwt.validate(&token).unwrap();
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > unix_now());
        assert!(claims.exp <= unix_now() + TOKEN_TTL_SECS);
    }

    #[test]
    fn invalid_token_fails_validation() {
        let jwt = test_jwt();
        assert!(jwt.validate("not-a-valid-token").is_err());
    }

    #[test]
    fn wrong_secret_fails_validation() {
        let jwt1 = test_jwt();
        let jwt2 = JwtManager::new(b"different-secret");

        let token = jwt1.issue("alice").unwrap();
        assert!(jwt2.validate(&token).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let jwt = test_jwt();
        let claims = Claims {
            username: "alice".to_string(),
            exp: unix_now() - 120,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret-key-for-testing"),
        )
        .unwrap();

        assert!(jwt.validate(&token).is_err());
    }

    #[test]
    fn resolve_secret_prefers_configured() {
        assert_eq!(resolve_secret(Some("configured")), "configured");
    }

    #[test]
    fn resolve_secret_generates_when_unset() {
        let a = resolve_secret(None);
        let b = resolve_secret(Some(""));
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }
}
