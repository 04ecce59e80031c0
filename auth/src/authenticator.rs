use chrono::DateTime;
use chrono::Utc;

use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;

/// Issues and verifies access tokens for a fixed lifetime.
pub struct Authenticator {
    jwt_handler: JwtHandler,
    token_lifetime_hours: i64,
}

/// A freshly issued access token.
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    /// JWT access token
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Authenticator {
    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for JWT signing
    /// * `token_lifetime_hours` - Validity window of issued tokens
    pub fn new(jwt_secret: &[u8], token_lifetime_hours: i64) -> Self {
        Self {
            jwt_handler: JwtHandler::new(jwt_secret),
            token_lifetime_hours,
        }
    }

    /// Issue a token whose subject is `subject`.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token generation failed
    pub fn issue_token(&self, subject: impl ToString) -> Result<AuthenticationResult, JwtError> {
        let claims = Claims::for_subject(subject, self.token_lifetime_hours);
        let access_token = self.jwt_handler.encode(&claims)?;

        Ok(AuthenticationResult {
            access_token,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        })
    }

    /// Verify signature and expiry, returning the decoded claims.
    ///
    /// # Errors
    /// * `TokenExpired` - Token lifetime is over
    /// * `InvalidToken` - Token is malformed or signed with another key
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.jwt_handler.decode(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_validate_token() {
        let authenticator = Authenticator::new(b"test_secret_key_at_least_32_bytes!", 168);

        let result = authenticator
            .issue_token("user123")
            .expect("Failed to issue token");
        assert!(result.expires_at > Utc::now());

        let claims = authenticator
            .validate_token(&result.access_token)
            .expect("Token validation failed");
        assert_eq!(claims.subject(), "user123");
        assert_eq!(claims.exp - claims.iat, 168 * 60 * 60);
    }

    #[test]
    fn test_validate_token_from_other_issuer() {
        let ours = Authenticator::new(b"test_secret_key_at_least_32_bytes!", 1);
        let theirs = Authenticator::new(b"other_secret_key_at_least_32_bytes", 1);

        let token = theirs.issue_token("user123").unwrap().access_token;

        assert!(matches!(
            ours.validate_token(&token),
            Err(JwtError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_validate_token_issued_with_negative_lifetime() {
        let authenticator = Authenticator::new(b"test_secret_key_at_least_32_bytes!", -2);

        let token = authenticator.issue_token("user123").unwrap().access_token;

        assert!(matches!(
            authenticator.validate_token(&token),
            Err(JwtError::TokenExpired)
        ));
    }

    #[test]
    fn test_validate_invalid_token() {
        let authenticator = Authenticator::new(b"test_secret_key_at_least_32_bytes!", 1);

        assert!(authenticator.validate_token("invalid.token.here").is_err());
    }
}
