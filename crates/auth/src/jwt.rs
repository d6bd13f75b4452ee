//! JWT token generation and validation.
//!
//! Tokens identify a person by email only. Whether that email belongs to a
//! registered user, and in which role, is looked up on every request.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AuthError, AuthResult, VerifiedIdentity, DEFAULT_JWT_EXPIRATION_HOURS, DEFAULT_JWT_ISSUER};

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Verified email address.
    pub email: String,
    /// Issued at timestamp.
    pub iat: i64,
    /// Expiration timestamp.
    pub exp: i64,
    /// Issuer.
    pub iss: String,
    /// JWT ID.
    pub jti: String,
}

impl Claims {
    /// Creates new claims for an email address.
    pub fn new(email: String, issuer: &str, expiration_hours: u64) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(expiration_hours as i64);

        Self {
            email,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: issuer.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Returns true if the token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// JWT configuration.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens.
    pub secret: String,
    /// Token expiration in hours.
    pub expiration_hours: u64,
    /// Token issuer.
    pub issuer: String,
}

impl JwtConfig {
    /// Creates a new JWT configuration.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            issuer: DEFAULT_JWT_ISSUER.to_string(),
        }
    }

    /// Sets the expiration time in hours.
    pub fn with_expiration_hours(mut self, hours: u64) -> Self {
        self.expiration_hours = hours;
        self
    }

    /// Sets the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("issuer", &self.config.issuer)
            .field("expiration_hours", &self.config.expiration_hours)
            .finish_non_exhaustive()
    }
}

impl JwtManager {
    /// Creates a new JWT manager.
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Issues a token for a verified email.
    pub fn generate_token(&self, email: impl Into<String>) -> AuthResult<String> {
        let claims = Claims::new(email.into(), &self.config.issuer, self.config.expiration_hours);
        self.encode_claims(&claims)
    }

    /// Signs arbitrary claims with the configured key.
    pub fn encode_claims(&self, claims: &Claims) -> AuthResult<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| AuthError::JwtEncoding(e.to_string()))
    }

    /// Validates and decodes a token.
    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }

    /// Validates a token and returns the identity it vouches for.
    pub fn verify(&self, token: &str) -> AuthResult<VerifiedIdentity> {
        let claims = self.validate_token(token)?;
        if claims.email.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(VerifiedIdentity::new(claims.email))
    }

    /// Returns the expiration time in seconds.
    pub fn expiration_seconds(&self) -> u64 {
        self.config.expiration_hours * 3600
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-must-be-long-enough-for-security";

    #[test]
    fn test_jwt_generation_and_validation() {
        let manager = JwtManager::new(JwtConfig::new(SECRET));

        let token = manager.generate_token("ada@example.edu").unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.email, "ada@example.edu");
        assert_eq!(claims.iss, DEFAULT_JWT_ISSUER);
        assert!(!claims.is_expired());

        let identity = manager.verify(&token).unwrap();
        assert_eq!(identity.email, "ada@example.edu");
    }

    #[test]
    fn test_invalid_token() {
        let manager = JwtManager::new(JwtConfig::new(SECRET));

        let result = manager.verify("invalid-token");
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let manager = JwtManager::new(JwtConfig::new(SECRET));
        let mut claims = Claims::new("ada@example.edu".to_string(), DEFAULT_JWT_ISSUER, 1);
        claims.iat -= 7200;
        claims.exp = Utc::now().timestamp() - 3600;
        let token = manager.encode_claims(&claims).unwrap();

        let result = manager.verify(&token);
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret() {
        let manager1 = JwtManager::new(JwtConfig::new("secret-one-must-be-long-enough"));
        let manager2 = JwtManager::new(JwtConfig::new("secret-two-must-be-long-enough"));

        let token = manager1.generate_token("ada@example.edu").unwrap();

        let result = manager2.verify(&token);
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_wrong_issuer() {
        let manager1 = JwtManager::new(JwtConfig::new(SECRET).with_issuer("someone-else"));
        let manager2 = JwtManager::new(JwtConfig::new(SECRET));

        let token = manager1.generate_token("ada@example.edu").unwrap();

        tokio_test::assert_err!(manager2.verify(&token));
    }
}
