//! Authentication error types.

use thiserror::Error;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// JWT validation failed.
    #[error("JWT validation failed: {0}")]
    JwtValidation(String),

    /// JWT encoding failed.
    #[error("JWT encoding failed: {0}")]
    JwtEncoding(String),

    /// Token expired.
    #[error("Token expired")]
    TokenExpired,

    /// Invalid token.
    #[error("Invalid token")]
    InvalidToken,

    /// The provider answered but did not vouch for an email address.
    #[error("Email not verified by identity provider")]
    EmailNotVerified,

    /// OIDC error.
    #[error("OIDC error: {0}")]
    Oidc(String),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Returns true if the failure is on the provider side rather than in
    /// what the client sent.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Oidc(_))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            jsonwebtoken::errors::ErrorKind::InvalidToken
            | jsonwebtoken::errors::ErrorKind::InvalidSignature
            | jsonwebtoken::errors::ErrorKind::InvalidIssuer
            | jsonwebtoken::errors::ErrorKind::Base64(_)
            | jsonwebtoken::errors::ErrorKind::Json(_)
            | jsonwebtoken::errors::ErrorKind::Utf8(_) => AuthError::InvalidToken,
            _ => AuthError::JwtValidation(e.to_string()),
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
