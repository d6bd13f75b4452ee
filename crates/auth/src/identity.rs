//! Identity types and the identity provider seam.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{AuthError, AuthResult};

/// An email address vouched for by a token this server issued.
///
/// Carries no role and no user id: the caller may not be registered yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub email: String,
}

impl VerifiedIdentity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

/// What an identity provider reports after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// Verified email address.
    pub email: String,
    /// Given name, when the provider shares it.
    pub given_name: Option<String>,
    /// Family name, when the provider shares it.
    pub family_name: Option<String>,
}

impl ProviderIdentity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            given_name: None,
            family_name: None,
        }
    }
}

/// Exchanges an OAuth2 authorization code for a verified identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Performs the exchange. Fails with `InvalidToken` when the provider
    /// rejects the code, and with `Http`/`Oidc` when it cannot be reached or
    /// answers nonsense.
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderIdentity>;
}

/// Identity provider answering from a fixed code table (for testing and
/// local development).
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    codes: HashMap<String, ProviderIdentity>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a code that resolves to the given email.
    pub fn with_code(mut self, code: impl Into<String>, email: impl Into<String>) -> Self {
        self.codes.insert(code.into(), ProviderIdentity::new(email));
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderIdentity> {
        self.codes.get(code).cloned().ok_or(AuthError::InvalidToken)
    }
}
