//! OpenID Connect code exchange.
//!
//! Supports standard OIDC providers (Google being the one in use). Only the
//! code exchange lives here: the client obtains an authorization code from
//! the provider itself, and [`IdentityProvider::exchange_code`] turns it into
//! a verified email.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::{AuthError, AuthResult, IdentityProvider, ProviderIdentity};

/// OpenID Connect configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// The OIDC provider's issuer URL (e.g., "https://accounts.google.com")
    pub issuer_url: String,

    /// OAuth2 client ID
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Redirect URL registered with the provider
    pub redirect_url: String,
}

impl OidcConfig {
    /// Create a new OIDC configuration
    pub fn new(
        issuer_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            issuer_url: issuer_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
        }
    }

    /// Reads the `DIARY_OIDC_*` variables through `lookup`.
    ///
    /// Returns `Ok(None)` when `DIARY_OIDC_ISSUER_URL` is unset, so the
    /// server can run without a provider.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AuthResult<Option<Self>> {
        let Some(issuer_url) = lookup("DIARY_OIDC_ISSUER_URL") else {
            return Ok(None);
        };
        let required = |name: &str| {
            lookup(name).ok_or_else(|| AuthError::Configuration(format!("{} not set", name)))
        };

        Ok(Some(Self {
            issuer_url,
            client_id: required("DIARY_OIDC_CLIENT_ID")?,
            client_secret: required("DIARY_OIDC_CLIENT_SECRET")?,
            redirect_url: required("DIARY_OIDC_REDIRECT_URL")?,
        }))
    }
}

/// OIDC provider metadata (subset of fields we need)
#[derive(Debug, Clone, Deserialize)]
pub struct OidcProviderMetadata {
    /// The issuer identifier
    pub issuer: String,

    /// URL of the token endpoint
    pub token_endpoint: String,

    /// URL of the userinfo endpoint
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
}

/// Token response from the OIDC provider
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The access token
    pub access_token: String,

    /// Token type (usually "Bearer")
    pub token_type: String,

    /// When the token expires (in seconds)
    #[serde(default)]
    pub expires_in: Option<u64>,

    /// The ID token (JWT containing user claims)
    #[serde(default)]
    pub id_token: Option<String>,
}

/// User info from the OIDC provider
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    /// Subject identifier (unique user ID)
    pub sub: String,

    /// User's email address
    #[serde(default)]
    pub email: Option<String>,

    /// Whether the email is verified
    #[serde(default)]
    pub email_verified: Option<bool>,

    /// User's given name (first name)
    #[serde(default)]
    pub given_name: Option<String>,

    /// User's family name (last name)
    #[serde(default)]
    pub family_name: Option<String>,
}

impl UserInfo {
    /// Converts to a provider identity. An email the provider explicitly
    /// marks as unverified is refused.
    pub fn into_identity(self) -> AuthResult<ProviderIdentity> {
        let email = self
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AuthError::Oidc(format!("No email for subject {}", self.sub)))?;
        if self.email_verified == Some(false) {
            return Err(AuthError::EmailNotVerified);
        }

        Ok(ProviderIdentity {
            email,
            given_name: self.given_name,
            family_name: self.family_name,
        })
    }
}

/// OIDC authentication client
#[derive(Debug)]
pub struct OidcAuth {
    config: OidcConfig,
    http: reqwest::Client,
    metadata: OnceCell<OidcProviderMetadata>,
}

impl OidcAuth {
    /// Create a new OIDC auth client
    pub fn new(config: OidcConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            metadata: OnceCell::new(),
        }
    }

    /// Get the discovery URL for the OIDC provider
    pub fn discovery_url(&self) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            self.config.issuer_url.trim_end_matches('/')
        )
    }

    /// Returns the provider metadata, fetching it on first use.
    pub async fn metadata(&self) -> AuthResult<&OidcProviderMetadata> {
        self.metadata
            .get_or_try_init(|| async {
                let url = self.discovery_url();
                tracing::debug!(%url, "Fetching OIDC provider metadata");
                let response = self.http.get(&url).send().await?.error_for_status()?;
                Ok::<_, AuthError>(response.json::<OidcProviderMetadata>().await?)
            })
            .await
    }

    /// Build token request parameters
    pub fn token_request_params(&self, code: &str) -> Vec<(&'static str, String)> {
        vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_url.clone()),
            ("client_id", self.config.client_id.clone()),
            ("client_secret", self.config.client_secret.clone()),
        ]
    }
}

#[async_trait]
impl IdentityProvider for OidcAuth {
    async fn exchange_code(&self, code: &str) -> AuthResult<ProviderIdentity> {
        let metadata = self.metadata().await?;
        let userinfo_endpoint = metadata
            .userinfo_endpoint
            .as_deref()
            .ok_or_else(|| AuthError::Oidc("Userinfo endpoint not available".to_string()))?;

        let response = self
            .http
            .post(&metadata.token_endpoint)
            .form(&self.token_request_params(code))
            .send()
            .await?;
        if response.status().is_client_error() {
            tracing::debug!(status = %response.status(), "Provider rejected authorization code");
            return Err(AuthError::InvalidToken);
        }
        let token: TokenResponse = response.error_for_status()?.json().await?;

        let info: UserInfo = self
            .http
            .get(userinfo_endpoint)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info.into_identity()
    }
}
