//! Server configuration.

use std::{env, time::Duration};

use analytics::AggregatorConfig;
use auth::{OidcConfig, DEFAULT_JWT_EXPIRATION_HOURS};

/// Where entities are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Process-local tables, lost on exit.
    Memory,
    /// SQLite database at the given `sqlite:` URL.
    Sqlite(String),
}

impl StoreBackend {
    fn parse(url: Option<String>) -> anyhow::Result<Self> {
        match url.as_deref().map(str::trim) {
            None | Some("") | Some("memory") => Ok(Self::Memory),
            Some(url) if url.starts_with("sqlite:") => Ok(Self::Sqlite(url.to_string())),
            Some(url) => anyhow::bail!("Unsupported DATABASE_URL: {}", url),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    pub store: StoreBackend,
    /// Secret used to sign issued tokens.
    pub jwt_secret: String,
    /// JWT expiration in hours.
    pub jwt_expiration_hours: u64,
    /// OIDC provider used for the code exchange. `None` disables sign-in.
    pub oidc: Option<OidcConfig>,
    /// Log level.
    pub log_level: String,
    /// Entries analysed at the same time.
    pub analytics_concurrency: usize,
    /// Per-entry analytics budget in seconds.
    pub analytics_timeout_secs: u64,
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    /// Creates a configuration with defaults for everything but the secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        let aggregator = AggregatorConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            store: StoreBackend::Memory,
            jwt_secret: jwt_secret.into(),
            jwt_expiration_hours: DEFAULT_JWT_EXPIRATION_HOURS,
            oidc: None,
            log_level: "info".to_string(),
            analytics_concurrency: aggregator.concurrency,
            analytics_timeout_secs: aggregator.entry_timeout.as_secs(),
        }
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = lookup("DIARY_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow::anyhow!("DIARY_JWT_SECRET is required"))?;

        let defaults = Self::new(jwt_secret);

        Ok(Self {
            host: lookup("DIARY_SERVER_HOST").unwrap_or(defaults.host),
            port: parse_or(lookup("DIARY_SERVER_PORT"), defaults.port),
            store: StoreBackend::parse(lookup("DATABASE_URL"))?,
            jwt_expiration_hours: parse_or(
                lookup("DIARY_JWT_EXPIRATION_HOURS"),
                defaults.jwt_expiration_hours,
            ),
            oidc: OidcConfig::from_lookup(&lookup)?,
            log_level: lookup("DIARY_LOG_LEVEL").unwrap_or(defaults.log_level),
            analytics_concurrency: parse_or(
                lookup("DIARY_ANALYTICS_CONCURRENCY"),
                defaults.analytics_concurrency,
            )
            .max(1),
            analytics_timeout_secs: parse_or(
                lookup("DIARY_ANALYTICS_TIMEOUT_SECS"),
                defaults.analytics_timeout_secs,
            )
            .max(1),
            jwt_secret: defaults.jwt_secret,
        })
    }

    /// Returns the server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns true if OIDC is configured.
    pub fn oidc_configured(&self) -> bool {
        self.oidc.is_some()
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            concurrency: self.analytics_concurrency,
            entry_timeout: Duration::from_secs(self.analytics_timeout_secs),
            ..AggregatorConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_secret_is_required() {
        tokio_test::assert_err!(load(&[]));
        tokio_test::assert_err!(load(&[("DIARY_JWT_SECRET", "")]));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DIARY_JWT_SECRET", "s3cret")]).unwrap();

        assert_eq!(config.server_addr(), "0.0.0.0:5000");
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.jwt_expiration_hours, 24);
        assert!(!config.oidc_configured());
        assert_eq!(config.analytics_concurrency, 8);
    }

    #[test]
    fn test_sqlite_backend_and_overrides() {
        let config = load(&[
            ("DIARY_JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "sqlite:diary.db"),
            ("DIARY_SERVER_PORT", "8080"),
            ("DIARY_ANALYTICS_CONCURRENCY", "0"),
            ("DIARY_ANALYTICS_TIMEOUT_SECS", "3"),
        ])
        .unwrap();

        assert_eq!(config.store, StoreBackend::Sqlite("sqlite:diary.db".to_string()));
        assert_eq!(config.port, 8080);
        assert_eq!(config.analytics_concurrency, 1);
        assert_eq!(
            config.aggregator_config().entry_timeout,
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_unknown_database_scheme_is_rejected() {
        let result = load(&[
            ("DIARY_JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/diary"),
        ]);
        tokio_test::assert_err!(result);
    }
}
