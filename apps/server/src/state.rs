//! Application state.

use std::sync::Arc;

use access::{AccessResolver, Actor, EnrollmentGraph, StopwordLedger};
use analytics::{Aggregator, TextAnalyticsEngine};
use auth::{IdentityProvider, JwtConfig, JwtManager, VerifiedIdentity};
use diary_store::DiaryStore;
use entities::User;

use crate::config::Config;
use crate::error::{ServerError, ServerResult};

/// Shared application state.
pub struct AppState<S: DiaryStore> {
    /// Server configuration.
    pub config: Config,
    pub store: Arc<S>,
    /// Issues and verifies session tokens.
    pub jwt_manager: JwtManager,
    /// Code exchange for sign-in. `None` when no provider is configured.
    pub identity_provider: Option<Arc<dyn IdentityProvider>>,
    pub resolver: AccessResolver<S>,
    pub enrollment: EnrollmentGraph<S>,
    pub stopwords: StopwordLedger<S>,
    pub aggregator: Aggregator<dyn TextAnalyticsEngine>,
}

impl<S: DiaryStore> AppState<S> {
    /// Creates new application state.
    pub fn new(
        config: Config,
        store: S,
        identity_provider: Option<Arc<dyn IdentityProvider>>,
        engine: Arc<dyn TextAnalyticsEngine>,
    ) -> Self {
        let jwt_manager = JwtManager::new(
            JwtConfig::new(config.jwt_secret.clone())
                .with_expiration_hours(config.jwt_expiration_hours),
        );
        let aggregator = Aggregator::with_config(engine, config.aggregator_config());
        let store = Arc::new(store);

        Self {
            config,
            resolver: AccessResolver::new(store.clone()),
            enrollment: EnrollmentGraph::new(store.clone()),
            stopwords: StopwordLedger::new(store.clone()),
            store,
            jwt_manager,
            identity_provider,
            aggregator,
        }
    }

    /// Loads the registered user behind a verified identity.
    pub async fn current_user(&self, identity: &VerifiedIdentity) -> ServerResult<(User, Actor)> {
        let user = self
            .store
            .get_user_by_email(&identity.email)
            .await?
            .ok_or(ServerError::NotRegistered)?;
        let actor = Actor::from(&user);
        Ok((user, actor))
    }
}

/// Type alias for shared state.
pub type SharedState<S> = Arc<AppState<S>>;
