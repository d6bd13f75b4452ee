//! Diary study HTTP server.
//!
//! Serves the JSON API over courses, apps, entries and analytics. Every
//! response uses the `{code, message, data}` envelope from the `protocol`
//! crate.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use analytics::TextAnalyticsEngine;
use auth::IdentityProvider;
use axum::Router;
use diary_store::DiaryStore;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::state::AppState;

/// Creates the application router with all routes configured.
pub fn create_app<S: DiaryStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api::create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Creates the application state with the given configuration and store.
pub fn create_state<S: DiaryStore>(
    config: Config,
    store: S,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    engine: Arc<dyn TextAnalyticsEngine>,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(config, store, identity_provider, engine))
}

/// Initializes tracing with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("diary_server={},tower_http=info", log_level)));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
