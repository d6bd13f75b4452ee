//! Diary study server binary.

use std::{net::SocketAddr, sync::Arc};

use analytics::{LexicalEngine, TextAnalyticsEngine};
use auth::{IdentityProvider, OidcAuth};
use diary_server::{
    config::{Config, StoreBackend},
    create_app, create_state, init_tracing,
};
use diary_store::{DiaryStore, MemoryDiaryStore, SqliteDiaryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        oidc = config.oidc_configured(),
        "Starting diary study server"
    );

    match config.store.clone() {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on exit");
            serve(config, MemoryDiaryStore::new()).await
        }
        StoreBackend::Sqlite(url) => {
            let store = SqliteDiaryStore::connect(&url).await?;
            tracing::info!(url = %url, "Connected to SQLite");
            serve(config, store).await
        }
    }
}

async fn serve<S: DiaryStore + 'static>(config: Config, store: S) -> anyhow::Result<()> {
    let identity_provider: Option<Arc<dyn IdentityProvider>> = match config.oidc.clone() {
        Some(oidc) => Some(Arc::new(OidcAuth::new(oidc)) as Arc<dyn IdentityProvider>),
        None => {
            tracing::warn!("OIDC is not configured, sign-in is disabled");
            None
        }
    };
    let engine: Arc<dyn TextAnalyticsEngine> = Arc::new(LexicalEngine::new()?);

    let addr: SocketAddr = config.server_addr().parse()?;
    let state = create_state(config, store, identity_provider, engine);
    let app = create_app(state);

    tracing::info!(addr = %addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}
