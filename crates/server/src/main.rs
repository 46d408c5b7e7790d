use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use server::{
    build_router,
    config::{load_settings, Settings, StoreBackend},
    AppState,
};
use server_api::ApiContext;
use storage::{DocumentStore, MemoryDocumentStore, RemoteDocumentStore, SqliteDocumentStore};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings()?;
    let store = open_store(&settings).await?;
    info!(backend = store.backend_name(), "document store ready");

    let app = build_router(Arc::new(AppState::new(ApiContext::new(store))));

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn DocumentStore>> {
    Ok(match settings.store_backend {
        StoreBackend::Memory => {
            warn!("using the in-memory store; records are lost on shutdown");
            Arc::new(MemoryDocumentStore::new())
        }
        StoreBackend::Sqlite => {
            let database_url = &settings.database_url;
            let store = SqliteDocumentStore::new(database_url)
                .await
                .map_err(|error| {
                    error!(
                        %database_url,
                        %error,
                        "failed to open SQLite database; verify the path and permissions"
                    );
                    error
                })?;
            Arc::new(store)
        }
        StoreBackend::Remote => {
            let store = RemoteDocumentStore::new(&settings.store)?;
            info!(endpoint = %store.endpoint(), "using remote document store");
            Arc::new(store)
        }
    })
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
