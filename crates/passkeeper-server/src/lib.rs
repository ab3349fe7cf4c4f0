//! Passkeeper Server Library
//!
//! Per-user storage of passwords, bank cards, free text and files behind
//! token authentication.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod keeper;
pub mod models;
pub mod router;
pub mod storage;
pub mod token;

use std::sync::Arc;

use anyhow::Context;
use passkeeper_blob::BlobStore;
use tracing::{info, info_span};

use auth::{AuthGate, AuthService};
use config::{AppState, ServerConfig};
use keeper::{Keeper, StoragePorts};
use storage::SqlStorage;
use token::TokenService;

/// Wires storage, blobs, tokens and services together.
///
/// The storage handle is returned alongside the state so the caller can
/// close the pool on shutdown.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<(AppState, Arc<SqlStorage>)> {
    config.validate()?;
    config.ensure_dirs().await?;

    let storage = Arc::new(
        SqlStorage::connect(
            &config.database_url,
            config.max_connections,
            info_span!("storage"),
        )
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?,
    );
    info!("Storage ready at {}", config.database_url);

    let blobs = BlobStore::open(&config.blob_dir)
        .await
        .with_context(|| format!("failed to open blob directory {:?}", config.blob_dir))?;
    info!("Blob store ready at {:?}", blobs.root());

    let mut tokens = TokenService::new(&config.token_secret);
    if let Some(ttl) = config.token_ttl {
        tokens = tokens.with_ttl(ttl);
    }

    let auth = AuthService::new(storage.clone(), tokens.clone(), info_span!("auth"))
        .with_hash_cost(config.hash_cost);
    let keeper = Keeper::new(
        StoragePorts::shared(storage.clone()),
        blobs,
        info_span!("keeper"),
    );
    let gate = AuthGate::new(tokens, info_span!("gate"));

    let state = AppState {
        auth: Arc::new(auth),
        keeper: Arc::new(keeper),
        gate: Arc::new(gate),
    };
    Ok((state, storage))
}

pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    info!("=== Passkeeper Server ===");

    let (state, storage) = build_state(&config).await?;
    let app = router::app_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, closing storage");
    storage.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
