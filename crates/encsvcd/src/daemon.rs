//! Daemon lifecycle: storage setup, sweeper, HTTP server, graceful shutdown

use std::time::Duration;

use anyhow::{Context, Result};
use encsvc_core::config::EncsvcConfig;
use encsvc_storage::ArtifactStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::{build_router, AppState};

pub async fn run(config: EncsvcConfig) -> Result<()> {
    info!("daemon starting");

    let store = ArtifactStore::open(&config.storage.root)
        .with_context(|| format!("opening artifact store at {}", config.storage.root.display()))?;
    if let Err(e) = store.clean_staging() {
        warn!("staging cleanup failed: {e}");
    }

    if let Err(e) = encsvc_crypto::self_test() {
        warn!("cipher self-test failed at startup: {e}  (health will report down)");
    }
    match encsvc_storage::probe(&store) {
        Ok(()) => info!(root = %store.root().display(), "storage: ready"),
        Err(e) => warn!("storage probe failed: {e}  (health will report degraded)"),
    }

    let shutdown = CancellationToken::new();
    let sweeper = crate::sweeper::spawn(
        store.clone(),
        Duration::from_secs(config.storage.retention_secs),
        Duration::from_secs(config.storage.sweep_interval_secs),
        shutdown.clone(),
    );

    let listen = config.server.listen.clone();
    info!(
        max_upload_mb = config.server.max_upload_mb,
        workers = config.server.effective_workers(),
        frame_size = config.crypto.frame_size,
        cors_permissive = config.server.cors_permissive,
        "service configured"
    );
    let app = build_router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("binding {listen}"))?;
    info!(addr = %listen, "HTTP: listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server")?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }
    info!("daemon exiting cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
