//! Background retention sweeper

use std::time::Duration;

use encsvc_storage::ArtifactStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn the sweeper. Returns `None` when retention is disabled.
pub fn spawn(
    store: ArtifactStore,
    retention: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if retention.is_zero() {
        info!("artifact retention disabled; sweeper not started");
        return None;
    }
    let interval = interval.max(Duration::from_secs(1));
    info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "retention sweeper started"
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("retention sweeper stopping");
                    break;
                }
                _ = ticker.tick() => sweep_once(&store, retention).await,
            }
        }
    }))
}

async fn sweep_once(store: &ArtifactStore, retention: Duration) {
    let store = store.clone();
    match tokio::task::spawn_blocking(move || store.purge_expired(retention)).await {
        Ok(Ok(0)) => {}
        Ok(Ok(purged)) => info!(purged, "expired artifacts purged"),
        Ok(Err(e)) => warn!("retention sweep failed: {e}"),
        Err(e) => warn!("retention sweep task failed: {e}"),
    }
}
