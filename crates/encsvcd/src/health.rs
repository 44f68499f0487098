//! Service health: cipher self-test plus storage probe under a time budget

use std::time::Duration;

use encsvc_core::{HealthState, HealthStatus};
use encsvc_storage::ArtifactStore;

/// Compute the current health status.
///
/// `down` when the cipher self-test fails, `degraded` when storage is
/// unusable or the check overruns `budget`, `ok` otherwise.
pub async fn check_health(store: ArtifactStore, budget: Duration) -> HealthStatus {
    let work = tokio::task::spawn_blocking(move || {
        let cipher = encsvc_crypto::self_test();
        let storage = encsvc_storage::probe(&store);
        (cipher, storage)
    });

    match tokio::time::timeout(budget, work).await {
        Err(_) => {
            tracing::warn!(budget_ms = budget.as_millis() as u64, "health check timed out");
            HealthStatus::new(
                HealthState::Degraded,
                format!("health check exceeded {} ms", budget.as_millis()),
            )
        }
        Ok(Err(e)) => {
            tracing::error!("health check task failed: {e}");
            HealthStatus::new(HealthState::Down, "health check could not run")
        }
        Ok(Ok((Err(e), _))) => {
            tracing::error!(error = %e, "cipher self-test failed");
            HealthStatus::new(HealthState::Down, "cipher self-test failed")
        }
        Ok(Ok((Ok(()), Err(e)))) => {
            tracing::warn!(error = %e, "storage probe failed");
            HealthStatus::new(HealthState::Degraded, "storage unavailable")
        }
        Ok(Ok((Ok(()), Ok(())))) => {
            HealthStatus::new(HealthState::Ok, "Encryption service is running")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_healthy_store_is_ok_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let budget = Duration::from_secs(10);

        let first = check_health(store.clone(), budget).await;
        let second = check_health(store, budget).await;
        assert_eq!(first.status, HealthState::Ok);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_storage_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("root")).unwrap();
        std::fs::remove_dir_all(store.root()).unwrap();

        let status = check_health(store, Duration::from_secs(10)).await;
        assert_eq!(status.status, HealthState::Degraded);
        assert_eq!(status.message, "storage unavailable");
    }
}
