//! HTTP application wiring: shared state, router, middleware

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::handler::HandlerWithoutStateExt;
use axum::routing::{get, post};
use axum::Router;
use encsvc_core::config::EncsvcConfig;
use encsvc_crypto::SealOptions;
use encsvc_storage::ArtifactStore;
use prometheus_client::registry::Registry;
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::metrics::{metrics_handler, Metrics};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EncsvcConfig>,
    pub store: ArtifactStore,
    pub seal: SealOptions,
    /// Admission control for cipher jobs on the blocking pool
    pub workers: Arc<Semaphore>,
    pub metrics: Metrics,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(config: EncsvcConfig, store: ArtifactStore) -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        let workers = config.server.effective_workers();
        tracing::debug!(workers, "cipher worker slots");
        Self {
            seal: SealOptions::from(&config.crypto),
            workers: Arc::new(Semaphore::new(workers)),
            config: Arc::new(config),
            store,
            metrics,
            registry: Arc::new(registry),
        }
    }

    pub fn health_budget(&self) -> Duration {
        Duration::from_millis(self.config.server.health_timeout_ms)
    }
}

pub fn build_router(state: AppState) -> Router {
    let downloads = ServeDir::new(state.store.artifacts_dir())
        .not_found_service(crate::api::error::not_found.into_service());

    let mut router = Router::new()
        .route("/", get(api::system::banner))
        .route("/api/encrypt", post(api::files::encrypt))
        .route("/api/decrypt", post(api::files::decrypt))
        .route("/api/generate-key", get(api::keys::generate_key))
        .route("/api/health", get(api::system::health))
        .route("/metrics", get(metrics_handler))
        .nest_service("/download", downloads)
        .fallback(api::error::not_found)
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_bytes()))
        .layer(TraceLayer::new_for_http());

    if state.config.server.cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}
