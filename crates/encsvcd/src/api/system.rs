//! `GET /` banner and `GET /api/health`

use axum::extract::State;
use axum::Json;
use encsvc_core::{AlgorithmSpec, HealthStatus};

use crate::api::types::Banner;
use crate::app::AppState;
use crate::health::check_health;

pub(crate) async fn banner() -> Json<Banner> {
    Json(Banner {
        service: "encsvc",
        version: env!("CARGO_PKG_VERSION"),
        algorithms: AlgorithmSpec::ALL.to_vec(),
        endpoints: vec![
            "POST /api/encrypt",
            "POST /api/decrypt",
            "GET /api/generate-key",
            "GET /api/health",
            "GET /download/{id}/{name}",
            "GET /metrics",
        ],
    })
}

/// Always 200; the state lives in the body.
pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let status = check_health(state.store.clone(), state.health_budget()).await;
    tracing::debug!(status = %status.status, "health checked");
    Json(status)
}
