//! Prometheus metrics and the `/metrics` endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, family::Family, histogram::Histogram},
    registry::Registry,
};

use encsvc_core::ServiceError;

use crate::api::error::ApiError;
use crate::app::AppState;

type Labels = Vec<(String, String)>;

#[derive(Clone)]
pub struct Metrics {
    requests: Family<Labels, Counter>,
    bytes: Family<Labels, Counter>,
    duration: Family<Labels, Histogram>,
}

impl Metrics {
    pub fn new(registry: &mut Registry) -> Self {
        let requests = Family::default();
        let bytes = Family::default();
        let duration = Family::<Labels, Histogram>::new_with_constructor(|| {
            Histogram::new([0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0])
        });

        registry.register(
            "encsvc_requests",
            "Requests handled, by operation and outcome",
            requests.clone(),
        );
        registry.register(
            "encsvc_processed_bytes",
            "Plaintext bytes encrypted or decrypted",
            bytes.clone(),
        );
        registry.register(
            "encsvc_operation_duration_seconds",
            "Cipher operation duration in seconds",
            duration.clone(),
        );

        Metrics {
            requests,
            bytes,
            duration,
        }
    }

    /// Record one finished request. `outcome` is `ok` or an error code.
    pub fn record(&self, operation: &str, outcome: &str, bytes: u64, elapsed_secs: f64) {
        let labels = vec![
            ("operation".to_string(), operation.to_string()),
            ("outcome".to_string(), outcome.to_string()),
        ];
        self.requests.get_or_create(&labels).inc();

        let op = vec![("operation".to_string(), operation.to_string())];
        if bytes > 0 {
            self.bytes.get_or_create(&op).inc_by(bytes);
        }
        self.duration.get_or_create(&op).observe(elapsed_secs);
    }
}

pub(crate) async fn metrics_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let mut body = String::new();
    encode(&mut body, &state.registry).map_err(encode_failed)?;
    Ok((
        StatusCode::OK,
        [(
            "content-type",
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        body,
    ))
}

fn encode_failed(e: std::fmt::Error) -> ApiError {
    ServiceError::internal(format!("metrics encode failed: {e}")).into()
}
