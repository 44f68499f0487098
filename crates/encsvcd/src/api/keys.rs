//! `GET /api/generate-key?algorithm=&length=`

use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use encsvc_core::{AlgorithmSpec, ServiceError};

use crate::api::error::ApiError;
use crate::api::types::{GenerateKeyQuery, GenerateKeyResponse};
use crate::app::AppState;

pub(crate) async fn generate_key(
    State(state): State<AppState>,
    query: Result<Query<GenerateKeyQuery>, QueryRejection>,
) -> Result<Json<GenerateKeyResponse>, ApiError> {
    let started = Instant::now();
    let result = generate(&state, query).await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    };
    state
        .metrics
        .record("generate_key", outcome, 0, started.elapsed().as_secs_f64());
    result.map(Json)
}

async fn generate(
    state: &AppState,
    query: Result<Query<GenerateKeyQuery>, QueryRejection>,
) -> Result<GenerateKeyResponse, ApiError> {
    let Query(query) = query?;
    let (algorithm, length) = parse_request(&query)?;

    // Cheap for symmetric keys, seconds for large RSA moduli
    let permit = state
        .workers
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ServiceError::internal("worker pool closed"))?;
    let generated = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        encsvc_crypto::generate_key(algorithm, length)
    })
    .await
    .map_err(|e| ServiceError::internal(format!("key generation task failed: {e}")))??;

    tracing::info!(%algorithm, length, "key generated");
    Ok(GenerateKeyResponse {
        key: generated.expose_key().to_string(),
        algorithm: generated.algorithm,
        length: generated.length,
        public_key: generated.public_key,
    })
}

/// Apply defaults and parse the query. Unknown algorithms are rejected
/// before the length is looked at.
pub(crate) fn parse_request(query: &GenerateKeyQuery) -> Result<(AlgorithmSpec, usize), ApiError> {
    let algorithm = match query.algorithm.as_deref().map(str::trim) {
        None | Some("") => AlgorithmSpec::Aes256,
        Some(name) => name.parse::<AlgorithmSpec>()?,
    };
    let length = match query.length.as_deref().map(str::trim) {
        None | Some("") => algorithm.default_key_length(),
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(ApiError::validation(format!(
                    "length must be a positive integer, got '{raw}'"
                )))
            }
        },
    };
    encsvc_crypto::validate_length(algorithm, length)?;
    Ok((algorithm, length))
}
