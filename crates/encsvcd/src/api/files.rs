//! `POST /api/encrypt` and `POST /api/decrypt`
//!
//! Form fields: `file` (with a file name), `algorithm`, `key`. The file part
//! is streamed to a staging file as it arrives; the algorithm is validated the
//! moment its field is read. When `algorithm` precedes `file` an unknown
//! algorithm is rejected before any upload byte is read. When `file` comes
//! first (browser form order) it is staged, then discarded on rejection, and
//! an oversized file trips the body limit (413) before the algorithm is seen.

use std::time::Instant;

use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::Json;
use encsvc_core::{AlgorithmSpec, ServiceError};
use encsvc_crypto::UserKey;
use encsvc_storage::ArtifactStore;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::api::error::ApiError;
use crate::api::types::{DecryptResponse, EncryptResponse};
use crate::app::AppState;
use crate::transfer::{run_job, TransferJob, TransferMode, TransferOutcome};

pub(crate) async fn encrypt(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<EncryptResponse>, ApiError> {
    let (algorithm, outcome) = handle_transfer(&state, TransferMode::Encrypt, multipart).await?;
    Ok(Json(EncryptResponse {
        encrypted_file: outcome.artifact.storage_path,
        original_file: outcome.artifact.original_file_name,
        algorithm,
        message: format!("File encrypted successfully with {algorithm}"),
        size_bytes: outcome.artifact.size_bytes,
    }))
}

pub(crate) async fn decrypt(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DecryptResponse>, ApiError> {
    let (algorithm, outcome) = handle_transfer(&state, TransferMode::Decrypt, multipart).await?;
    Ok(Json(DecryptResponse {
        decrypted_file: outcome.artifact.storage_path,
        original_file: outcome.artifact.original_file_name,
        algorithm,
        message: format!("File decrypted successfully with {algorithm}"),
        size_bytes: outcome.artifact.size_bytes,
    }))
}

async fn handle_transfer(
    state: &AppState,
    mode: TransferMode,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(AlgorithmSpec, TransferOutcome), ApiError> {
    let started = Instant::now();
    let result = transfer(state, mode, multipart).await;
    let elapsed = started.elapsed().as_secs_f64();

    match &result {
        Ok((algorithm, outcome)) => {
            state
                .metrics
                .record(mode.as_str(), "ok", outcome.plaintext_bytes, elapsed);
            tracing::info!(
                %mode,
                %algorithm,
                file = %outcome.artifact.original_file_name,
                plaintext_bytes = outcome.plaintext_bytes,
                artifact_bytes = outcome.artifact.size_bytes,
                elapsed_ms = (elapsed * 1000.0) as u64,
                "transfer complete"
            );
        }
        Err(e) => {
            state.metrics.record(mode.as_str(), e.code(), 0, elapsed);
            tracing::info!(%mode, code = e.code(), detail = %e.body.detail, "transfer rejected");
        }
    }
    result
}

async fn transfer(
    state: &AppState,
    mode: TransferMode,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(AlgorithmSpec, TransferOutcome), ApiError> {
    let mut multipart = multipart?;
    let mut algorithm: Option<AlgorithmSpec> = None;
    let mut key: Option<UserKey> = None;
    let mut upload: Option<(String, NamedTempFile)> = None;

    while let Some(mut field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        match name.as_str() {
            "algorithm" => {
                let value = field.text().await?;
                algorithm = Some(value.parse::<AlgorithmSpec>()?);
            }
            "key" => {
                key = Some(UserKey::new(field.text().await?)?);
            }
            "file" => {
                let file_name = field
                    .file_name()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned)
                    .ok_or_else(|| ApiError::validation("file name is required"))?;
                let staged = stage_upload(&state.store, &mut field).await?;
                upload = Some((file_name, staged));
            }
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    let algorithm = algorithm.ok_or_else(|| ApiError::validation("algorithm is required"))?;
    let key = key.ok_or_else(|| ApiError::validation("key is required"))?;
    let (original_name, upload) = upload.ok_or_else(|| ApiError::validation("file is required"))?;

    let permit = state
        .workers
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| ServiceError::internal("worker pool closed"))?;

    // Fires if this future is dropped (client disconnected) before the job ends
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let store = state.store.clone();
    let opts = state.seal;
    let job = TransferJob {
        mode,
        algorithm,
        key,
        original_name,
        upload,
    };
    let outcome = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        run_job(&store, &opts, job, cancel)
    })
    .await
    .map_err(|e| ServiceError::internal(format!("transfer task failed: {e}")))??;

    Ok((algorithm, outcome))
}

/// Stream one file field into a new staging file.
async fn stage_upload(store: &ArtifactStore, field: &mut Field<'_>) -> Result<NamedTempFile, ApiError> {
    let staged = store.stage()?;
    let mut file = tokio::fs::File::from_std(staged.as_file().try_clone()?);
    let mut received = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        received += chunk.len() as u64;
    }
    file.flush().await?;
    tracing::debug!(received, "upload staged");
    Ok(staged)
}
