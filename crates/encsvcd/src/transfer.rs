//! File transfer jobs: staged upload in, published artifact out
//!
//! A job runs on the blocking pool. It reads the staged upload through a
//! cancellable reader, streams it through the cipher adapter into a pending
//! artifact, and publishes the result only when the cipher succeeded.

use std::fmt;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};

use encsvc_core::types::Artifact;
use encsvc_core::{AlgorithmSpec, ServiceError, ServiceResult};
use encsvc_crypto::{adapter_for, SealOptions, UserKey};
use encsvc_storage::{decrypted_name, encrypted_name, ArtifactStore, PendingArtifact};
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Encrypt,
    Decrypt,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Encrypt => "encrypt",
            TransferMode::Decrypt => "decrypt",
        }
    }

    /// Name the output artifact is published under
    pub fn output_name(&self, original: &str) -> String {
        match self {
            TransferMode::Encrypt => encrypted_name(original),
            TransferMode::Decrypt => decrypted_name(original),
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One encryption or decryption request with its upload already staged
pub struct TransferJob {
    pub mode: TransferMode,
    pub algorithm: AlgorithmSpec,
    pub key: UserKey,
    pub original_name: String,
    pub upload: NamedTempFile,
}

/// Outcome of a finished job
#[derive(Debug)]
pub struct TransferOutcome {
    pub artifact: Artifact,
    /// Plaintext bytes consumed (encrypt) or produced (decrypt)
    pub plaintext_bytes: u64,
}

/// Run a job to completion. Blocking; call from `spawn_blocking`.
///
/// The staged upload and any partial output are removed on every path.
pub fn run_job(
    store: &ArtifactStore,
    opts: &SealOptions,
    mut job: TransferJob,
    cancel: CancellationToken,
) -> ServiceResult<TransferOutcome> {
    let output_name = job.mode.output_name(&job.original_name);
    let mut pending = store.begin(output_name, job.original_name.clone())?;

    job.upload.as_file_mut().seek(SeekFrom::Start(0))?;
    let mut input = CancellableReader::new(BufReader::new(job.upload.as_file_mut()), cancel.clone());
    let adapter = adapter_for(job.algorithm);

    let result = {
        let mut output = BufWriter::new(pending.file_mut());
        let result = match job.mode {
            TransferMode::Encrypt => adapter.encrypt_stream(&mut input, &mut output, &job.key, opts),
            TransferMode::Decrypt => adapter.decrypt_stream(&mut input, &mut output, &job.key),
        };
        result.and_then(|n| {
            output.flush()?;
            Ok(n)
        })
    };

    let plaintext_bytes = match result {
        Ok(n) => n,
        Err(_) if cancel.is_cancelled() => return Err(abandoned(job.mode)),
        Err(e) => return Err(e.into()),
    };

    let artifact = publish_unless_cancelled(pending, job.mode, &cancel)?;
    Ok(TransferOutcome {
        artifact,
        plaintext_bytes,
    })
}

/// The cipher may finish after the client left; the output is then dropped
/// unpublished.
fn publish_unless_cancelled(
    pending: PendingArtifact,
    mode: TransferMode,
    cancel: &CancellationToken,
) -> ServiceResult<Artifact> {
    if cancel.is_cancelled() {
        return Err(abandoned(mode));
    }
    Ok(pending.publish()?)
}

fn abandoned(mode: TransferMode) -> ServiceError {
    tracing::debug!(%mode, "client went away, job abandoned");
    ServiceError::internal("request cancelled")
}

/// Reader that fails once its token is cancelled
pub struct CancellableReader<R> {
    inner: R,
    cancel: CancellationToken,
}

impl<R> CancellableReader<R> {
    pub fn new(inner: R, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "request cancelled",
            ));
        }
        self.inner.read(buf)
    }
}
