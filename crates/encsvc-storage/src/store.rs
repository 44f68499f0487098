//! Artifact store: staging files, atomic publish, retention

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use encsvc_core::types::Artifact;
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

const STAGING_DIR: &str = "staging";
const ARTIFACTS_DIR: &str = "artifacts";

/// URL prefix artifacts are served under
pub const DOWNLOAD_PREFIX: &str = "/download";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    staging: PathBuf,
    artifacts: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let staging = root.join(STAGING_DIR);
        let artifacts = root.join(ARTIFACTS_DIR);
        for dir in [&staging, &artifacts] {
            fs::create_dir_all(dir).map_err(|e| StoreError::io("creating", dir, e))?;
        }
        tracing::debug!(root = %root.display(), "artifact store opened");
        Ok(Self {
            root,
            staging,
            artifacts,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory served read-only under `/download`
    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// New anonymous staging file, removed when dropped.
    pub fn stage(&self) -> StoreResult<NamedTempFile> {
        tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&self.staging)
            .map_err(|e| StoreError::io("creating staging file in", &self.staging, e))
    }

    /// Start writing an artifact that will be published as `name`.
    ///
    /// `name` must already be sanitized. Nothing is visible under the
    /// artifacts directory until [`PendingArtifact::publish`].
    pub fn begin(
        &self,
        name: impl Into<String>,
        original_file_name: impl Into<String>,
    ) -> StoreResult<PendingArtifact> {
        let file = tempfile::Builder::new()
            .prefix("output-")
            .tempfile_in(&self.staging)
            .map_err(|e| StoreError::io("creating staging file in", &self.staging, e))?;
        Ok(PendingArtifact {
            file,
            name: name.into(),
            original_file_name: original_file_name.into(),
            artifacts: self.artifacts.clone(),
        })
    }

    /// Remove leftover staging files. Only safe before requests are served.
    pub fn clean_staging(&self) -> StoreResult<usize> {
        let mut removed = 0;
        let entries =
            fs::read_dir(&self.staging).map_err(|e| StoreError::io("listing", &self.staging, e))?;
        for entry in entries {
            let path = entry
                .map_err(|e| StoreError::io("listing", &self.staging, e))?
                .path();
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(path = %path.display(), "failed to remove stale staging entry: {e}"),
            }
        }
        if removed > 0 {
            tracing::info!(removed, "cleaned stale staging files");
        }
        Ok(removed)
    }

    /// Delete artifact directories last modified more than `max_age` ago.
    pub fn purge_expired(&self, max_age: Duration) -> StoreResult<usize> {
        self.purge_older_than(SystemTime::now(), max_age)
    }

    fn purge_older_than(&self, now: SystemTime, max_age: Duration) -> StoreResult<usize> {
        let mut purged = 0;
        let entries = fs::read_dir(&self.artifacts)
            .map_err(|e| StoreError::io("listing", &self.artifacts, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io("listing", &self.artifacts, e))?;
            let path = entry.path();
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "cannot stat artifact: {e}");
                    continue;
                }
            };
            // Clock skew (modified in the future) counts as fresh
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }
            match fs::remove_dir_all(&path) {
                Ok(()) => {
                    purged += 1;
                    tracing::debug!(path = %path.display(), age_secs = age.as_secs(), "purged artifact");
                }
                Err(e) => tracing::warn!(path = %path.display(), "failed to purge artifact: {e}"),
            }
        }
        Ok(purged)
    }
}

/// An artifact being written in the staging area.
///
/// Dropping it without publishing deletes the partial output.
pub struct PendingArtifact {
    file: NamedTempFile,
    name: String,
    original_file_name: String,
    artifacts: PathBuf,
}

impl PendingArtifact {
    pub fn file_mut(&mut self) -> &mut File {
        self.file.as_file_mut()
    }

    /// Move the finished file into `artifacts/<uuid>/<name>` in one rename.
    pub fn publish(self) -> StoreResult<Artifact> {
        let id = Uuid::new_v4().to_string();
        let dir = self.artifacts.join(&id);
        fs::create_dir(&dir).map_err(|e| StoreError::io("creating", &dir, e))?;
        let dest = dir.join(&self.name);

        let file = self.file.as_file();
        file.sync_all()
            .map_err(|e| StoreError::io("syncing", self.file.path(), e))?;
        let size_bytes = file
            .metadata()
            .map_err(|e| StoreError::io("stat", self.file.path(), e))?
            .len();

        if let Err(e) = self.file.persist(&dest) {
            let _ = fs::remove_dir(&dir);
            return Err(StoreError::Persist {
                path: dest,
                source: e.error,
            });
        }

        let storage_path = format!("{DOWNLOAD_PREFIX}/{id}/{}", self.name);
        tracing::debug!(path = %storage_path, size_bytes, "artifact published");
        Ok(Artifact {
            original_file_name: self.original_file_name,
            storage_path,
            size_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn publish(store: &ArtifactStore, name: &str, body: &[u8]) -> Artifact {
        let mut pending = store.begin(name, name).unwrap();
        pending.file_mut().write_all(body).unwrap();
        pending.publish().unwrap()
    }

    fn on_disk(store: &ArtifactStore, artifact: &Artifact) -> PathBuf {
        let rel = artifact
            .storage_path
            .strip_prefix(DOWNLOAD_PREFIX)
            .unwrap()
            .trim_start_matches('/');
        store.artifacts_dir().join(rel)
    }

    #[test]
    fn test_open_creates_layout() {
        let (dir, store) = store();
        assert!(dir.path().join("staging").is_dir());
        assert!(dir.path().join("artifacts").is_dir());
        assert_eq!(store.root(), dir.path());
    }

    #[test]
    fn test_publish_moves_into_artifacts() {
        let (_dir, store) = store();
        let artifact = publish(&store, "hello.txt.enc", b"ciphertext");

        assert!(artifact.storage_path.starts_with("/download/"));
        assert!(artifact.storage_path.ends_with("/hello.txt.enc"));
        assert_eq!(artifact.size_bytes, 10);
        assert_eq!(fs::read(on_disk(&store, &artifact)).unwrap(), b"ciphertext");
        assert_eq!(fs::read_dir(store.staging_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_same_name_gets_distinct_paths() {
        let (_dir, store) = store();
        let a = publish(&store, "same.enc", b"first");
        let b = publish(&store, "same.enc", b"second");
        assert_ne!(a.storage_path, b.storage_path);
        assert_eq!(fs::read(on_disk(&store, &a)).unwrap(), b"first");
        assert_eq!(fs::read(on_disk(&store, &b)).unwrap(), b"second");
    }

    #[test]
    fn test_dropped_pending_leaves_nothing() {
        let (_dir, store) = store();
        {
            let mut pending = store.begin("partial.enc", "partial").unwrap();
            pending.file_mut().write_all(b"half").unwrap();
        }
        assert_eq!(fs::read_dir(store.staging_dir()).unwrap().count(), 0);
        assert_eq!(fs::read_dir(store.artifacts_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_clean_staging() {
        let (_dir, store) = store();
        fs::write(store.staging_dir().join("upload-stale"), b"x").unwrap();
        fs::write(store.staging_dir().join("output-stale"), b"y").unwrap();
        assert_eq!(store.clean_staging().unwrap(), 2);
        assert_eq!(fs::read_dir(store.staging_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_purge_removes_only_expired() {
        let (_dir, store) = store();
        let artifact = publish(&store, "old.enc", b"data");
        let retention = Duration::from_secs(60);

        // Nothing is older than a minute yet
        assert_eq!(store.purge_expired(retention).unwrap(), 0);
        assert!(on_disk(&store, &artifact).exists());

        // Pretend two minutes have passed
        let later = SystemTime::now() + Duration::from_secs(120);
        assert_eq!(store.purge_older_than(later, retention).unwrap(), 1);
        assert!(!on_disk(&store, &artifact).exists());
    }
}
