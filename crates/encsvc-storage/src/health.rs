//! Storage health probe

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::error::{StoreError, StoreResult};
use crate::store::ArtifactStore;

const PROBE_BYTES: &[u8] = b"encsvc storage probe";

/// Verify the store is writable by writing, reading back, and removing a
/// file in the staging area.
pub fn probe(store: &ArtifactStore) -> StoreResult<()> {
    let mut file = tempfile::Builder::new()
        .prefix("probe-")
        .tempfile_in(store.staging_dir())
        .map_err(|e| StoreError::io("creating probe file in", store.staging_dir(), e))?;
    let path = file.path().to_path_buf();

    file.write_all(PROBE_BYTES)
        .and_then(|_| file.flush())
        .map_err(|e| StoreError::io("writing", &path, e))?;

    let mut readback = Vec::with_capacity(PROBE_BYTES.len());
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_end(&mut readback))
        .map_err(|e| StoreError::io("reading", &path, e))?;
    if readback != PROBE_BYTES {
        return Err(StoreError::io(
            "verifying",
            &path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, "probe content mismatch"),
        ));
    }

    file.close().map_err(|e| StoreError::io("removing", &path, e))?;

    // The artifacts directory must still exist for downloads to work
    fs::metadata(store.artifacts_dir())
        .map_err(|e| StoreError::io("checking", store.artifacts_dir(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_ok_and_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        probe(&store).unwrap();
        probe(&store).unwrap();
        assert_eq!(fs::read_dir(store.staging_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_probe_fails_when_root_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("root")).unwrap();
        fs::remove_dir_all(store.root()).unwrap();
        assert!(probe(&store).is_err());
    }
}
