//! encsvc-storage: local filesystem artifact store
//!
//! Layout under the configured root:
//! ```text
//! <root>/staging/              uploads and in-progress outputs (never served)
//! <root>/artifacts/<uuid>/name published artifacts, served under /download
//! ```

pub mod error;
pub mod health;
pub mod names;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use health::probe;
pub use names::{decrypted_name, encrypted_name, sanitize_file_name};
pub use store::{ArtifactStore, PendingArtifact};
