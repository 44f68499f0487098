//! encsvc-core: types, configuration, and errors shared by every encsvc crate

pub mod config;
pub mod error;
pub mod types;

pub use error::{ServiceError, ServiceResult};
pub use types::{AlgorithmSpec, EncryptedArtifact, HealthState, HealthStatus};
