use encsvc_core::ServiceError;
use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// The supplied key cannot be used with the requested algorithm
    #[error("{0}")]
    InvalidKey(String),

    /// Wrong key, corrupted or truncated artifact, or failed authentication
    #[error("{0}")]
    Decryption(String),

    #[error("{0}")]
    UnsupportedAlgorithm(String),

    #[error("random source unavailable: {0}")]
    Rng(String),

    #[error("{0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    pub(crate) fn decryption(msg: impl Into<String>) -> Self {
        CryptoError::Decryption(msg.into())
    }

    pub(crate) fn invalid_key(msg: impl Into<String>) -> Self {
        CryptoError::InvalidKey(msg.into())
    }
}

impl From<CryptoError> for ServiceError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKey(msg) => ServiceError::Validation(msg),
            CryptoError::Decryption(msg) => ServiceError::Decryption(msg),
            CryptoError::UnsupportedAlgorithm(msg) => ServiceError::UnsupportedAlgorithm(msg),
            CryptoError::Rng(msg) => ServiceError::Internal(format!("random source unavailable: {msg}")),
            CryptoError::Internal(msg) => ServiceError::Internal(msg),
            CryptoError::Io(e) => ServiceError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_onto_service_taxonomy() {
        let v: ServiceError = CryptoError::invalid_key("bad key").into();
        assert_eq!(v.code(), "validation_error");

        let d: ServiceError = CryptoError::decryption("tag mismatch").into();
        assert_eq!(d.code(), "decryption_failed");

        let r: ServiceError = CryptoError::Rng("no entropy".into()).into();
        assert!(r.is_internal());
    }
}
