use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Request-level error taxonomy.
///
/// Every failure a request can hit is folded into one of these before it
/// reaches the HTTP boundary, where it is rendered as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed request field
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    UnsupportedAlgorithm(String),

    /// Wrong key, corrupted ciphertext, or authentication failure
    #[error("{0}")]
    Decryption(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }

    pub fn decryption(msg: impl Into<String>) -> Self {
        ServiceError::Decryption(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ServiceError::Internal(msg.into())
    }

    /// Stable machine-readable code for the error category
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            ServiceError::Decryption(_) => "decryption_failed",
            ServiceError::PayloadTooLarge(_) => "payload_too_large",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Internal(_) | ServiceError::Io(_) | ServiceError::Other(_) => "internal",
        }
    }

    /// True for failures caused by the server rather than by the request
    pub fn is_internal(&self) -> bool {
        self.code() == "internal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_per_category() {
        assert_eq!(ServiceError::validation("x").code(), "validation_error");
        assert_eq!(
            ServiceError::UnsupportedAlgorithm("x".into()).code(),
            "unsupported_algorithm"
        );
        assert_eq!(ServiceError::decryption("x").code(), "decryption_failed");
        assert_eq!(ServiceError::internal("x").code(), "internal");
    }

    #[test]
    fn test_io_and_anyhow_are_internal() {
        let io = ServiceError::from(std::io::Error::other("disk full"));
        assert!(io.is_internal());
        let other = ServiceError::from(anyhow::anyhow!("boom"));
        assert!(other.is_internal());
        assert!(!ServiceError::validation("bad").is_internal());
    }

    #[test]
    fn test_client_errors_display_message_verbatim() {
        let err = ServiceError::validation("file is required");
        assert_eq!(err.to_string(), "file is required");
    }
}
