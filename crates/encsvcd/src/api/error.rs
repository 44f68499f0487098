//! HTTP error mapping
//!
//! Every non-2xx response carries `{"detail": ..., "code": ...}`. Internal
//! failures are logged with their cause and returned with a generic detail.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use encsvc_core::ServiceError;
use encsvc_crypto::CryptoError;
use encsvc_storage::StoreError;
use serde::Serialize;

const INTERNAL_DETAIL: &str = "internal server error";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, detail: impl Into<String>) -> Self {
        ApiError {
            status,
            body: ErrorBody {
                detail: detail.into(),
                code: code.to_string(),
            },
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        ServiceError::validation(detail).into()
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        ServiceError::NotFound(detail.into()).into()
    }

    pub fn code(&self) -> &str {
        &self.body.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Validation(_) | ServiceError::UnsupportedAlgorithm(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::Decryption(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Internal(_) | ServiceError::Io(_) | ServiceError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if err.is_internal() {
            tracing::error!(error = %err, "request failed");
            return ApiError::new(status, err.code(), INTERNAL_DETAIL);
        }
        ApiError::new(status, err.code(), err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ServiceError::from(err).into()
    }
}

/// Errors while reading multipart fields. The body limit surfaces here as 413.
impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ServiceError::PayloadTooLarge(
                "upload exceeds the maximum allowed size".to_string(),
            )
            .into();
        }
        ApiError::validation(format!("invalid multipart body: {}", err.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        ApiError::validation(format!(
            "expected a multipart/form-data body: {}",
            err.body_text()
        ))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        ApiError::validation(format!("invalid query string: {}", err.body_text()))
    }
}

/// Fallback for unknown routes and missing downloads
pub(crate) async fn not_found() -> ApiError {
    ApiError::not_found("not found")
}
