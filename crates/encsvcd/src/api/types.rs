//! JSON request and response bodies

use encsvc_core::AlgorithmSpec;
use serde::{Deserialize, Serialize};

/// `POST /api/encrypt` success body
#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptResponse {
    /// Download path of the encrypted artifact
    pub encrypted_file: String,
    pub original_file: String,
    pub algorithm: AlgorithmSpec,
    pub message: String,
    pub size_bytes: u64,
}

/// `POST /api/decrypt` success body
#[derive(Debug, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Download path of the decrypted artifact
    pub decrypted_file: String,
    pub original_file: String,
    pub algorithm: AlgorithmSpec,
    pub message: String,
    pub size_bytes: u64,
}

/// `GET /api/generate-key` query. Both fields are optional and parsed by hand
/// so malformed values produce validation errors with a useful detail.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateKeyQuery {
    pub algorithm: Option<String>,
    pub length: Option<String>,
}

/// `GET /api/generate-key` success body
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateKeyResponse {
    pub key: String,
    pub algorithm: AlgorithmSpec,
    /// Bytes for symmetric algorithms, modulus bits for rsa
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// `GET /` body
#[derive(Debug, Serialize)]
pub struct Banner {
    pub service: &'static str,
    pub version: &'static str,
    pub algorithms: Vec<AlgorithmSpec>,
    pub endpoints: Vec<&'static str>,
}
