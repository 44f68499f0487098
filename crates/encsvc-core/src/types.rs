use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ServiceError;

/// Cipher selected by a request.
///
/// Wire names are the lowercase strings the browser client sends in the
/// `algorithm` form field and query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmSpec {
    Aes128,
    Aes256,
    Blowfish,
    Rsa,
}

/// Key lengths an algorithm accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySizes {
    /// Exactly this many bytes
    Fixed(usize),
    /// Any byte length in the inclusive range
    Range(usize, usize),
    /// Modulus sizes in bits
    ModulusBits(&'static [usize]),
}

impl KeySizes {
    pub fn accepts(&self, len: usize) -> bool {
        match *self {
            KeySizes::Fixed(n) => len == n,
            KeySizes::Range(lo, hi) => (lo..=hi).contains(&len),
            KeySizes::ModulusBits(bits) => bits.contains(&len),
        }
    }
}

impl fmt::Display for KeySizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySizes::Fixed(n) => write!(f, "exactly {n} bytes"),
            KeySizes::Range(lo, hi) => write!(f, "{lo} to {hi} bytes"),
            KeySizes::ModulusBits(bits) => {
                let list: Vec<String> = bits.iter().map(|b| b.to_string()).collect();
                write!(f, "one of {} bits", list.join(", "))
            }
        }
    }
}

pub const RSA_MODULUS_BITS: &[usize] = &[2048, 3072, 4096];

impl AlgorithmSpec {
    pub const ALL: [AlgorithmSpec; 4] = [
        AlgorithmSpec::Aes128,
        AlgorithmSpec::Aes256,
        AlgorithmSpec::Blowfish,
        AlgorithmSpec::Rsa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmSpec::Aes128 => "aes128",
            AlgorithmSpec::Aes256 => "aes256",
            AlgorithmSpec::Blowfish => "blowfish",
            AlgorithmSpec::Rsa => "rsa",
        }
    }

    /// Identifier byte stored in artifact headers
    pub fn id(&self) -> u8 {
        match self {
            AlgorithmSpec::Aes128 => 1,
            AlgorithmSpec::Aes256 => 2,
            AlgorithmSpec::Blowfish => 3,
            AlgorithmSpec::Rsa => 4,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }

    pub fn key_sizes(&self) -> KeySizes {
        match self {
            AlgorithmSpec::Aes128 => KeySizes::Fixed(16),
            AlgorithmSpec::Aes256 => KeySizes::Fixed(32),
            AlgorithmSpec::Blowfish => KeySizes::Range(4, 56),
            AlgorithmSpec::Rsa => KeySizes::ModulusBits(RSA_MODULUS_BITS),
        }
    }

    /// Length used by key generation when the caller gives none
    /// (bytes for symmetric ciphers, modulus bits for RSA).
    pub fn default_key_length(&self) -> usize {
        match self {
            AlgorithmSpec::Aes128 => 16,
            AlgorithmSpec::Aes256 => 32,
            AlgorithmSpec::Blowfish => 32,
            AlgorithmSpec::Rsa => 2048,
        }
    }

    pub fn is_symmetric(&self) -> bool {
        !matches!(self, AlgorithmSpec::Rsa)
    }
}

impl fmt::Display for AlgorithmSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlgorithmSpec {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ServiceError::UnsupportedAlgorithm(format!(
                    "unsupported algorithm '{wanted}' (expected one of: aes256, aes128, blowfish, rsa)"
                ))
            })
    }
}

/// A stored output file (encrypted or decrypted) that the client downloads
/// by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Name of the file as uploaded by the client
    pub original_file_name: String,
    /// URL path under which the artifact is served, e.g. `/download/<id>/<name>`
    pub storage_path: String,
    /// Size of the stored artifact in bytes
    pub size_bytes: u64,
}

pub type EncryptedArtifact = Artifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Degraded,
    Down,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Ok => f.write_str("ok"),
            HealthState::Degraded => f.write_str("degraded"),
            HealthState::Down => f.write_str("down"),
        }
    }
}

/// Health report returned by `GET /api/health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub message: String,
}

impl HealthStatus {
    pub fn new(status: HealthState, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
