//! Artifact container format
//!
//! Every encrypted artifact is self-contained: the header carries everything
//! except the secret needed to decrypt it.
//!
//! ```text
//! header:
//!   "ESVC" | version (1) | algorithm id (1) | key source (1) | frame size (4, BE)
//!   key source 1 (passphrase): salt (16) | m_cost (4) | t_cost (4) | p_cost (4)
//!   key source 2 (rsa):        wrapped len (2) | RSA-OAEP wrapped data key
//! frames:
//!   flag (1: 0 = more, 1 = final) | sealed len (4, BE) | sealed bytes
//! ```
//!
//! Each frame is sealed with AAD = SHA-256(header) || frame index (8, BE) || flag,
//! which binds it to its header and position and marks the end of the stream.

use encsvc_core::AlgorithmSpec;
use sha2::{Digest, Sha256};
use std::io::{self, Read};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::KdfParams;
use crate::SALT_SIZE;

pub const MAGIC: &[u8; 4] = b"ESVC";
pub const VERSION: u8 = 1;

/// Largest frame size a header may declare
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Largest RSA-wrapped key accepted (8192-bit modulus)
pub const MAX_WRAPPED_KEY_LEN: usize = 1024;

pub const FLAG_MORE: u8 = 0;
pub const FLAG_FINAL: u8 = 1;

const SOURCE_RAW: u8 = 0;
const SOURCE_PASSPHRASE: u8 = 1;
const SOURCE_RSA: u8 = 2;

/// How the cipher key of an artifact was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Caller supplied raw key bytes (hex)
    Raw,
    /// Derived from a passphrase with Argon2id
    Passphrase {
        salt: [u8; SALT_SIZE],
        params: KdfParams,
    },
    /// Random data key wrapped under an RSA public key
    RsaWrapped { wrapped_key: Vec<u8> },
}

impl KeySource {
    pub fn describe(&self) -> &'static str {
        match self {
            KeySource::Raw => "raw key",
            KeySource::Passphrase { .. } => "passphrase (argon2id)",
            KeySource::RsaWrapped { .. } => "rsa-oaep wrapped data key",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub algorithm: AlgorithmSpec,
    pub key_source: KeySource,
    pub frame_size: u32,
}

impl Header {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.push(self.algorithm.id());
        match &self.key_source {
            KeySource::Raw => out.push(SOURCE_RAW),
            KeySource::Passphrase { .. } => out.push(SOURCE_PASSPHRASE),
            KeySource::RsaWrapped { .. } => out.push(SOURCE_RSA),
        }
        out.extend_from_slice(&self.frame_size.to_be_bytes());
        match &self.key_source {
            KeySource::Raw => {}
            KeySource::Passphrase { salt, params } => {
                out.extend_from_slice(salt);
                out.extend_from_slice(&params.mem_cost_kib.to_be_bytes());
                out.extend_from_slice(&params.time_cost.to_be_bytes());
                out.extend_from_slice(&params.parallelism.to_be_bytes());
            }
            KeySource::RsaWrapped { wrapped_key } => {
                out.extend_from_slice(&(wrapped_key.len() as u16).to_be_bytes());
                out.extend_from_slice(wrapped_key);
            }
        }
        out
    }

    /// Read and validate a header from the start of an artifact.
    ///
    /// Returns the header and the exact bytes it was parsed from, which feed
    /// the frame AAD.
    pub fn read_from(input: &mut dyn Read) -> CryptoResult<(Header, Vec<u8>)> {
        let mut reader = Recording::new(input);

        let mut fixed = [0u8; 11];
        reader.read_exact(&mut fixed)?;
        if &fixed[..4] != MAGIC {
            return Err(CryptoError::decryption(
                "not an encrypted artifact (bad magic); was this file produced by /api/encrypt?",
            ));
        }
        if fixed[4] != VERSION {
            return Err(CryptoError::decryption(format!(
                "unsupported artifact version {}",
                fixed[4]
            )));
        }
        let algorithm = AlgorithmSpec::from_id(fixed[5]).ok_or_else(|| {
            CryptoError::decryption(format!("unknown algorithm id {} in artifact", fixed[5]))
        })?;
        let source_tag = fixed[6];
        let frame_size = u32::from_be_bytes([fixed[7], fixed[8], fixed[9], fixed[10]]);
        if frame_size == 0 || frame_size > MAX_FRAME_SIZE {
            return Err(CryptoError::decryption(format!(
                "invalid frame size {frame_size} in artifact"
            )));
        }

        let key_source = match source_tag {
            SOURCE_RAW => KeySource::Raw,
            SOURCE_PASSPHRASE => {
                let mut salt = [0u8; SALT_SIZE];
                reader.read_exact(&mut salt)?;
                let params = KdfParams {
                    mem_cost_kib: reader.read_u32()?,
                    time_cost: reader.read_u32()?,
                    parallelism: reader.read_u32()?,
                };
                if !params.within_limits() {
                    return Err(CryptoError::decryption(
                        "artifact declares key derivation parameters outside accepted limits",
                    ));
                }
                KeySource::Passphrase { salt, params }
            }
            SOURCE_RSA => {
                let mut len = [0u8; 2];
                reader.read_exact(&mut len)?;
                let len = u16::from_be_bytes(len) as usize;
                if len == 0 || len > MAX_WRAPPED_KEY_LEN {
                    return Err(CryptoError::decryption(format!(
                        "invalid wrapped key length {len} in artifact"
                    )));
                }
                let mut wrapped_key = vec![0u8; len];
                reader.read_exact(&mut wrapped_key)?;
                KeySource::RsaWrapped { wrapped_key }
            }
            other => {
                return Err(CryptoError::decryption(format!(
                    "unknown key source {other} in artifact"
                )))
            }
        };

        let consistent = match (&key_source, algorithm) {
            (KeySource::RsaWrapped { .. }, AlgorithmSpec::Rsa) => true,
            (KeySource::RsaWrapped { .. }, _) | (_, AlgorithmSpec::Rsa) => false,
            _ => true,
        };
        if !consistent {
            return Err(CryptoError::decryption(
                "artifact header is inconsistent (key source does not match algorithm)",
            ));
        }

        let header = Header {
            algorithm,
            key_source,
            frame_size,
        };
        Ok((header, reader.into_recorded()))
    }
}

/// SHA-256 of the encoded header
pub fn header_digest(encoded: &[u8]) -> [u8; 32] {
    Sha256::digest(encoded).into()
}

/// AAD for one frame: header digest || index (8 bytes BE) || flag
pub fn frame_aad(header_digest: &[u8; 32], index: u64, flag: u8) -> [u8; 41] {
    let mut aad = [0u8; 41];
    aad[..32].copy_from_slice(header_digest);
    aad[32..40].copy_from_slice(&index.to_be_bytes());
    aad[40] = flag;
    aad
}

/// `read_exact` that reports a short artifact as a decryption failure
pub(crate) fn read_exact_or_truncated(input: &mut dyn Read, buf: &mut [u8]) -> CryptoResult<()> {
    input.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CryptoError::decryption("artifact is truncated")
        } else {
            CryptoError::Io(e)
        }
    })
}

/// Reader wrapper that keeps a copy of every byte consumed
struct Recording<'a> {
    inner: &'a mut dyn Read,
    recorded: Vec<u8>,
}

impl<'a> Recording<'a> {
    fn new(inner: &'a mut dyn Read) -> Self {
        Self {
            inner,
            recorded: Vec::with_capacity(64),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        read_exact_or_truncated(self.inner, buf)?;
        self.recorded.extend_from_slice(buf);
        Ok(())
    }

    fn read_u32(&mut self) -> CryptoResult<u32> {
        let mut b = [0u8; 4];
        self.read_exact(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    fn into_recorded(self) -> Vec<u8> {
        self.recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> CryptoResult<(Header, Vec<u8>)> {
        let mut r = bytes;
        Header::read_from(&mut r)
    }

    #[test]
    fn test_passphrase_header_roundtrip() {
        let header = Header {
            algorithm: AlgorithmSpec::Aes256,
            key_source: KeySource::Passphrase {
                salt: [7u8; SALT_SIZE],
                params: KdfParams::fast(),
            },
            frame_size: 4096,
        };
        let encoded = header.encode();
        let (parsed, raw) = parse(&encoded).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(raw, encoded);
    }

    #[test]
    fn test_rsa_header_roundtrip() {
        let header = Header {
            algorithm: AlgorithmSpec::Rsa,
            key_source: KeySource::RsaWrapped {
                wrapped_key: vec![0x5A; 256],
            },
            frame_size: 65536,
        };
        let encoded = header.encode();
        assert_eq!(encoded.len(), 11 + 2 + 256);
        let (parsed, _) = parse(&encoded).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_header_leaves_frames_unread() {
        let header = Header {
            algorithm: AlgorithmSpec::Blowfish,
            key_source: KeySource::Raw,
            frame_size: 16,
        };
        let mut bytes = header.encode();
        bytes.extend_from_slice(b"frame data");
        let mut r = &bytes[..];
        Header::read_from(&mut r).unwrap();
        assert_eq!(r, b"frame data");
    }

    #[test]
    fn test_bad_magic() {
        let err = parse(b"PK\x03\x04 this is a zip file").unwrap_err();
        assert!(matches!(err, CryptoError::Decryption(_)));
    }

    #[test]
    fn test_truncated_header() {
        let header = Header {
            algorithm: AlgorithmSpec::Aes128,
            key_source: KeySource::Passphrase {
                salt: [1u8; SALT_SIZE],
                params: KdfParams::fast(),
            },
            frame_size: 1024,
        };
        let encoded = header.encode();
        let err = parse(&encoded[..encoded.len() - 3]).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_rejects_hostile_kdf_params() {
        let header = Header {
            algorithm: AlgorithmSpec::Aes128,
            key_source: KeySource::Passphrase {
                salt: [1u8; SALT_SIZE],
                params: KdfParams {
                    mem_cost_kib: u32::MAX,
                    time_cost: 1,
                    parallelism: 1,
                },
            },
            frame_size: 1024,
        };
        assert!(parse(&header.encode()).is_err());
    }

    fn passphrase_header(params: KdfParams) -> Vec<u8> {
        Header {
            algorithm: AlgorithmSpec::Aes256,
            key_source: KeySource::Passphrase {
                salt: [1u8; SALT_SIZE],
                params,
            },
            frame_size: 1024,
        }
        .encode()
    }

    #[test]
    fn test_rejects_kdf_params_argon2_cannot_run() {
        let zero_mem = KdfParams {
            mem_cost_kib: 0,
            time_cost: 1,
            parallelism: 1,
        };
        let err = parse(&passphrase_header(zero_mem)).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption(_)));
    }

    #[test]
    fn test_rejects_kdf_params_above_service_ceiling() {
        let expensive = KdfParams {
            mem_cost_kib: 1024 * 1024,
            time_cost: 16,
            parallelism: 1,
        };
        let err = parse(&passphrase_header(expensive)).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption(_)));
    }

    #[test]
    fn test_crafted_header_decrypts_to_decryption_error() {
        let mut artifact = passphrase_header(KdfParams {
            mem_cost_kib: 0,
            time_cost: 1,
            parallelism: 1,
        });
        artifact.push(FLAG_FINAL);
        artifact.extend_from_slice(&28u32.to_be_bytes());
        artifact.extend_from_slice(&[0u8; 28]);

        use crate::CipherAdapter as _;
        let key = crate::UserKey::new("correct-horse-battery-staple").unwrap();
        let err = crate::adapter_for(AlgorithmSpec::Aes256)
            .decrypt(&artifact, &key)
            .unwrap_err();
        assert!(matches!(err, CryptoError::Decryption(_)), "{err}");
    }

    #[test]
    fn test_rejects_inconsistent_source() {
        let header = Header {
            algorithm: AlgorithmSpec::Rsa,
            key_source: KeySource::Raw,
            frame_size: 1024,
        };
        assert!(parse(&header.encode()).is_err());
    }

    #[test]
    fn test_rejects_zero_frame_size() {
        let header = Header {
            algorithm: AlgorithmSpec::Aes256,
            key_source: KeySource::Raw,
            frame_size: 0,
        };
        assert!(parse(&header.encode()).is_err());
    }

    #[test]
    fn test_frame_aad_layout() {
        let digest = [9u8; 32];
        let aad = frame_aad(&digest, 3, FLAG_FINAL);
        assert_eq!(&aad[..32], &digest);
        assert_eq!(&aad[32..40], &3u64.to_be_bytes());
        assert_eq!(aad[40], FLAG_FINAL);
    }
}
