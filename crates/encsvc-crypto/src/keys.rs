//! Key material: zeroizing symmetric keys, caller-supplied key strings,
//! and how a key string becomes cipher key bytes.

use encsvc_core::types::{AlgorithmSpec, KeySizes};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::format::KeySource;
use crate::kdf::{derive_key, KdfParams};
use crate::SALT_SIZE;

/// Symmetric key bytes. Zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: Vec<u8>,
}

#[allow(clippy::len_without_is_empty)]
impl SymmetricKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub(crate) fn zeroed(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    /// Draw `len` bytes from the OS random source
    pub fn random(len: usize) -> CryptoResult<Self> {
        let mut key = Self::zeroed(len);
        fill_random(key.as_mut_bytes())?;
        Ok(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// The `key` field exactly as the caller sent it.
///
/// Depending on the algorithm it holds hex key bytes, a passphrase, or an RSA
/// PEM document. It only ever lives in memory.
pub struct UserKey {
    secret: SecretString,
}

impl UserKey {
    pub fn new(key: impl Into<String>) -> CryptoResult<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(CryptoError::invalid_key("key is required"));
        }
        Ok(Self {
            secret: SecretString::from(key),
        })
    }

    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    pub(crate) fn as_secret(&self) -> &SecretString {
        &self.secret
    }

    /// Interpret the key as hex-encoded raw key bytes of an accepted size.
    pub fn as_raw_hex(&self, sizes: KeySizes) -> Option<SymmetricKey> {
        let trimmed = self.expose().trim();
        if trimmed.len() % 2 != 0 || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let key = SymmetricKey::from_bytes(hex::decode(trimmed).ok()?);
        sizes.accepts(key.len()).then_some(key)
    }
}

impl std::fmt::Debug for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UserKey([REDACTED])")
    }
}

/// Fill `buf` from the OS random source.
pub fn fill_random(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CryptoError::Rng(e.to_string()))
}

/// HKDF-SHA256 key derivation with a domain-specific info string.
pub(crate) fn hkdf_derive(ikm: &[u8], info: &[u8], out: &mut [u8]) -> CryptoResult<()> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    hkdf.expand(info, out)
        .map_err(|e| CryptoError::Internal(format!("HKDF expand failed: {e}")))
}

/// Size of the key derived from a passphrase for each symmetric algorithm.
pub fn passphrase_key_len(algorithm: AlgorithmSpec) -> usize {
    match algorithm {
        AlgorithmSpec::Aes128 => 16,
        AlgorithmSpec::Aes256 | AlgorithmSpec::Rsa => 32,
        AlgorithmSpec::Blowfish => 56,
    }
}

/// Resolve a caller key for encryption.
///
/// Hex of an accepted size is used as-is; anything else is a passphrase
/// stretched with Argon2id under a fresh salt.
pub(crate) fn resolve_seal_key(
    algorithm: AlgorithmSpec,
    key: &UserKey,
    params: &KdfParams,
) -> CryptoResult<(SymmetricKey, KeySource)> {
    if let Some(raw) = key.as_raw_hex(algorithm.key_sizes()) {
        tracing::debug!(%algorithm, key_len = raw.len(), "using raw key");
        return Ok((raw, KeySource::Raw));
    }

    let mut salt = [0u8; SALT_SIZE];
    fill_random(&mut salt)?;
    let derived = derive_key(
        key.as_secret(),
        &salt,
        params,
        passphrase_key_len(algorithm),
    )?;
    tracing::debug!(%algorithm, "derived key from passphrase");
    Ok((
        derived,
        KeySource::Passphrase {
            salt,
            params: *params,
        },
    ))
}

/// Resolve a caller key for decryption, following what the artifact header
/// recorded at encryption time.
pub(crate) fn resolve_open_key(
    algorithm: AlgorithmSpec,
    key: &UserKey,
    source: &KeySource,
) -> CryptoResult<SymmetricKey> {
    match source {
        KeySource::Raw => key.as_raw_hex(algorithm.key_sizes()).ok_or_else(|| {
            CryptoError::decryption(format!(
                "wrong key: this file was encrypted with a raw {algorithm} key, expected hex of {}",
                algorithm.key_sizes()
            ))
        }),
        KeySource::Passphrase { salt, params } => {
            if !params.within_limits() {
                return Err(CryptoError::decryption(
                    "artifact declares key derivation parameters outside accepted limits",
                ));
            }
            // Parameters come from the artifact, so a rejection means a bad file
            derive_key(key.as_secret(), salt, params, passphrase_key_len(algorithm)).map_err(
                |e| match e {
                    CryptoError::Internal(msg) => CryptoError::decryption(msg),
                    other => other,
                },
            )
        }
        KeySource::RsaWrapped { .. } => Err(CryptoError::decryption(format!(
            "file header does not match algorithm {algorithm}"
        ))),
    }
}
