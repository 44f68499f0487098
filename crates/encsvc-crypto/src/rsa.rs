//! RSA keypairs and data-key wrapping for hybrid encryption
//!
//! RSA-OAEP can only seal a few hundred bytes, so files are never encrypted
//! with RSA directly. A random 256-bit data key encrypts the file (AES-256-GCM
//! frames) and RSA-OAEP-SHA256 wraps that data key into the artifact header.

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SymmetricKey;

/// Smallest modulus accepted from callers, in bits
pub const MIN_MODULUS_BITS: usize = 2048;

/// Size of the wrapped data key in bytes
pub const DATA_KEY_SIZE: usize = 32;

/// A freshly generated keypair, PEM encoded
pub struct RsaKeyPair {
    /// PKCS#8 `BEGIN PRIVATE KEY` document (contains the public key too)
    pub private_pem: Zeroizing<String>,
    /// SPKI `BEGIN PUBLIC KEY` document
    pub public_pem: String,
}

pub fn generate_keypair(bits: usize) -> CryptoResult<RsaKeyPair> {
    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CryptoError::Internal(format!("RSA key generation failed: {e}")))?;
    let public = RsaPublicKey::from(&private);

    let private_pem = private
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::Internal(format!("encoding RSA private key: {e}")))?;
    let public_pem = public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::Internal(format!("encoding RSA public key: {e}")))?;

    Ok(RsaKeyPair {
        private_pem,
        public_pem,
    })
}

/// Parse a key usable for encryption: a public key, or a private key whose
/// public half is used.
pub fn parse_public_key(pem: &str) -> CryptoResult<RsaPublicKey> {
    let pem = pem.trim();
    let key = if pem.contains("BEGIN PUBLIC KEY") {
        RsaPublicKey::from_public_key_pem(pem).map_err(|e| bad_pem("public", e))?
    } else if pem.contains("BEGIN RSA PUBLIC KEY") {
        RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| bad_pem("public", e))?
    } else if pem.contains("PRIVATE KEY") {
        RsaPublicKey::from(&parse_private_key(pem)?)
    } else {
        return Err(CryptoError::invalid_key(
            "rsa requires a PEM-encoded key (BEGIN PUBLIC KEY or BEGIN PRIVATE KEY)",
        ));
    };
    check_modulus(&key)?;
    Ok(key)
}

/// Parse a private key (PKCS#8 or PKCS#1 PEM).
pub fn parse_private_key(pem: &str) -> CryptoResult<RsaPrivateKey> {
    let pem = pem.trim();
    let key = if pem.contains("BEGIN PRIVATE KEY") {
        RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| bad_pem("private", e))?
    } else if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| bad_pem("private", e))?
    } else if pem.contains("PUBLIC KEY") {
        return Err(CryptoError::invalid_key(
            "decryption with rsa requires the private key PEM, not the public key",
        ));
    } else {
        return Err(CryptoError::invalid_key(
            "rsa requires a PEM-encoded private key (BEGIN PRIVATE KEY)",
        ));
    };
    check_modulus(&RsaPublicKey::from(&key))?;
    Ok(key)
}

/// Wrap a data key under `public` with RSA-OAEP-SHA256.
pub fn wrap_data_key(public: &RsaPublicKey, data_key: &SymmetricKey) -> CryptoResult<Vec<u8>> {
    public
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), data_key.as_bytes())
        .map_err(|e| CryptoError::Internal(format!("RSA key wrapping failed: {e}")))
}

/// Unwrap a data key with `private`.
pub fn unwrap_data_key(private: &RsaPrivateKey, wrapped: &[u8]) -> CryptoResult<SymmetricKey> {
    let bytes = private
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|_| CryptoError::decryption("wrong RSA private key or corrupted data"))?;
    let key = SymmetricKey::from_bytes(bytes);
    if key.len() != DATA_KEY_SIZE {
        return Err(CryptoError::decryption(format!(
            "unwrapped data key has wrong size: {} bytes (expected {DATA_KEY_SIZE})",
            key.len()
        )));
    }
    Ok(key)
}

fn check_modulus(key: &RsaPublicKey) -> CryptoResult<()> {
    let bits = key.size() * 8;
    if bits < MIN_MODULUS_BITS {
        return Err(CryptoError::invalid_key(format!(
            "RSA key is {bits} bits; at least {MIN_MODULUS_BITS} bits are required"
        )));
    }
    Ok(())
}

fn bad_pem(kind: &str, err: impl std::fmt::Display) -> CryptoError {
    CryptoError::invalid_key(format!("invalid RSA {kind} key PEM: {err}"))
}
