//! Key generation for every supported algorithm

use encsvc_core::AlgorithmSpec;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SymmetricKey;
use crate::rsa::generate_keypair;

/// A newly generated key, ready to hand back to the caller.
///
/// Symmetric keys are hex; RSA keys are a PKCS#8 private key PEM with the
/// matching public key PEM alongside.
#[derive(Debug)]
pub struct GeneratedKey {
    pub algorithm: AlgorithmSpec,
    /// Bytes for symmetric algorithms, modulus bits for rsa
    pub length: usize,
    pub key: SecretString,
    pub public_key: Option<String>,
}

impl GeneratedKey {
    pub fn expose_key(&self) -> &str {
        self.key.expose_secret()
    }
}

/// Check `length` against the algorithm's accepted key sizes.
pub fn validate_length(algorithm: AlgorithmSpec, length: usize) -> CryptoResult<()> {
    let sizes = algorithm.key_sizes();
    if sizes.accepts(length) {
        return Ok(());
    }
    Err(CryptoError::invalid_key(format!(
        "invalid key length {length} for {algorithm}: expected {sizes}"
    )))
}

/// Generate a key for `algorithm` with the given length.
pub fn generate_key(algorithm: AlgorithmSpec, length: usize) -> CryptoResult<GeneratedKey> {
    validate_length(algorithm, length)?;

    let (key, public_key) = match algorithm {
        AlgorithmSpec::Aes128 | AlgorithmSpec::Aes256 | AlgorithmSpec::Blowfish => {
            let key = SymmetricKey::random(length)?;
            (SecretString::from(hex::encode(key.as_bytes())), None)
        }
        AlgorithmSpec::Rsa => {
            let pair = generate_keypair(length)?;
            (
                SecretString::from(pair.private_pem.to_string()),
                Some(pair.public_pem),
            )
        }
    };

    tracing::debug!(%algorithm, length, "generated key");
    Ok(GeneratedKey {
        algorithm,
        length,
        key,
        public_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes256_key_is_32_bytes_hex() {
        let key = generate_key(AlgorithmSpec::Aes256, 32).unwrap();
        assert_eq!(hex::decode(key.expose_key()).unwrap().len(), 32);
        assert!(key.public_key.is_none());
    }

    #[test]
    fn test_blowfish_range() {
        for len in [4, 16, 56] {
            let key = generate_key(AlgorithmSpec::Blowfish, len).unwrap();
            assert_eq!(key.expose_key().len(), len * 2);
        }
        assert!(generate_key(AlgorithmSpec::Blowfish, 3).is_err());
        assert!(generate_key(AlgorithmSpec::Blowfish, 57).is_err());
    }

    #[test]
    fn test_invalid_lengths_are_validation_errors() {
        let err = generate_key(AlgorithmSpec::Aes128, 15).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
        assert!(err.to_string().contains("aes128"));

        assert!(validate_length(AlgorithmSpec::Aes256, 16).is_err());
        assert!(validate_length(AlgorithmSpec::Rsa, 1024).is_err());
        assert!(validate_length(AlgorithmSpec::Rsa, 32).is_err());
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = generate_key(AlgorithmSpec::Aes128, 16).unwrap();
        let b = generate_key(AlgorithmSpec::Aes128, 16).unwrap();
        assert_ne!(a.expose_key(), b.expose_key());
    }

    #[test]
    fn test_rsa_keypair() {
        let key = generate_key(AlgorithmSpec::Rsa, 2048).unwrap();
        assert!(key.expose_key().contains("BEGIN PRIVATE KEY"));
        assert!(key.public_key.unwrap().contains("BEGIN PUBLIC KEY"));
    }
}
