//! encsvc-crypto: cipher adapters for the encryption service
//!
//! Every algorithm produces the same self-describing artifact container:
//!
//! ```text
//! header (algorithm, key source, frame size, salt/KDF params or wrapped key)
//!   ├── frame 0: sealed(plaintext[0..frame_size])   AAD = H(header) || 0 || more
//!   ├── frame 1: ...
//!   └── frame n: sealed(remaining bytes)            AAD = H(header) || n || final
//! ```
//!
//! Frame ciphers:
//! - aes128 / aes256: AES-GCM, random 96-bit nonce per frame
//! - blowfish: Blowfish-CBC with PKCS#7, then HMAC-SHA256 over iv || ciphertext
//! - rsa: RSA-OAEP-SHA256 wraps a random 256-bit data key; frames use AES-256-GCM
//!
//! Symmetric keys are either hex of an accepted length (used directly) or a
//! passphrase stretched with Argon2id under a per-artifact random salt.

pub mod adapter;
pub mod error;
pub mod format;
pub mod frame;
pub mod kdf;
pub mod keygen;
pub mod keys;
pub mod rsa;
mod stream;

pub use adapter::{adapter_for, self_test, CipherAdapter, SealOptions};
pub use error::{CryptoError, CryptoResult};
pub use format::{Header, KeySource};
pub use kdf::KdfParams;
pub use keygen::{generate_key, validate_length, GeneratedKey};
pub use keys::{SymmetricKey, UserKey};

/// Size of the Argon2id salt stored in passphrase artifacts
pub const SALT_SIZE: usize = 16;
