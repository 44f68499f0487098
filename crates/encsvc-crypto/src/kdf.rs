//! Key derivation: Argon2id passphrase → symmetric key

use argon2::{Algorithm, Argon2, Params, Version};
use encsvc_core::config::{
    CryptoConfig, ARGON2_MAX_MEM_COST_KIB, ARGON2_MAX_PARALLELISM, ARGON2_MAX_TIME_COST,
};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{CryptoError, CryptoResult};
use crate::keys::SymmetricKey;
use crate::SALT_SIZE;

/// Bounds accepted when reading parameters back from an artifact header
pub const MAX_MEM_COST_KIB: u32 = ARGON2_MAX_MEM_COST_KIB;
pub const MAX_TIME_COST: u32 = ARGON2_MAX_TIME_COST;
pub const MAX_PARALLELISM: u32 = ARGON2_MAX_PARALLELISM;

/// Argon2 needs at least 8 KiB of memory per lane
pub const MIN_MEM_COST_KIB_PER_LANE: u32 = 8;

/// Argon2id parameters for KDF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 2)
    pub time_cost: u32,
    /// Parallelism (default: 1)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::from(&CryptoConfig::default())
    }
}

impl From<&CryptoConfig> for KdfParams {
    fn from(cfg: &CryptoConfig) -> Self {
        Self {
            mem_cost_kib: cfg.argon2_mem_cost_kib,
            time_cost: cfg.argon2_time_cost,
            parallelism: cfg.argon2_parallelism,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests and self-checks
    pub fn fast() -> Self {
        Self {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    pub fn within_limits(&self) -> bool {
        (1..=MAX_TIME_COST).contains(&self.time_cost)
            && (1..=MAX_PARALLELISM).contains(&self.parallelism)
            && self.mem_cost_kib >= MIN_MEM_COST_KIB_PER_LANE * self.parallelism
            && self.mem_cost_kib <= MAX_MEM_COST_KIB
    }
}

/// Derive a `len`-byte key from a passphrase and salt using Argon2id.
///
/// The salt is random per artifact and stored in its header (it does not
/// need to be secret).
pub fn derive_key(
    passphrase: &SecretString,
    salt: &[u8; SALT_SIZE],
    params: &KdfParams,
    len: usize,
) -> CryptoResult<SymmetricKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(len),
    )
    .map_err(|e| CryptoError::Internal(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = SymmetricKey::zeroed(len);
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, key.as_mut_bytes())
        .map_err(|e| CryptoError::Internal(format!("Argon2id KDF failed: {e}")))?;

    Ok(key)
}
