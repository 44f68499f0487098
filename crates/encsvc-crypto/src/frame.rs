//! Per-frame sealing, one implementation per cipher family
//!
//! Sealed frame layouts:
//! ```text
//! AES-GCM:           [12 bytes: random nonce][ciphertext][16 bytes: GCM tag]
//! Blowfish-CBC+HMAC: [8 bytes: random IV][PKCS#7 padded ciphertext][32 bytes: HMAC-SHA256]
//! ```
//!
//! The AAD (built by `format::frame_aad`) binds each frame to its artifact
//! header and position, preventing reordering, truncation, and splicing.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use blowfish::Blowfish;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, InnerIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{fill_random, hkdf_derive, SymmetricKey};

pub const GCM_NONCE_SIZE: usize = 12;
pub const GCM_TAG_SIZE: usize = 16;
pub const BLOWFISH_BLOCK_SIZE: usize = 8;
pub const HMAC_SIZE: usize = 32;

type HmacSha256 = Hmac<Sha256>;
type BlowfishCbcEnc = cbc::Encryptor<Blowfish>;
type BlowfishCbcDec = cbc::Decryptor<Blowfish>;

const BLOWFISH_MAC_INFO: &[u8] = b"encsvc-blowfish-frame-mac";

/// Seals and opens individual frames of an artifact.
pub trait FrameCipher: Send {
    fn seal(&self, aad: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>>;

    fn open(&self, aad: &[u8], sealed: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Largest number of bytes `seal` adds to a plaintext
    fn overhead(&self) -> usize;
}

enum Gcm {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

/// AES-GCM frames (128- or 256-bit key, chosen by key length)
pub struct AesGcmFrames {
    cipher: Gcm,
}

impl AesGcmFrames {
    pub fn new(key: &SymmetricKey) -> CryptoResult<Self> {
        let cipher = match key.len() {
            16 => Gcm::Aes128(
                Aes128Gcm::new_from_slice(key.as_bytes())
                    .map_err(|e| CryptoError::Internal(format!("AES-128-GCM init: {e}")))?,
            ),
            32 => Gcm::Aes256(
                Aes256Gcm::new_from_slice(key.as_bytes())
                    .map_err(|e| CryptoError::Internal(format!("AES-256-GCM init: {e}")))?,
            ),
            n => {
                return Err(CryptoError::invalid_key(format!(
                    "AES key must be 16 or 32 bytes, got {n}"
                )))
            }
        };
        Ok(Self { cipher })
    }
}

impl FrameCipher for AesGcmFrames {
    fn seal(&self, aad: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; GCM_NONCE_SIZE];
        fill_random(&mut nonce_bytes)?;
        let nonce = Nonce::from_slice(&nonce_bytes);
        let payload = Payload {
            msg: plaintext,
            aad,
        };

        let ciphertext = match &self.cipher {
            Gcm::Aes128(c) => c.encrypt(nonce, payload),
            Gcm::Aes256(c) => c.encrypt(nonce, payload),
        }
        .map_err(|e| CryptoError::Internal(format!("frame encryption failed: {e}")))?;

        let mut result = Vec::with_capacity(GCM_NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn open(&self, aad: &[u8], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < GCM_NONCE_SIZE + GCM_TAG_SIZE {
            return Err(CryptoError::decryption(format!(
                "encrypted frame too short: {} bytes (minimum {})",
                sealed.len(),
                GCM_NONCE_SIZE + GCM_TAG_SIZE
            )));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(GCM_NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        let payload = Payload {
            msg: ciphertext,
            aad,
        };

        match &self.cipher {
            Gcm::Aes128(c) => c.decrypt(nonce, payload),
            Gcm::Aes256(c) => c.decrypt(nonce, payload),
        }
        .map_err(|_| {
            CryptoError::decryption("decryption failed: wrong key or corrupted data")
        })
    }

    fn overhead(&self) -> usize {
        GCM_NONCE_SIZE + GCM_TAG_SIZE
    }
}

/// Blowfish-CBC frames, authenticated encrypt-then-MAC with HMAC-SHA256.
///
/// Blowfish has no AEAD mode, so the MAC is what turns a wrong key or a
/// flipped bit into an error instead of garbage plaintext.
pub struct BlowfishFrames {
    key: SymmetricKey,
    mac_key: [u8; HMAC_SIZE],
}

impl BlowfishFrames {
    pub fn new(key: &SymmetricKey) -> CryptoResult<Self> {
        if !(4..=56).contains(&key.len()) {
            return Err(CryptoError::invalid_key(format!(
                "Blowfish key must be 4 to 56 bytes, got {}",
                key.len()
            )));
        }
        let mut mac_key = [0u8; HMAC_SIZE];
        hkdf_derive(key.as_bytes(), BLOWFISH_MAC_INFO, &mut mac_key)?;
        Ok(Self {
            key: key.clone(),
            mac_key,
        })
    }

    fn block_cipher(&self) -> CryptoResult<Blowfish> {
        <Blowfish as cbc::cipher::KeyInit>::new_from_slice(self.key.as_bytes())
            .map_err(|_| CryptoError::invalid_key("Blowfish key must be 4 to 56 bytes"))
    }

    fn tag(&self, aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> CryptoResult<HmacSha256> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.mac_key)
            .map_err(|e| CryptoError::Internal(format!("HMAC init: {e}")))?;
        mac.update(aad);
        mac.update(iv);
        mac.update(ciphertext);
        Ok(mac)
    }
}

impl Drop for BlowfishFrames {
    fn drop(&mut self) {
        self.mac_key.zeroize();
    }
}

impl FrameCipher for BlowfishFrames {
    fn seal(&self, aad: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let mut iv = [0u8; BLOWFISH_BLOCK_SIZE];
        fill_random(&mut iv)?;

        let enc = BlowfishCbcEnc::inner_iv_slice_init(self.block_cipher()?, &iv)
            .map_err(|e| CryptoError::Internal(format!("Blowfish-CBC init: {e}")))?;
        let ciphertext = enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let tag = self.tag(aad, &iv, &ciphertext)?.finalize().into_bytes();

        let mut result = Vec::with_capacity(iv.len() + ciphertext.len() + HMAC_SIZE);
        result.extend_from_slice(&iv);
        result.extend_from_slice(&ciphertext);
        result.extend_from_slice(&tag);
        Ok(result)
    }

    fn open(&self, aad: &[u8], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        let min = BLOWFISH_BLOCK_SIZE * 2 + HMAC_SIZE;
        if sealed.len() < min {
            return Err(CryptoError::decryption(format!(
                "encrypted frame too short: {} bytes (minimum {min})",
                sealed.len()
            )));
        }

        let (iv, rest) = sealed.split_at(BLOWFISH_BLOCK_SIZE);
        let (ciphertext, tag) = rest.split_at(rest.len() - HMAC_SIZE);
        if ciphertext.len() % BLOWFISH_BLOCK_SIZE != 0 {
            return Err(CryptoError::decryption(
                "corrupted data: ciphertext is not a whole number of blocks",
            ));
        }

        self.tag(aad, iv, ciphertext)?
            .verify_slice(tag)
            .map_err(|_| CryptoError::decryption("decryption failed: wrong key or corrupted data"))?;

        let dec = BlowfishCbcDec::inner_iv_slice_init(self.block_cipher()?, iv)
            .map_err(|e| CryptoError::Internal(format!("Blowfish-CBC init: {e}")))?;
        dec.decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::decryption("decryption failed: invalid padding"))
    }

    fn overhead(&self) -> usize {
        BLOWFISH_BLOCK_SIZE * 2 + HMAC_SIZE
    }
}
