//! Cipher adapters: one per supported algorithm, behind a common trait
//!
//! An adapter decides how a caller key becomes a frame cipher. Container
//! framing (header, frame sealing, end-of-stream detection) is shared.

use std::io::{Read, Write};

use encsvc_core::config::CryptoConfig;
use encsvc_core::types::KeySizes;
use encsvc_core::AlgorithmSpec;

use crate::error::{CryptoError, CryptoResult};
use crate::format::{header_digest, Header, KeySource, MAX_FRAME_SIZE};
use crate::frame::{AesGcmFrames, BlowfishFrames, FrameCipher};
use crate::kdf::KdfParams;
use crate::keys::{resolve_open_key, resolve_seal_key, SymmetricKey, UserKey};
use crate::rsa::{parse_private_key, parse_public_key, unwrap_data_key, wrap_data_key, DATA_KEY_SIZE};
use crate::stream::{open_frames, seal_frames};

/// Encryption-side knobs recorded into every artifact header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealOptions {
    pub frame_size: u32,
    pub kdf: KdfParams,
}

impl Default for SealOptions {
    fn default() -> Self {
        Self::from(&CryptoConfig::default())
    }
}

impl From<&CryptoConfig> for SealOptions {
    fn from(cfg: &CryptoConfig) -> Self {
        Self {
            frame_size: cfg.frame_size,
            kdf: KdfParams::from(cfg),
        }
    }
}

/// Uniform encrypt/decrypt capability for one algorithm.
///
/// Implementors only resolve keys; the provided methods handle the container.
pub trait CipherAdapter: Send + Sync {
    fn algorithm(&self) -> AlgorithmSpec;

    /// Turn a caller key into a frame cipher plus the header key source.
    fn prepare_seal(
        &self,
        key: &UserKey,
        opts: &SealOptions,
    ) -> CryptoResult<(KeySource, Box<dyn FrameCipher>)>;

    /// Rebuild the frame cipher from a caller key and the recorded key source.
    fn prepare_open(&self, key: &UserKey, source: &KeySource) -> CryptoResult<Box<dyn FrameCipher>>;

    /// Encrypt `input` into a complete artifact. Returns plaintext bytes read.
    fn encrypt_stream(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        key: &UserKey,
        opts: &SealOptions,
    ) -> CryptoResult<u64> {
        if opts.frame_size == 0 || opts.frame_size > MAX_FRAME_SIZE {
            return Err(CryptoError::Internal(format!(
                "frame size {} out of range",
                opts.frame_size
            )));
        }
        let (key_source, cipher) = self.prepare_seal(key, opts)?;
        let header = Header {
            algorithm: self.algorithm(),
            key_source,
            frame_size: opts.frame_size,
        };
        let encoded = header.encode();
        output.write_all(&encoded)?;
        let digest = header_digest(&encoded);
        let total = seal_frames(
            input,
            output,
            &digest,
            opts.frame_size as usize,
            cipher.as_ref(),
        )?;
        output.flush()?;
        Ok(total)
    }

    /// Decrypt an artifact from `input`. Returns plaintext bytes written.
    ///
    /// Nothing is written unless the header parses and matches this adapter,
    /// but a failure mid-stream can leave partial plaintext in `output`; the
    /// caller must discard it.
    fn decrypt_stream(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        key: &UserKey,
    ) -> CryptoResult<u64> {
        let (header, raw) = Header::read_from(input)?;
        if header.algorithm != self.algorithm() {
            return Err(CryptoError::decryption(format!(
                "file was encrypted with {}, not {}",
                header.algorithm,
                self.algorithm()
            )));
        }
        let cipher = self.prepare_open(key, &header.key_source)?;
        open_frames(
            input,
            output,
            &header_digest(&raw),
            header.frame_size as usize,
            cipher.as_ref(),
        )
    }

    fn encrypt(&self, plaintext: &[u8], key: &UserKey, opts: &SealOptions) -> CryptoResult<Vec<u8>> {
        let mut out = Vec::with_capacity(plaintext.len() + 128);
        let mut input = plaintext;
        self.encrypt_stream(&mut input, &mut out, key, opts)?;
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &UserKey) -> CryptoResult<Vec<u8>> {
        let mut out = Vec::with_capacity(ciphertext.len());
        let mut input = ciphertext;
        self.decrypt_stream(&mut input, &mut out, key)?;
        Ok(out)
    }
}

pub struct Aes128Adapter;
pub struct Aes256Adapter;
pub struct BlowfishAdapter;
pub struct RsaHybridAdapter;

fn seal_symmetric(
    algorithm: AlgorithmSpec,
    key: &UserKey,
    opts: &SealOptions,
    build: fn(&SymmetricKey) -> CryptoResult<Box<dyn FrameCipher>>,
) -> CryptoResult<(KeySource, Box<dyn FrameCipher>)> {
    let (cipher_key, source) = resolve_seal_key(algorithm, key, &opts.kdf)?;
    Ok((source, build(&cipher_key)?))
}

fn open_symmetric(
    algorithm: AlgorithmSpec,
    key: &UserKey,
    source: &KeySource,
    build: fn(&SymmetricKey) -> CryptoResult<Box<dyn FrameCipher>>,
) -> CryptoResult<Box<dyn FrameCipher>> {
    let cipher_key = resolve_open_key(algorithm, key, source)?;
    build(&cipher_key)
}

fn gcm_frames(key: &SymmetricKey) -> CryptoResult<Box<dyn FrameCipher>> {
    Ok(Box::new(AesGcmFrames::new(key)?))
}

fn blowfish_frames(key: &SymmetricKey) -> CryptoResult<Box<dyn FrameCipher>> {
    Ok(Box::new(BlowfishFrames::new(key)?))
}

impl CipherAdapter for Aes128Adapter {
    fn algorithm(&self) -> AlgorithmSpec {
        AlgorithmSpec::Aes128
    }

    fn prepare_seal(
        &self,
        key: &UserKey,
        opts: &SealOptions,
    ) -> CryptoResult<(KeySource, Box<dyn FrameCipher>)> {
        seal_symmetric(self.algorithm(), key, opts, gcm_frames)
    }

    fn prepare_open(&self, key: &UserKey, source: &KeySource) -> CryptoResult<Box<dyn FrameCipher>> {
        open_symmetric(self.algorithm(), key, source, gcm_frames)
    }
}

impl CipherAdapter for Aes256Adapter {
    fn algorithm(&self) -> AlgorithmSpec {
        AlgorithmSpec::Aes256
    }

    fn prepare_seal(
        &self,
        key: &UserKey,
        opts: &SealOptions,
    ) -> CryptoResult<(KeySource, Box<dyn FrameCipher>)> {
        seal_symmetric(self.algorithm(), key, opts, gcm_frames)
    }

    fn prepare_open(&self, key: &UserKey, source: &KeySource) -> CryptoResult<Box<dyn FrameCipher>> {
        open_symmetric(self.algorithm(), key, source, gcm_frames)
    }
}

impl CipherAdapter for BlowfishAdapter {
    fn algorithm(&self) -> AlgorithmSpec {
        AlgorithmSpec::Blowfish
    }

    fn prepare_seal(
        &self,
        key: &UserKey,
        opts: &SealOptions,
    ) -> CryptoResult<(KeySource, Box<dyn FrameCipher>)> {
        seal_symmetric(self.algorithm(), key, opts, blowfish_frames)
    }

    fn prepare_open(&self, key: &UserKey, source: &KeySource) -> CryptoResult<Box<dyn FrameCipher>> {
        open_symmetric(self.algorithm(), key, source, blowfish_frames)
    }
}

impl CipherAdapter for RsaHybridAdapter {
    fn algorithm(&self) -> AlgorithmSpec {
        AlgorithmSpec::Rsa
    }

    fn prepare_seal(
        &self,
        key: &UserKey,
        _opts: &SealOptions,
    ) -> CryptoResult<(KeySource, Box<dyn FrameCipher>)> {
        let public = parse_public_key(key.expose())?;
        let data_key = SymmetricKey::random(DATA_KEY_SIZE)?;
        let wrapped_key = wrap_data_key(&public, &data_key)?;
        Ok((KeySource::RsaWrapped { wrapped_key }, gcm_frames(&data_key)?))
    }

    fn prepare_open(&self, key: &UserKey, source: &KeySource) -> CryptoResult<Box<dyn FrameCipher>> {
        let KeySource::RsaWrapped { wrapped_key } = source else {
            return Err(CryptoError::decryption(
                "file header does not carry an RSA-wrapped key",
            ));
        };
        let private = parse_private_key(key.expose())?;
        let data_key = unwrap_data_key(&private, wrapped_key)?;
        gcm_frames(&data_key)
    }
}

static AES128: Aes128Adapter = Aes128Adapter;
static AES256: Aes256Adapter = Aes256Adapter;
static BLOWFISH: BlowfishAdapter = BlowfishAdapter;
static RSA: RsaHybridAdapter = RsaHybridAdapter;

/// Adapter for an algorithm. Every `AlgorithmSpec` has one.
pub fn adapter_for(algorithm: AlgorithmSpec) -> &'static dyn CipherAdapter {
    match algorithm {
        AlgorithmSpec::Aes128 => &AES128,
        AlgorithmSpec::Aes256 => &AES256,
        AlgorithmSpec::Blowfish => &BLOWFISH,
        AlgorithmSpec::Rsa => &RSA,
    }
}

/// Round-trip a short message through every symmetric adapter with a fixed
/// raw key. Used by the health check to prove the cipher stack works.
pub fn self_test() -> CryptoResult<()> {
    const PROBE: &[u8] = b"encsvc self-test";
    let opts = SealOptions {
        frame_size: 64,
        kdf: KdfParams::fast(),
    };
    for algorithm in AlgorithmSpec::ALL.iter().copied().filter(|a| a.is_symmetric()) {
        let key_len = match algorithm.key_sizes() {
            KeySizes::Fixed(n) => n,
            KeySizes::Range(_, max) => max,
            KeySizes::ModulusBits(_) => continue,
        };
        let key = UserKey::new("5a".repeat(key_len))?;
        let adapter = adapter_for(algorithm);
        let sealed = adapter.encrypt(PROBE, &key, &opts)?;
        let opened = adapter.decrypt(&sealed, &key)?;
        if opened != PROBE {
            return Err(CryptoError::Internal(format!(
                "{algorithm} self-test produced wrong plaintext"
            )));
        }
    }
    Ok(())
}
