//! File-backed streaming round-trips across every algorithm

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};

use encsvc_core::AlgorithmSpec;
use encsvc_crypto::{adapter_for, generate_key, CryptoError, KdfParams, SealOptions, UserKey};

fn opts() -> SealOptions {
    SealOptions {
        frame_size: 4096,
        kdf: KdfParams::fast(),
    }
}

fn plaintext_file(len: usize) -> (tempfile::NamedTempFile, Vec<u8>) {
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();
    (file, data)
}

fn roundtrip(algorithm: AlgorithmSpec, enc_key: &UserKey, dec_key: &UserKey, len: usize) {
    let adapter = adapter_for(algorithm);
    let (plain, data) = plaintext_file(len);
    let mut sealed = tempfile::tempfile().unwrap();

    let read = {
        let mut input = BufReader::new(File::open(plain.path()).unwrap());
        let mut output = BufWriter::new(&mut sealed);
        adapter
            .encrypt_stream(&mut input, &mut output, enc_key, &opts())
            .unwrap()
    };
    assert_eq!(read, len as u64);

    sealed.seek(SeekFrom::Start(0)).unwrap();
    let mut recovered = Vec::new();
    let written = adapter
        .decrypt_stream(&mut BufReader::new(&mut sealed), &mut recovered, dec_key)
        .unwrap();
    assert_eq!(written, len as u64);
    assert_eq!(recovered, data, "{algorithm} round-trip mismatch");
}

#[test]
fn passphrase_roundtrip_all_symmetric() {
    let key = UserKey::new("correct-horse-battery-staple").unwrap();
    for algorithm in [AlgorithmSpec::Aes128, AlgorithmSpec::Aes256, AlgorithmSpec::Blowfish] {
        for len in [0, 4095, 4096, 50_000] {
            roundtrip(algorithm, &key, &key, len);
        }
    }
}

#[test]
fn generated_keys_roundtrip() {
    for (algorithm, len) in [
        (AlgorithmSpec::Aes128, 16),
        (AlgorithmSpec::Aes256, 32),
        (AlgorithmSpec::Blowfish, 24),
    ] {
        let generated = generate_key(algorithm, len).unwrap();
        let key = UserKey::new(generated.expose_key()).unwrap();
        roundtrip(algorithm, &key, &key, 10_000);
    }
}

#[test]
fn rsa_generated_keypair_roundtrip() {
    let generated = generate_key(AlgorithmSpec::Rsa, 2048).unwrap();
    let public = UserKey::new(generated.public_key.clone().unwrap()).unwrap();
    let private = UserKey::new(generated.expose_key()).unwrap();
    roundtrip(AlgorithmSpec::Rsa, &public, &private, 20_000);
}

#[test]
fn wrong_key_is_decryption_error() {
    let adapter = adapter_for(AlgorithmSpec::Blowfish);
    let sealed = adapter
        .encrypt(b"attack at dawn", &UserKey::new("alpha").unwrap(), &opts())
        .unwrap();
    let err = adapter
        .decrypt(&sealed, &UserKey::new("bravo").unwrap())
        .unwrap_err();
    assert!(matches!(err, CryptoError::Decryption(_)));
}

#[test]
fn truncated_artifact_is_decryption_error() {
    let key = UserKey::new("pass").unwrap();
    let adapter = adapter_for(AlgorithmSpec::Aes256);
    let sealed = adapter.encrypt(&vec![9u8; 10_000], &key, &opts()).unwrap();
    let err = adapter.decrypt(&sealed[..sealed.len() / 2], &key).unwrap_err();
    assert!(matches!(err, CryptoError::Decryption(_)));
}
