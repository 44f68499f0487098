//! Frame-by-frame streaming over the artifact container
//!
//! Memory use is bounded by two frame buffers regardless of file size.

use std::io::{self, Read, Write};

use crate::error::{CryptoError, CryptoResult};
use crate::format::{frame_aad, read_exact_or_truncated, FLAG_FINAL, FLAG_MORE};
use crate::frame::FrameCipher;

/// Seal `input` into frames written to `output`. Returns plaintext bytes consumed.
pub(crate) fn seal_frames(
    input: &mut dyn Read,
    output: &mut dyn Write,
    header_digest: &[u8; 32],
    frame_size: usize,
    cipher: &dyn FrameCipher,
) -> CryptoResult<u64> {
    let mut current = vec![0u8; frame_size];
    let mut next = vec![0u8; frame_size];
    let mut current_len = read_full(input, &mut current)?;
    let mut index = 0u64;
    let mut total = 0u64;

    loop {
        // Look one frame ahead so the last frame can be flagged final
        let next_len = if current_len == frame_size {
            read_full(input, &mut next)?
        } else {
            0
        };
        let flag = if next_len == 0 { FLAG_FINAL } else { FLAG_MORE };

        let aad = frame_aad(header_digest, index, flag);
        let sealed = cipher.seal(&aad, &current[..current_len])?;
        output.write_all(&[flag])?;
        output.write_all(&(sealed.len() as u32).to_be_bytes())?;
        output.write_all(&sealed)?;
        total += current_len as u64;

        if flag == FLAG_FINAL {
            break;
        }
        std::mem::swap(&mut current, &mut next);
        current_len = next_len;
        index += 1;
    }

    Ok(total)
}

/// Open frames from `input` into `output`. Returns plaintext bytes written.
pub(crate) fn open_frames(
    input: &mut dyn Read,
    output: &mut dyn Write,
    header_digest: &[u8; 32],
    frame_size: usize,
    cipher: &dyn FrameCipher,
) -> CryptoResult<u64> {
    let max_sealed = frame_size + cipher.overhead();
    let mut sealed = Vec::with_capacity(max_sealed);
    let mut index = 0u64;
    let mut total = 0u64;

    loop {
        let mut prefix = [0u8; 5];
        read_exact_or_truncated(input, &mut prefix)?;
        let flag = prefix[0];
        if flag != FLAG_MORE && flag != FLAG_FINAL {
            return Err(CryptoError::decryption(format!(
                "corrupted data: invalid frame flag {flag} at frame {index}"
            )));
        }
        let len = u32::from_be_bytes([prefix[1], prefix[2], prefix[3], prefix[4]]) as usize;
        if len > max_sealed {
            return Err(CryptoError::decryption(format!(
                "corrupted data: frame {index} is {len} bytes (maximum {max_sealed})"
            )));
        }

        sealed.resize(len, 0);
        read_exact_or_truncated(input, &mut sealed)?;

        let aad = frame_aad(header_digest, index, flag);
        let plaintext = cipher.open(&aad, &sealed)?;
        if plaintext.len() > frame_size || (flag == FLAG_MORE && plaintext.len() != frame_size) {
            return Err(CryptoError::decryption(format!(
                "corrupted data: frame {index} has unexpected length"
            )));
        }
        output.write_all(&plaintext)?;
        total += plaintext.len() as u64;

        if flag == FLAG_FINAL {
            break;
        }
        index += 1;
    }

    let mut peek = [0u8; 1];
    if read_full(input, &mut peek)? != 0 {
        return Err(CryptoError::decryption(
            "corrupted data: trailing bytes after final frame",
        ));
    }

    output.flush()?;
    Ok(total)
}

/// Read until `buf` is full or the reader is exhausted.
fn read_full(input: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
