//! Artifact file names
//!
//! Client-supplied names are reduced to a safe base name before they touch
//! the filesystem or a download URL.

/// Suffix appended to encrypted artifacts
pub const ENCRYPTED_SUFFIX: &str = ".enc";

/// Suffix appended to decrypted artifacts whose input lacked `.enc`
pub const DECRYPTED_SUFFIX: &str = ".dec";

const MAX_NAME_LEN: usize = 200;
const FALLBACK_NAME: &str = "file";

/// Keep only the final path component and map every byte outside
/// `[A-Za-z0-9._-]` to `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if clean.len() > MAX_NAME_LEN {
        // Keep the tail so the extension survives
        clean = clean[clean.len() - MAX_NAME_LEN..].to_string();
    }
    if clean.chars().all(|c| c == '.') {
        return FALLBACK_NAME.to_string();
    }
    clean
}

/// Output name for an encrypted upload: `<name>.enc`
pub fn encrypted_name(original: &str) -> String {
    format!("{}{ENCRYPTED_SUFFIX}", sanitize_file_name(original))
}

/// Output name for a decrypted upload: strip `.enc`, otherwise append `.dec`
pub fn decrypted_name(original: &str) -> String {
    let clean = sanitize_file_name(original);
    match clean.strip_suffix(ENCRYPTED_SUFFIX) {
        Some(stem) if !stem.is_empty() && !stem.chars().all(|c| c == '.') => stem.to_string(),
        _ => format!("{clean}{DECRYPTED_SUFFIX}"),
    }
}
