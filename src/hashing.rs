//! Hashing - SHA-256 Fingerprints for Built Artifacts
//!
//! Reported alongside each build so deployments can cache-bust on content.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Digest of a file's bytes.
pub fn file_digest(path: &Path) -> std::io::Result<String> {
    let data = fs::read(path)?;
    Ok(sha256_hex(&data))
}

/// Short fingerprint suitable for a `?v=` query string.
pub fn short_fingerprint(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_file_digest_matches_bytes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("theme.min.css");
        fs::write(&path, ".a{color:red}").unwrap();
        assert_eq!(file_digest(&path).unwrap(), sha256_hex(b".a{color:red}"));
    }

    #[test]
    fn test_short_fingerprint() {
        let digest = sha256_hex(b"x");
        assert_eq!(short_fingerprint(&digest).len(), 12);
        assert_eq!(short_fingerprint("abc"), "abc");
    }

    #[test]
    fn test_short_fingerprint_off_char_boundary() {
        let text = "aaaaaaaaaaa\u{e9}";
        assert_eq!(short_fingerprint(text), text);
    }
}
