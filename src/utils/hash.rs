//! Content hashing utilities.
//!
//! File checksums and checkpoint integrity hashes are plain SHA-256;
//! digital signing of result ledgers is an external concern.

use crate::error::{Result, XmlGuardianError};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Hex SHA-256 of a byte slice.
#[must_use]
pub fn sha256_bytes(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{digest:x}")
}

/// Hex SHA-256 of a file's content, computed in bounded memory.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| XmlGuardianError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| XmlGuardianError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    Ok(format!("{digest:x}"))
}
