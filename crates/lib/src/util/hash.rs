//! SHA-256 helpers for fingerprinting build scripts.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hash a file's contents. Returns the 64-character lowercase hex digest.
pub fn hash_file(path: &Path) -> io::Result<String> {
  let mut file = fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hex::encode(hasher.finalize()))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
  hex::encode(Sha256::digest(data))
}

/// Like [`hash_file`], but a missing file has the empty fingerprint, so its
/// later creation is noticed as a change.
pub fn fingerprint(path: &Path) -> io::Result<String> {
  match hash_file(path) {
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
    other => other,
  }
}
