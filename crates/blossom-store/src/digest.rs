//! SHA-256 digest computation and validation.
//!
//! Every blob is keyed by the lowercase hex SHA-256 of its content, so this
//! module is both the naming scheme and the write-time integrity check.

use sha2::{Digest, Sha256};

/// Length of a rendered digest: 64 hex characters.
pub const DIGEST_LEN: usize = 64;

/// Incremental SHA-256 hasher producing lowercase hex digests.
///
/// Uploads are hashed chunk by chunk while being written to the staging
/// file, so large bodies are never buffered twice.
pub struct Digester {
    inner: Sha256,
}

impl Digester {
    /// Create a fresh hasher
    pub fn new() -> Self {
        Self { inner: Sha256::new() }
    }

    /// Feed a chunk of the stream
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    /// Consume the hasher and render the digest as 64 lowercase hex chars
    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

impl Default for Digester {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot digest of an in-memory byte slice.
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Check that `s` is exactly 64 lowercase hex characters.
///
/// This is the gate that keeps `/`, `..`, and anything else non-hex from
/// ever becoming part of a storage path.
pub fn is_valid_digest(s: &str) -> bool {
    s.len() == DIGEST_LEN
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
