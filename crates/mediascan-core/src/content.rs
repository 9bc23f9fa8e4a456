//! Transient content buffers
//!
//! Raw media bytes only ever live inside a [`ContentBuffer`]. The buffer is
//! zeroed when dropped, cannot be cloned, and its `Debug` output carries the
//! length only, so content can't leak through logs or copies.

use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

/// Owned raw content, wiped on every exit path
pub struct ContentBuffer {
    bytes: Zeroizing<Vec<u8>>,
}

impl ContentBuffer {
    /// Take ownership of raw content bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex-encoded SHA-256 of the content
    pub fn sha256_hex(&self) -> String {
        sha256_hex(&self.bytes)
    }
}

impl From<Vec<u8>> for ContentBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl AsRef<[u8]> for ContentBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for ContentBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentBuffer")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Hex-encoded SHA-256 digest of arbitrary bytes
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Clamp a score or confidence into [0, 1]; NaN collapses to 0
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_bytes() {
        let buf = ContentBuffer::new(vec![0xde, 0xad, 0xbe, 0xef]);
        let rendered = format!("{:?}", buf);
        assert_eq!(rendered, "ContentBuffer { len: 4 }");
        assert!(!rendered.contains("222"));
    }

    #[test]
    fn test_sha256_hex() {
        let buf = ContentBuffer::from(b"abc".to_vec());
        assert_eq!(
            buf.sha256_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
        assert_eq!(clamp_unit(f32::NAN), 0.0);
    }
}
