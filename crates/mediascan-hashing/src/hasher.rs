//! Image hasher extension point

use crate::hash::HashValue;
use mediascan_core::{DecodedImage, Result};

/// Output of one image hashing algorithm
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedHash {
    pub value: HashValue,
    /// 0-100, for algorithms that grade their own input
    pub quality: Option<u8>,
}

/// A perceptual hash algorithm over decoded pixels.
///
/// Hashers run on the blocking thread pool and must not retain the image.
pub trait ImageHasher: Send + Sync {
    fn compute(&self, image: &DecodedImage) -> Result<ComputedHash>;
}
