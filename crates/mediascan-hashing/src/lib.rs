//! MediaScan Hashing
//!
//! Perceptual fingerprints and known-database matching for MediaScan.
//!
//! Provides:
//! - pHash (64-bit) and PDQ (256-bit) computed from decoded pixels
//! - A client contract for the external PhotoDNA service
//! - Hamming distance over raw, byte, and hex encodings
//! - The [`HashIndex`] lookup contract plus an in-memory BK-tree index
//! - [`PerceptualHashEngine`], which ties the above together

pub mod config;
pub mod dct;
pub mod engine;
pub mod hamming;
pub mod hash;
pub mod hasher;
pub mod index;
pub mod pdq;
pub mod phash;
pub mod photodna;
pub mod stats;

pub use config::HashingSettings;
pub use engine::{PerceptualHashEngine, DEFAULT_PHOTODNA_CONFIDENCE};
pub use hamming::{hamming_distance_bytes, hamming_distance_hex, hamming_distance_u64};
pub use hash::{HashResult, HashType, HashValue, IndexMatch, SimilarityMatch};
pub use hasher::{ComputedHash, ImageHasher};
pub use index::{HashIndex, MemoryHashIndex};
pub use pdq::{PdqHash, PdqHasher};
pub use phash::PHasher;
pub use photodna::PhotoDnaClient;
pub use stats::{HashingStats, StatsSnapshot};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::HashingSettings;
    pub use crate::engine::PerceptualHashEngine;
    pub use crate::hash::{HashResult, HashType, HashValue, SimilarityMatch};
    pub use crate::index::{HashIndex, MemoryHashIndex};
    pub use crate::photodna::PhotoDnaClient;
}
