//! Hash types, values, and results

use crate::hamming::{hamming_distance_bytes, hamming_distance_u64};
use chrono::{DateTime, Utc};
use mediascan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PHASH_BITS: u32 = 64;
pub const PDQ_BITS: u32 = 256;
pub const PHOTODNA_LEN: usize = 144;

/// Perceptual hash algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    Phash,
    Pdq,
    PhotoDna,
}

impl HashType {
    pub const ALL: [HashType; 3] = [Self::Phash, Self::Pdq, Self::PhotoDna];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phash => "phash",
            Self::Pdq => "pdq",
            Self::PhotoDna => "photodna",
        }
    }

    /// Width of the hash in bits
    pub fn bit_length(&self) -> u32 {
        match self {
            Self::Phash => PHASH_BITS,
            Self::Pdq => PDQ_BITS,
            Self::PhotoDna => PHOTODNA_LEN as u32 * 8,
        }
    }

    pub fn byte_length(&self) -> usize {
        self.bit_length() as usize / 8
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "phash" => Ok(Self::Phash),
            "pdq" => Ok(Self::Pdq),
            "photodna" => Ok(Self::PhotoDna),
            other => Err(Error::validation(format!("Unknown hash type: {}", other))),
        }
    }
}

/// A computed hash value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum HashValue {
    Phash(u64),
    Pdq([u8; 32]),
    PhotoDna(Vec<u8>),
}

impl HashValue {
    pub fn hash_type(&self) -> HashType {
        match self {
            Self::Phash(_) => HashType::Phash,
            Self::Pdq(_) => HashType::Pdq,
            Self::PhotoDna(_) => HashType::PhotoDna,
        }
    }

    /// Build a PhotoDNA value, checking its length
    pub fn photodna(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != PHOTODNA_LEN {
            return Err(Error::validation(format!(
                "PhotoDNA hash must be {} bytes, got {}",
                PHOTODNA_LEN,
                bytes.len()
            )));
        }
        Ok(Self::PhotoDna(bytes))
    }

    /// Big-endian bytes; pHash is MSB-first
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Phash(v) => v.to_be_bytes().to_vec(),
            Self::Pdq(v) => v.to_vec(),
            Self::PhotoDna(v) => v.clone(),
        }
    }

    /// Lowercase hex
    pub fn to_hex(&self) -> String {
        match self {
            Self::Phash(v) => format!("{:016x}", v),
            other => hex::encode(other.to_bytes()),
        }
    }

    /// Parse a hex-encoded hash of the given type
    pub fn from_hex(hash_type: HashType, value: &str) -> Result<Self> {
        let bytes = hex::decode(value)
            .map_err(|e| Error::validation(format!("Invalid {} hex: {}", hash_type, e)))?;
        if bytes.len() != hash_type.byte_length() {
            return Err(Error::validation(format!(
                "{} hash must be {} bytes, got {}",
                hash_type,
                hash_type.byte_length(),
                bytes.len()
            )));
        }

        Ok(match hash_type {
            HashType::Phash => {
                let mut word = [0u8; 8];
                word.copy_from_slice(&bytes);
                Self::Phash(u64::from_be_bytes(word))
            }
            HashType::Pdq => {
                let mut words = [0u8; 32];
                words.copy_from_slice(&bytes);
                Self::Pdq(words)
            }
            HashType::PhotoDna => Self::PhotoDna(bytes),
        })
    }

    /// Hamming distance; both values must be the same type and length
    pub fn distance(&self, other: &HashValue) -> Result<u32> {
        match (self, other) {
            (Self::Phash(a), Self::Phash(b)) => Ok(hamming_distance_u64(*a, *b)),
            (Self::Pdq(a), Self::Pdq(b)) => hamming_distance_bytes(a, b),
            (Self::PhotoDna(a), Self::PhotoDna(b)) => hamming_distance_bytes(a, b),
            (a, b) => Err(Error::validation(format!(
                "Cannot compare {} hash with {} hash",
                a.hash_type(),
                b.hash_type()
            ))),
        }
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash_type(), self.to_hex())
    }
}

/// Every hash computed for one piece of content. Any subset of the hash
/// fields may be present; failures are listed in `errors` as
/// `"<algorithm>: <reason>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashResult {
    pub sha256: String,
    pub phash: Option<u64>,
    pub pdq_hash: Option<[u8; 32]>,
    /// 0-100
    pub pdq_quality: Option<u8>,
    pub photodna_hash: Option<Vec<u8>>,
    pub computed_at: DateTime<Utc>,
    pub errors: Vec<String>,
}

impl HashResult {
    pub fn new(sha256: impl Into<String>) -> Self {
        Self {
            sha256: sha256.into(),
            phash: None,
            pdq_hash: None,
            pdq_quality: None,
            photodna_hash: None,
            computed_at: Utc::now(),
            errors: Vec::new(),
        }
    }

    pub fn phash_hex(&self) -> Option<String> {
        self.phash.map(|v| HashValue::Phash(v).to_hex())
    }

    pub fn pdq_hex(&self) -> Option<String> {
        self.pdq_hash.map(hex::encode)
    }

    pub fn photodna_hex(&self) -> Option<String> {
        self.photodna_hash.as_ref().map(hex::encode)
    }

    /// Populated hashes, in pHash, PDQ, PhotoDNA order
    pub fn values(&self) -> Vec<HashValue> {
        let mut values = Vec::with_capacity(3);
        if let Some(v) = self.phash {
            values.push(HashValue::Phash(v));
        }
        if let Some(v) = self.pdq_hash {
            values.push(HashValue::Pdq(v));
        }
        if let Some(v) = &self.photodna_hash {
            values.push(HashValue::PhotoDna(v.clone()));
        }
        values
    }

    /// Record a failed algorithm
    pub fn record_error(&mut self, hash_type: HashType, error: impl fmt::Display) {
        self.errors.push(format!("{}: {}", hash_type, error));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// A hit returned by a [`HashIndex`](crate::index::HashIndex)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    pub distance: u32,
    pub database: String,
    pub classification: String,
    /// Set by indexes that score matches themselves
    pub confidence: Option<f32>,
}

/// A known-database match for one hash of one piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub sha256: String,
    pub hash_type: HashType,
    pub distance: u32,
    pub matched_database: String,
    pub classification: String,
    /// 0.0-1.0
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_lengths() {
        assert_eq!(HashType::Phash.bit_length(), 64);
        assert_eq!(HashType::Pdq.bit_length(), 256);
        assert_eq!(HashType::PhotoDna.bit_length(), 1152);
        assert_eq!(HashType::PhotoDna.byte_length(), 144);
    }

    #[test]
    fn test_phash_hex_is_msb_first() {
        let value = HashValue::Phash(0x8000_0000_0000_0001);
        assert_eq!(value.to_hex(), "8000000000000001");
        assert_eq!(HashValue::from_hex(HashType::Phash, "8000000000000001").unwrap(), value);
    }

    #[test]
    fn test_from_hex_checks_length() {
        assert!(HashValue::from_hex(HashType::Pdq, "abcd").unwrap_err().is_validation());
        assert!(HashValue::from_hex(HashType::Phash, "xyz").unwrap_err().is_validation());
        assert!(HashValue::photodna(vec![0; 10]).unwrap_err().is_validation());
    }

    #[test]
    fn test_distance_across_types_is_rejected() {
        let a = HashValue::Phash(0);
        let b = HashValue::Pdq([0; 32]);
        assert!(a.distance(&b).unwrap_err().is_validation());
        assert_eq!(a.distance(&HashValue::Phash(0b111)).unwrap(), 3);
    }

    #[test]
    fn test_result_accessors() {
        let mut result = HashResult::new("abc");
        result.phash = Some(0xff);
        result.pdq_hash = Some([1; 32]);
        result.record_error(HashType::PhotoDna, "service unavailable");

        assert_eq!(result.phash_hex().as_deref(), Some("00000000000000ff"));
        assert_eq!(result.pdq_hex().unwrap().len(), 64);
        assert_eq!(result.values().len(), 2);
        assert_eq!(result.errors, vec!["photodna: service unavailable".to_string()]);
    }

    #[test]
    fn test_hash_type_parse() {
        assert_eq!("pdq".parse::<HashType>().unwrap(), HashType::Pdq);
        assert!("md5".parse::<HashType>().is_err());
        assert_eq!(serde_json::to_string(&HashType::PhotoDna).unwrap(), "\"photodna\"");
    }
}
