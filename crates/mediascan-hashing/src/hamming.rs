//! Hamming distance over hash encodings

use mediascan_core::{Error, Result};

/// Differing bits between two 64-bit hashes
#[inline]
pub fn hamming_distance_u64(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Differing bits between two byte strings of equal length
pub fn hamming_distance_bytes(a: &[u8], b: &[u8]) -> Result<u32> {
    if a.len() != b.len() {
        return Err(Error::validation(format!(
            "Hash lengths must match ({} vs {} bytes)",
            a.len(),
            b.len()
        )));
    }

    Ok(a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum())
}

/// Differing bits between two hex strings of equal length
pub fn hamming_distance_hex(a: &str, b: &str) -> Result<u32> {
    if a.len() != b.len() {
        return Err(Error::validation(format!(
            "Hash lengths must match ({} vs {} hex digits)",
            a.len(),
            b.len()
        )));
    }

    a.chars().zip(b.chars()).try_fold(0u32, |acc, (x, y)| {
        let (x, y) = (nibble(x)?, nibble(y)?);
        Ok(acc + (x ^ y).count_ones())
    })
}

fn nibble(c: char) -> Result<u32> {
    c.to_digit(16)
        .ok_or_else(|| Error::validation(format!("Invalid hex digit: {:?}", c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_distances() {
        assert_eq!(hamming_distance_u64(0, u64::MAX), 64);
        assert_eq!(hamming_distance_bytes(&[0b1010], &[0b0101]).unwrap(), 4);
        assert_eq!(hamming_distance_hex("ff00", "0f01").unwrap(), 5);
        assert_eq!(hamming_distance_hex("ABC", "abc").unwrap(), 0);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(hamming_distance_bytes(&[0; 8], &[0; 32]).unwrap_err().is_validation());
        assert!(hamming_distance_hex("ff", "fff").unwrap_err().is_validation());
    }

    #[test]
    fn test_invalid_hex() {
        assert!(hamming_distance_hex("zz", "00").unwrap_err().is_validation());
    }

    proptest! {
        #[test]
        fn prop_distance_to_self_is_zero(bytes in proptest::collection::vec(any::<u8>(), 0..144)) {
            prop_assert_eq!(hamming_distance_bytes(&bytes, &bytes).unwrap(), 0);
        }

        #[test]
        fn prop_distance_is_symmetric(a in any::<[u8; 32]>(), b in any::<[u8; 32]>()) {
            prop_assert_eq!(
                hamming_distance_bytes(&a, &b).unwrap(),
                hamming_distance_bytes(&b, &a).unwrap()
            );
        }

        #[test]
        fn prop_hex_matches_bytes(a in any::<[u8; 8]>(), b in any::<[u8; 8]>()) {
            prop_assert_eq!(
                hamming_distance_hex(&hex::encode(a), &hex::encode(b)).unwrap(),
                hamming_distance_bytes(&a, &b).unwrap()
            );
        }

        #[test]
        fn prop_u64_matches_bytes(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(
                hamming_distance_u64(a, b),
                hamming_distance_bytes(&a.to_be_bytes(), &b.to_be_bytes()).unwrap()
            );
        }
    }
}
