//! 64-bit DCT perceptual hash
//!
//! Grayscale, Lanczos resize to 32x32, 2-D DCT, keep the lowest 8x8
//! frequencies, and set a bit for every coefficient above their median.
//! Bits are emitted row-major, most significant first.

use crate::dct::DctMatrix;
use crate::hash::HashValue;
use crate::hasher::{ComputedHash, ImageHasher};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use mediascan_core::{DecodedImage, Error, Result};

const SAMPLE_SIZE: u32 = 32;
const HASH_SIZE: usize = 8;

/// pHash over decoded pixels
pub struct PHasher {
    dct: DctMatrix,
}

impl PHasher {
    pub fn new() -> Self {
        Self {
            dct: DctMatrix::new(HASH_SIZE, SAMPLE_SIZE as usize, 0),
        }
    }

    pub fn hash(&self, image: &DecodedImage) -> Result<u64> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::validation("cannot hash an empty image"));
        }

        let gray = grayscale(image);
        let small = imageops::resize(&gray, SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Lanczos3);
        let samples: Vec<f32> = small.pixels().map(|p| p.0[0] as f32).collect();

        let low = self.dct.transform_2d(&samples);
        let median = median(&low);

        Ok(low
            .iter()
            .enumerate()
            .filter(|(_, &v)| v > median)
            .fold(0u64, |hash, (i, _)| hash | (1 << (63 - i))))
    }
}

impl Default for PHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageHasher for PHasher {
    fn compute(&self, image: &DecodedImage) -> Result<ComputedHash> {
        Ok(ComputedHash {
            value: HashValue::Phash(self.hash(image)?),
            quality: None,
        })
    }
}

/// ITU-R 601-2 luma in 16.16 fixed point
fn grayscale(image: &DecodedImage) -> GrayImage {
    let rgb = image.rgb();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16;
        Luma([l.min(255) as u8])
    })
}

/// Mean of the two middle values
fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    (sorted[mid - 1] + sorted[mid]) / 2.0
}
