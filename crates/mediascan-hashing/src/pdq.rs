//! 256-bit PDQ perceptual hash
//!
//! Float luminance, two passes of a Jarosz tent filter (box blur along rows
//! then columns), decimation to 64x64, a 16x16 DCT that skips the DC row and
//! column, and a threshold at the median. The hash is stored in canonical
//! byte order: sixteen 16-bit words, highest word first, bit `k` of the
//! hash being bit `k % 16` of word `k / 16`.

use crate::dct::DctMatrix;
use crate::hash::HashValue;
use crate::hasher::{ComputedHash, ImageHasher};
use mediascan_core::{DecodedImage, Error, Result};

const BUFFER: usize = 64;
const HASH_DIM: usize = 16;
const JAROSZ_PASSES: usize = 2;

/// Hash plus input quality, 0-100
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdqHash {
    pub hash: [u8; 32],
    pub quality: u8,
}

/// PDQ over decoded pixels
pub struct PdqHasher {
    dct: DctMatrix,
}

impl PdqHasher {
    pub fn new() -> Self {
        Self {
            dct: DctMatrix::new(HASH_DIM, BUFFER, 1),
        }
    }

    pub fn hash(&self, image: &DecodedImage) -> Result<PdqHash> {
        let (cols, rows) = (image.width() as usize, image.height() as usize);
        if cols == 0 || rows == 0 {
            return Err(Error::validation("cannot hash an empty image"));
        }

        let mut luma: Vec<f32> = image
            .rgb()
            .pixels()
            .map(|p| {
                let [r, g, b] = p.0;
                0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
            })
            .collect();

        jarosz_filter(&mut luma, rows, cols);
        let buffer = decimate(&luma, rows, cols);
        let quality = quality(&buffer);

        let coefficients = self.dct.transform_2d(&buffer);
        let median = lower_median(&coefficients);

        let mut hash = [0u8; 32];
        for (k, &v) in coefficients.iter().enumerate() {
            if v > median {
                set_bit(&mut hash, k);
            }
        }

        Ok(PdqHash { hash, quality })
    }
}

impl Default for PdqHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageHasher for PdqHasher {
    fn compute(&self, image: &DecodedImage) -> Result<ComputedHash> {
        let pdq = self.hash(image)?;
        Ok(ComputedHash {
            value: HashValue::Pdq(pdq.hash),
            quality: Some(pdq.quality),
        })
    }
}

fn set_bit(hash: &mut [u8; 32], k: usize) {
    let word = k >> 4;
    let bit = k & 15;
    let byte = (15 - word) * 2 + usize::from(bit < 8);
    hash[byte] |= 1 << (bit & 7);
}

/// Test bit `k` of a canonical PDQ hash
pub fn bit(hash: &[u8; 32], k: usize) -> bool {
    let word = k >> 4;
    let bit = k & 15;
    let byte = (15 - word) * 2 + usize::from(bit < 8);
    hash[byte] & (1 << (bit & 7)) != 0
}

fn window_size(old_dim: usize) -> usize {
    (old_dim + 2 * BUFFER - 1) / (2 * BUFFER)
}

fn jarosz_filter(luma: &mut [f32], rows: usize, cols: usize) {
    let row_window = window_size(cols);
    let col_window = window_size(rows);
    let mut scratch = vec![0f32; luma.len()];

    for _ in 0..JAROSZ_PASSES {
        for i in 0..rows {
            box_1d(luma, &mut scratch, i * cols, cols, 1, row_window);
        }
        for j in 0..cols {
            box_1d(&scratch, luma, j, rows, cols, col_window);
        }
    }
}

/// Running-mean box filter over one strided line. Edges use the partial
/// window, so the output has the same length as the input.
fn box_1d(
    input: &[f32],
    output: &mut [f32],
    start: usize,
    len: usize,
    stride: usize,
    window: usize,
) {
    let half = (window + 2) / 2;
    let leading = half - 1;
    let growing = window - half + 1;
    let full = len - window;
    let trailing = half - 1;

    let (mut li, mut ri, mut oi) = (start, start, start);
    let mut sum = 0f32;
    let mut count = 0f32;

    for _ in 0..leading {
        sum += input[ri];
        count += 1.0;
        ri += stride;
    }
    for _ in 0..growing {
        sum += input[ri];
        count += 1.0;
        output[oi] = sum / count;
        ri += stride;
        oi += stride;
    }
    for _ in 0..full {
        sum += input[ri];
        sum -= input[li];
        output[oi] = sum / count;
        li += stride;
        ri += stride;
        oi += stride;
    }
    for _ in 0..trailing {
        sum -= input[li];
        count -= 1.0;
        output[oi] = sum / count;
        li += stride;
        oi += stride;
    }
}

fn decimate(luma: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(BUFFER * BUFFER);
    for i in 0..BUFFER {
        let src_i = (((i as f64 + 0.5) * rows as f64) / BUFFER as f64) as usize;
        for j in 0..BUFFER {
            let src_j = (((j as f64 + 0.5) * cols as f64) / BUFFER as f64) as usize;
            out.push(luma[src_i * cols + src_j]);
        }
    }
    out
}

/// Sum of neighbour gradients scaled to 0-100
fn quality(buffer: &[f32]) -> u8 {
    let step = |u: f32, v: f32| (((u - v) * 100.0) / 255.0) as i32;
    let mut gradient_sum: i64 = 0;

    for i in 0..BUFFER - 1 {
        for j in 0..BUFFER {
            gradient_sum += step(buffer[i * BUFFER + j], buffer[(i + 1) * BUFFER + j]).abs() as i64;
        }
    }
    for i in 0..BUFFER {
        for j in 0..BUFFER - 1 {
            gradient_sum += step(buffer[i * BUFFER + j], buffer[i * BUFFER + j + 1]).abs() as i64;
        }
    }

    (gradient_sum / 90).min(100) as u8
}

/// The `(n + 1) / 2`-th smallest value
fn lower_median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted[(sorted.len() + 1) / 2 - 1]
}
