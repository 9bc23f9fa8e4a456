//! Truncated 2-D DCT-II by matrix multiplication

use std::f64::consts::PI;

/// The first `rows` DCT-II basis vectors of length `size`, starting at
/// frequency `first`. Every row carries the same `sqrt(2/size)` scale.
pub struct DctMatrix {
    rows: usize,
    size: usize,
    coeffs: Vec<f32>,
}

impl DctMatrix {
    pub fn new(rows: usize, size: usize, first: usize) -> Self {
        let scale = (2.0 / size as f64).sqrt();
        let mut coeffs = Vec::with_capacity(rows * size);
        for i in 0..rows {
            let k = (i + first) as f64;
            for j in 0..size {
                let angle = (PI / 2.0 / size as f64) * k * (2 * j + 1) as f64;
                coeffs.push((scale * angle.cos()) as f32);
            }
        }
        Self { rows, size, coeffs }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// `D * A * D^T` for a row-major `size` x `size` input; the output is
    /// row-major `rows` x `rows`, vertical frequency first.
    pub fn transform_2d(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.size * self.size);
        let (r, n) = (self.rows, self.size);

        let mut left = vec![0f32; r * n];
        for i in 0..r {
            let d = &self.coeffs[i * n..(i + 1) * n];
            for j in 0..n {
                left[i * n + j] = (0..n).map(|k| d[k] * input[k * n + j]).sum();
            }
        }

        let mut out = vec![0f32; r * r];
        for i in 0..r {
            let row = &left[i * n..(i + 1) * n];
            for j in 0..r {
                let d = &self.coeffs[j * n..(j + 1) * n];
                out[i * r + j] = row.iter().zip(d).map(|(a, b)| a * b).sum();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_input_has_only_dc() {
        let dct = DctMatrix::new(4, 8, 0);
        let out = dct.transform_2d(&[1.0; 64]);

        assert!(out[0] > 1.0);
        assert!(out[1..].iter().all(|v| v.abs() < 1e-4));
    }

    #[test]
    fn test_skipping_dc() {
        let dct = DctMatrix::new(2, 8, 1);
        let out = dct.transform_2d(&[3.0; 64]);
        assert!(out.iter().all(|v| v.abs() < 1e-4));
    }

    #[test]
    fn test_horizontal_ramp_is_first_row() {
        let n = 8;
        let input: Vec<f32> = (0..n * n).map(|i| (i % n) as f32).collect();
        let out = DctMatrix::new(3, n, 0).transform_2d(&input);

        // varies along x only: energy stays in the first (vertical DC) row
        assert!(out[1].abs() > 1.0);
        assert!(out[3].abs() < 1e-3);
        assert!(out[4].abs() < 1e-3);
    }
}
