//! Decoded pixel buffers
//!
//! Decoding happens once per call and the resulting pixels are wiped when the
//! [`DecodedImage`] goes out of scope. Resized working copies made by the
//! preprocessing and hashing code are wrapped the same way.

use crate::{Error, Result};
use image::RgbImage;
use std::fmt;
use std::sync::Arc;
use zeroize::{Zeroize, Zeroizing};

/// RGB pixels decoded from transient content
pub struct DecodedImage {
    pixels: RgbImage,
}

impl DecodedImage {
    /// Decode any supported container format into 8-bit RGB
    pub fn decode(content: &[u8]) -> Result<Self> {
        let dynamic = image::load_from_memory(content)
            .map_err(|e| Error::validation(format!("failed to decode image: {}", e)))?;

        Ok(Self::from_rgb(dynamic.into_rgb8()))
    }

    /// Decode on the blocking pool.
    ///
    /// The task works on a copy of `content` that is wiped as soon as decoding
    /// finishes. The shared result can be handed to further blocking tasks.
    pub async fn decode_blocking(content: &[u8]) -> Result<Arc<Self>> {
        let bytes = Zeroizing::new(content.to_vec());
        tokio::task::spawn_blocking(move || Self::decode(&bytes).map(Arc::new))
            .await
            .map_err(|e| Error::internal(format!("decode task failed: {}", e)))?
    }

    /// Wrap an already-materialized RGB buffer
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

impl Drop for DecodedImage {
    fn drop(&mut self) {
        let raw: &mut [u8] = &mut self.pixels;
        raw.zeroize();
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.pixels.width())
            .field("height", &self.pixels.height())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let decoded = DecodedImage::decode(&png_bytes(7, 5)).unwrap();
        assert_eq!(decoded.width(), 7);
        assert_eq!(decoded.height(), 5);
        assert_eq!(decoded.rgb().get_pixel(3, 2), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_garbage_is_validation_error() {
        let err = DecodedImage::decode(b"definitely not an image").unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_decode_blocking() {
        let decoded = DecodedImage::decode_blocking(&png_bytes(4, 9)).await.unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 9));

        let err = DecodedImage::decode_blocking(b"GIF89a truncated").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_debug_shows_dimensions_only() {
        let decoded = DecodedImage::from_rgb(RgbImage::new(2, 3));
        assert_eq!(format!("{:?}", decoded), "DecodedImage { width: 2, height: 3 }");
    }
}
