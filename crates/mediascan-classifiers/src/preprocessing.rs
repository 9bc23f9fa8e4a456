//! Model-specific image preprocessing
//!
//! Converts content into the NCHW float32 tensor (batch of one) each model
//! was trained against. The four normalizations are reproduced exactly;
//! a drifted constant silently skews every downstream score.

use candle_core::{Device, Tensor};
use image::imageops::{self, FilterType};
use mediascan_core::{DecodedImage, Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

const IMAGENET_MEAN: [f64; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f64; 3] = [0.229, 0.224, 0.225];

/// Mean pixel in BGR order
const CAFFE_MEAN_BGR: [f64; 3] = [103.939, 116.779, 123.68];

const CLIP_MEAN: [f64; 3] = [0.48145466, 0.4578275, 0.40821073];
const CLIP_STD: [f64; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Normalization scheme a model expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreprocessingMethod {
    /// torchvision convention: [0,1] then ImageNet mean/std
    #[serde(rename = "imagenet")]
    Imagenet,
    /// BGR with mean-pixel subtraction, no [0,1] scaling
    #[serde(rename = "caffe")]
    Caffe,
    /// [0,1] scaling only
    #[serde(rename = "raw_0_1")]
    Raw01,
    /// [0,1] then CLIP mean/std
    #[serde(rename = "clip")]
    Clip,
}

impl PreprocessingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imagenet => "imagenet",
            Self::Caffe => "caffe",
            Self::Raw01 => "raw_0_1",
            Self::Clip => "clip",
        }
    }

    /// Value for output channel `c` given the source RGB pixel
    fn channel_value(&self, rgb: [u8; 3], c: usize) -> f32 {
        match self {
            Self::Imagenet => standardize(rgb[c], IMAGENET_MEAN[c], IMAGENET_STD[c]),
            Self::Clip => standardize(rgb[c], CLIP_MEAN[c], CLIP_STD[c]),
            Self::Raw01 => rgb[c] as f32 / 255.0,
            Self::Caffe => (rgb[2 - c] as f64 - CAFFE_MEAN_BGR[c]) as f32,
        }
    }
}

impl FromStr for PreprocessingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "imagenet" => Ok(Self::Imagenet),
            "caffe" => Ok(Self::Caffe),
            "raw_0_1" => Ok(Self::Raw01),
            "clip" => Ok(Self::Clip),
            other => Err(Error::validation(format!(
                "unknown preprocessing method: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PreprocessingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scaled to [0,1] in single precision, then standardized in double
fn standardize(value: u8, mean: f64, std: f64) -> f32 {
    let scaled = (value as f32 / 255.0) as f64;
    ((scaled - mean) / std) as f32
}

/// Adapts content to the tensor format required by each model
pub struct PreprocessingAdapter;

impl PreprocessingAdapter {
    /// Decode, resize, and normalize content for one model.
    ///
    /// `target_size` is (height, width); `method` is one of `imagenet`,
    /// `caffe`, `raw_0_1`, `clip`.
    pub fn preprocess(content: &[u8], target_size: (u32, u32), method: &str) -> Result<Tensor> {
        let method: PreprocessingMethod = method.parse()?;
        let decoded = DecodedImage::decode(content)?;
        Self::preprocess_image(&decoded, target_size, method)
    }

    /// [`Self::preprocess_image`] on the blocking pool
    pub async fn preprocess_blocking(
        image: &Arc<DecodedImage>,
        target_size: (u32, u32),
        method: PreprocessingMethod,
    ) -> Result<Tensor> {
        let image = Arc::clone(image);
        tokio::task::spawn_blocking(move || Self::preprocess_image(&image, target_size, method))
            .await
            .map_err(|e| Error::internal(format!("preprocessing task failed: {}", e)))?
    }

    /// Resize and normalize an already-decoded image
    pub fn preprocess_image(
        image: &DecodedImage,
        target_size: (u32, u32),
        method: PreprocessingMethod,
    ) -> Result<Tensor> {
        let (height, width) = target_size;
        if height == 0 || width == 0 {
            return Err(Error::validation(format!(
                "invalid target size {}x{}",
                height, width
            )));
        }

        let resized = DecodedImage::from_rgb(imageops::resize(
            image.rgb(),
            width,
            height,
            FilterType::Lanczos3,
        ));

        let (h, w) = (height as usize, width as usize);
        let plane = h * w;
        let mut data = vec![0f32; 3 * plane];

        for (x, y, pixel) in resized.rgb().enumerate_pixels() {
            let offset = y as usize * w + x as usize;
            for c in 0..3 {
                data[c * plane + offset] = method.channel_value(pixel.0, c);
            }
        }

        Tensor::from_vec(data, (1, 3, h, w), &Device::Cpu)
            .map_err(|e| Error::internal(format!("failed to build input tensor: {}", e)))
    }
}
