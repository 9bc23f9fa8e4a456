//! Extension points for model inference backends.

use crate::descriptor::{DeviceType, ModelDescriptor};
use async_trait::async_trait;
use candle_core::Tensor;
use mediascan_core::Result;
use std::sync::Arc;

/// A loaded, ready-to-run model.
#[async_trait]
pub trait InferenceSession: Send + Sync {
    /// Run one forward pass on an NCHW tensor (batch of one) and return the
    /// first output for the first batch item.
    async fn predict(&self, input: &Tensor) -> Result<Vec<f32>>;
}

/// Pluggable runtime for model inference.
///
/// Implement this trait to run models on a different engine (Candle, ONNX,
/// a remote service) without touching registry or ensemble logic. A missing
/// or unreadable artifact must surface as `Error::Configuration`.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Instantiate an inference session for the given model.
    async fn load(
        &self,
        descriptor: &ModelDescriptor,
        device: DeviceType,
    ) -> Result<Arc<dyn InferenceSession>>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
