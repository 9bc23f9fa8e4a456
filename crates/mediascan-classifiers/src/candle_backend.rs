//! Candle-based inference backend
//!
//! Image models are loaded as ViT classifiers from SafeTensors weights. The
//! patch grid is sized from the descriptor's input size and the head from its
//! label count, so the same loader serves every task.

use crate::backend::{InferenceBackend, InferenceSession};
use crate::config::ClassifierSettings;
use crate::descriptor::{BackendKind, DeviceType, ModelDescriptor, ModelSource, OutputActivation};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::vit;
use hf_hub::{api::sync::Api, Repo, RepoType};
use mediascan_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Runs SafeTensors image classifiers with Candle
pub struct CandleBackend {
    /// Base directory for relative local model paths
    models_dir: PathBuf,
}

impl CandleBackend {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    /// Backend rooted at the configured `models_dir`
    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        Self::new(settings.models_dir.clone())
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Resolve model path from source
    fn resolve_model_path(models_dir: &Path, source: &ModelSource) -> Result<PathBuf> {
        match source {
            ModelSource::Local { path } => {
                let path = if path.is_relative() {
                    models_dir.join(path)
                } else {
                    path.clone()
                };

                if !path.exists() {
                    return Err(Error::configuration(format!(
                        "Model file not found: {:?}",
                        path
                    )));
                }
                Ok(path)
            }
            ModelSource::HuggingFace {
                repo_id,
                filename,
                revision,
            } => {
                let api = Api::new().map_err(|e| {
                    Error::configuration(format!("Failed to initialize HF API: {}", e))
                })?;

                let repo = api.repo(Repo::with_revision(
                    repo_id.clone(),
                    RepoType::Model,
                    revision.clone().unwrap_or_else(|| "main".to_string()),
                ));

                repo.get(filename).map_err(|e| {
                    Error::configuration(format!("Failed to download model from HF: {}", e))
                })
            }
        }
    }

    /// Create Candle device from device type
    fn create_device(device_type: DeviceType) -> Result<Device> {
        match device_type {
            DeviceType::Cpu => Ok(Device::Cpu),
            DeviceType::Cuda(idx) => Device::new_cuda(idx).map_err(|e| {
                Error::configuration(format!("Failed to create CUDA device: {}", e))
            }),
            DeviceType::Metal(idx) => Device::new_metal(idx).map_err(|e| {
                Error::configuration(format!("Failed to create Metal device: {}", e))
            }),
        }
    }

    fn vit_config(descriptor: &ModelDescriptor) -> vit::Config {
        let (height, _width) = descriptor.input_size;
        vit::Config {
            image_size: height as usize,
            ..vit::Config::vit_base_patch16_224()
        }
    }

    fn build_session(
        models_dir: &Path,
        descriptor: &ModelDescriptor,
        device_type: DeviceType,
    ) -> Result<CandleSession> {
        let weights_path = Self::resolve_model_path(models_dir, &descriptor.source)?;
        let device = Self::create_device(device_type)?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device).map_err(
                |e| Error::configuration(format!("Failed to load SafeTensors: {}", e)),
            )?
        };

        let model = vit::Model::new(&Self::vit_config(descriptor), descriptor.output_len(), vb)
            .map_err(|e| {
                Error::configuration(format!(
                    "Weights at {:?} do not match a ViT classifier: {}",
                    weights_path, e
                ))
            })?;

        debug!(model_id = %descriptor.id, path = ?weights_path, "Built ViT classifier");

        Ok(CandleSession {
            model: Arc::new(model),
            device,
            activation: descriptor.output_activation,
        })
    }
}

impl Default for CandleBackend {
    fn default() -> Self {
        Self::new("./models")
    }
}

#[async_trait]
impl InferenceBackend for CandleBackend {
    async fn load(
        &self,
        descriptor: &ModelDescriptor,
        device: DeviceType,
    ) -> Result<Arc<dyn InferenceSession>> {
        if descriptor.backend != BackendKind::SafeTensors {
            return Err(Error::configuration(format!(
                "Candle backend cannot load {:?} model {}",
                descriptor.backend, descriptor.id
            )));
        }

        let models_dir = self.models_dir.clone();
        let descriptor = descriptor.clone();

        // Weight download and mmap are blocking
        let session = tokio::task::spawn_blocking(move || {
            Self::build_session(&models_dir, &descriptor, device)
        })
        .await
        .map_err(|e| Error::internal(format!("model loading task failed: {}", e)))??;

        info!(device = %device, "Candle session ready");
        Ok(Arc::new(session))
    }

    fn name(&self) -> &str {
        "candle"
    }
}

struct CandleSession {
    model: Arc<vit::Model>,
    device: Device,
    activation: OutputActivation,
}

impl CandleSession {
    fn forward(model: &vit::Model, input: &Tensor, activation: OutputActivation) -> candle_core::Result<Vec<f32>> {
        let logits = model.forward(input)?;
        let activated = match activation {
            OutputActivation::Softmax => candle_nn::ops::softmax_last_dim(&logits)?,
            OutputActivation::Sigmoid => candle_nn::ops::sigmoid(&logits)?,
            OutputActivation::Identity => logits,
        };
        activated.squeeze(0)?.to_dtype(DType::F32)?.to_vec1::<f32>()
    }
}

#[async_trait]
impl InferenceSession for CandleSession {
    async fn predict(&self, input: &Tensor) -> Result<Vec<f32>> {
        let input = input
            .to_device(&self.device)
            .map_err(|e| Error::inference(format!("Failed to move input to device: {}", e)))?;
        let model = Arc::clone(&self.model);
        let activation = self.activation;

        tokio::task::spawn_blocking(move || Self::forward(&model, &input, activation))
            .await
            .map_err(|e| Error::internal(format!("inference task failed: {}", e)))?
            .map_err(|e| Error::inference(format!("Model forward pass failed: {}", e)))
    }
}
