//! Model descriptors: identity, task, input contract, and runtime counters

use crate::preprocessing::PreprocessingMethod;
use chrono::{DateTime, Utc};
use mediascan_core::clamp_unit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Classification task a model serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTask {
    NsfwDetection,
    NsflDetection,
    AgeEstimation,
    SceneClassification,
}

impl ModelTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NsfwDetection => "nsfw_detection",
            Self::NsflDetection => "nsfl_detection",
            Self::AgeEstimation => "age_estimation",
            Self::SceneClassification => "scene_classification",
        }
    }
}

impl fmt::Display for ModelTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized format of the model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SafeTensors weights (recommended)
    SafeTensors,
    /// ONNX graph
    Onnx,
    /// Remote API-backed model
    Api,
}

/// Source location for model weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSource {
    /// Load from local file system
    Local { path: PathBuf },

    /// Download from Hugging Face Hub
    HuggingFace {
        repo_id: String,
        filename: String,
        #[serde(default)]
        revision: Option<String>,
    },
}

impl ModelSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self::Local { path: path.into() }
    }
}

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// CPU inference (always available)
    #[default]
    Cpu,
    /// CUDA GPU inference (if available)
    Cuda(usize), // GPU index
    /// Metal (Apple Silicon)
    Metal(usize),
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(idx) => write!(f, "cuda:{}", idx),
            Self::Metal(idx) => write!(f, "metal:{}", idx),
        }
    }
}

/// Activation applied to the raw model head before scores leave the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputActivation {
    #[default]
    Softmax,
    Sigmoid,
    /// Regression outputs (age estimation) pass through untouched
    Identity,
}

/// Metadata and runtime counters for a registered detection model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub backend: BackendKind,
    pub task: ModelTask,

    /// (height, width) the model expects
    pub input_size: (u32, u32),

    pub preprocessing: PreprocessingMethod,

    /// Output labels, in the order the model emits them
    pub categories: Vec<String>,

    /// Ensemble weight, 0.0-1.0
    pub weight: f32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub source: ModelSource,

    #[serde(default)]
    pub output_activation: OutputActivation,

    /// Provenance URL (empty for proprietary models)
    #[serde(default)]
    pub source_url: String,

    #[serde(default)]
    pub license: String,

    #[serde(default)]
    pub loaded: bool,

    #[serde(default)]
    pub total_inferences: u64,

    #[serde(default)]
    pub avg_latency_ms: f64,

    #[serde(default)]
    pub last_inference: Option<DateTime<Utc>>,
}

impl ModelDescriptor {
    /// Fold one successful inference into the running counters
    pub fn record_inference(&mut self, elapsed_ms: f64) {
        self.total_inferences += 1;
        let n = self.total_inferences as f64;
        self.avg_latency_ms = (self.avg_latency_ms * (n - 1.0) + elapsed_ms) / n;
        self.last_inference = Some(Utc::now());
    }

    /// Number of values the model head emits
    pub fn output_len(&self) -> usize {
        self.categories.len()
    }

    /// Pair raw outputs with labels, clamped to 0.0-1.0. Extra values on
    /// either side are dropped.
    pub fn label_scores(&self, output: &[f32]) -> BTreeMap<String, f32> {
        self.categories
            .iter()
            .zip(output)
            .map(|(label, &score)| (label.clone(), clamp_unit(score)))
            .collect()
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor {
            id: "test".to_string(),
            name: "Test".to_string(),
            version: "1".to_string(),
            backend: BackendKind::SafeTensors,
            task: ModelTask::NsfwDetection,
            input_size: (224, 224),
            preprocessing: PreprocessingMethod::Imagenet,
            categories: vec!["nsfw".to_string(), "sfw".to_string()],
            weight: 0.5,
            enabled: true,
            source: ModelSource::local("/models/test.safetensors"),
            output_activation: OutputActivation::Softmax,
            source_url: String::new(),
            license: String::new(),
            loaded: false,
            total_inferences: 0,
            avg_latency_ms: 0.0,
            last_inference: None,
        }
    }

    #[test]
    fn test_running_mean() {
        let mut d = descriptor();
        d.record_inference(10.0);
        d.record_inference(20.0);
        d.record_inference(30.0);

        assert_eq!(d.total_inferences, 3);
        assert!((d.avg_latency_ms - 20.0).abs() < 1e-9);
        assert!(d.last_inference.is_some());
    }

    #[test]
    fn test_label_scores() {
        let scores = descriptor().label_scores(&[1.2, 0.3, 0.9]);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores["nsfw"], 1.0);
        assert!((scores["sfw"] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_model_source_yaml() {
        let local: ModelSource = serde_yaml::from_str("path: ./models/x.safetensors").unwrap();
        assert_eq!(local, ModelSource::local("./models/x.safetensors"));

        let hf: ModelSource =
            serde_yaml::from_str("repo_id: org/model\nfilename: model.safetensors").unwrap();
        assert!(matches!(hf, ModelSource::HuggingFace { revision: None, .. }));
    }

    #[test]
    fn test_task_names() {
        assert_eq!(ModelTask::SceneClassification.to_string(), "scene_classification");
        let task: ModelTask = serde_yaml::from_str("nsfl_detection").unwrap();
        assert_eq!(task, ModelTask::NsflDetection);
    }
}
