//! Configuration for classification and model loading

use crate::catalog::{AGE_ESTIMATOR, NSFL_DETECTOR, NSFW_DETECTOR, SCENE_CLASSIFIER};
use crate::descriptor::{DeviceType, ModelSource};
use crate::ensemble::AggregationMethod;
use crate::registry::ModelRegistry;
use mediascan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Settings for the classification orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Device to load models on
    pub device: DeviceSpec,

    pub nsfw_model_id: String,
    pub nsfl_model_id: String,
    pub age_model_id: String,
    pub scene_model_id: String,

    /// Load and run the NSFL model when available
    pub nsfl_enabled: bool,

    /// Run the NSFW ensemble alongside the core stages
    pub ensemble_enabled: bool,
    pub ensemble_method: AggregationMethod,

    pub thresholds: ClassificationThresholds,

    /// Per-model overrides applied onto the built-in catalog
    pub models: HashMap<String, ModelOverride>,

    /// Base directory for relative model paths, catalog defaults included.
    /// Resolution happens in the backend; see `CandleBackend::from_settings`.
    pub models_dir: PathBuf,
}

/// Decision thresholds, all 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationThresholds {
    /// A category wins when its score is strictly above this
    pub confidence_threshold: f32,
    /// CSAM_SUSPECT when the composite score reaches this
    pub csam_alert_threshold: f32,
    /// Alert level for `nsfl_score`. Reaching it is logged and left to callers
    /// via [`Self::is_nsfl_alert`]; the primary classification ignores it.
    pub nsfl_alert_threshold: f32,
    /// Ensemble agreement below this is flagged
    pub low_agreement_threshold: f32,
}

/// Override for one catalog entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelOverride {
    pub enabled: Option<bool>,
    pub weight: Option<f32>,
    pub source: Option<ModelSource>,
}

/// Device specification (for config files)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda { index: Option<usize> },
    Metal { index: Option<usize> },
}

impl DeviceSpec {
    /// Convert to DeviceType
    pub fn to_device_type(&self) -> DeviceType {
        match self {
            DeviceSpec::Cpu => DeviceType::Cpu,
            DeviceSpec::Cuda { index } => DeviceType::Cuda(index.unwrap_or(0)),
            DeviceSpec::Metal { index } => DeviceType::Metal(index.unwrap_or(0)),
        }
    }
}

impl Default for ClassificationThresholds {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            csam_alert_threshold: 0.85,
            nsfl_alert_threshold: 0.80,
            low_agreement_threshold: 0.6,
        }
    }
}

impl ClassificationThresholds {
    pub fn is_nsfl_alert(&self, nsfl_score: f32) -> bool {
        nsfl_score >= self.nsfl_alert_threshold
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            device: DeviceSpec::Cpu,
            nsfw_model_id: NSFW_DETECTOR.to_string(),
            nsfl_model_id: NSFL_DETECTOR.to_string(),
            age_model_id: AGE_ESTIMATOR.to_string(),
            scene_model_id: SCENE_CLASSIFIER.to_string(),
            nsfl_enabled: true,
            ensemble_enabled: false,
            ensemble_method: AggregationMethod::WeightedAverage,
            thresholds: ClassificationThresholds::default(),
            models: HashMap::new(),
            models_dir: PathBuf::from("./models"),
        }
    }
}

impl ClassifierSettings {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::configuration(format!("Invalid classifier settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Reject out-of-range thresholds and weights
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        for (name, value) in [
            ("confidence_threshold", t.confidence_threshold),
            ("csam_alert_threshold", t.csam_alert_threshold),
            ("nsfl_alert_threshold", t.nsfl_alert_threshold),
            ("low_agreement_threshold", t.low_agreement_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::validation(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        for (id, model) in &self.models {
            if let Some(weight) = model.weight {
                if !(0.0..=1.0).contains(&weight) {
                    return Err(Error::validation(format!(
                        "weight for {} must be within [0, 1], got {}",
                        id, weight
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn device_type(&self) -> DeviceType {
        self.device.to_device_type()
    }

    /// Apply per-model overrides onto registered descriptors
    pub fn apply_overrides(&self, registry: &ModelRegistry) -> Result<()> {
        for (id, model) in &self.models {
            if let Some(weight) = model.weight {
                registry.set_weight(id, weight)?;
            }
            if let Some(enabled) = model.enabled {
                registry.set_enabled(id, enabled)?;
            }
            if let Some(source) = &model.source {
                registry.update(id, |d| d.source = source.clone())?;
            }
        }
        Ok(())
    }
}
