//! MediaScan Classifiers
//!
//! Image safety classification built from independently loaded models.
//!
//! The moving parts, bottom-up:
//! - [`PreprocessingAdapter`] turns content into the NCHW tensor each model expects
//! - [`InferenceBackend`] loads model artifacts into runnable sessions
//!   (the Candle backend is behind the `ml-models` feature)
//! - [`ModelRegistry`] owns descriptors and sessions and dispatches inference
//! - [`EnsembleClassifier`] runs every model for a task and aggregates
//! - [`ClassificationOrchestrator`] stages the full classify call and
//!   applies the risk scoring and review routing in [`risk`]

pub mod backend;
#[cfg(feature = "ml-models")]
pub mod candle_backend;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod descriptor;
pub mod ensemble;
pub mod orchestrator;
pub mod preprocessing;
pub mod registry;
pub mod risk;
pub mod taxonomy;

pub use backend::{InferenceBackend, InferenceSession};
#[cfg(feature = "ml-models")]
pub use candle_backend::CandleBackend;
pub use classifier::{AgeEstimation, ClassificationResult, ClassificationScore, ContentCategory};
pub use config::{ClassificationThresholds, ClassifierSettings, DeviceSpec, ModelOverride};
pub use descriptor::{
    BackendKind, DeviceType, ModelDescriptor, ModelSource, ModelTask, OutputActivation,
};
pub use ensemble::{AggregationMethod, EnsembleClassifier, EnsembleResult, ModelContribution};
pub use orchestrator::ClassificationOrchestrator;
pub use preprocessing::{PreprocessingAdapter, PreprocessingMethod};
pub use registry::{ModelHealth, ModelRegistry};
pub use taxonomy::{normalize_scores, CanonicalCategory};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::{InferenceBackend, InferenceSession};
    pub use crate::classifier::{ClassificationResult, ContentCategory};
    pub use crate::config::ClassifierSettings;
    pub use crate::descriptor::{DeviceType, ModelDescriptor, ModelTask};
    pub use crate::ensemble::{AggregationMethod, EnsembleClassifier};
    pub use crate::orchestrator::ClassificationOrchestrator;
    pub use crate::preprocessing::PreprocessingAdapter;
    pub use crate::registry::ModelRegistry;
}
