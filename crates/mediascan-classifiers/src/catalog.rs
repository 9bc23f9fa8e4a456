//! Built-in model catalog

use crate::descriptor::{BackendKind, ModelDescriptor, ModelSource, ModelTask, OutputActivation};
use crate::preprocessing::PreprocessingMethod;

pub const NSFW_DETECTOR: &str = "nsfw_detector_v3";
pub const YAHOO_OPEN_NSFW: &str = "yahoo_open_nsfw";
pub const NUDENET: &str = "nudenet_v3";
pub const CLIP_SAFETY: &str = "clip_safety";
pub const NSFL_DETECTOR: &str = "nsfl_detector_v1";
pub const AGE_ESTIMATOR: &str = "age_estimator_v2";
pub const SCENE_CLASSIFIER: &str = "scene_classifier_v1";

/// Labels emitted by the dedicated NSFW model
pub const NSFW_CATEGORIES: [&str; 6] = [
    "explicit_sexual",
    "suggestive",
    "violence_graphic",
    "violence_mild",
    "drugs",
    "safe",
];

pub const NSFL_CATEGORIES: [&str; 5] = ["gore", "violence_graphic", "shock", "disturbing", "safe"];

/// The age regressor emits these three values in order
pub const AGE_OUTPUTS: [&str; 3] = ["estimated_age", "confidence", "face_detected"];

pub const SCENE_LABELS: [&str; 8] = [
    "indoor_bedroom",
    "indoor_bathroom",
    "indoor_school",
    "indoor_office",
    "outdoor_playground",
    "outdoor_street",
    "indoor_generic",
    "outdoor_generic",
];

struct Entry {
    id: &'static str,
    name: &'static str,
    version: &'static str,
    task: ModelTask,
    input_size: (u32, u32),
    preprocessing: PreprocessingMethod,
    categories: &'static [&'static str],
    weight: f32,
    enabled: bool,
    activation: OutputActivation,
    source_url: &'static str,
    license: &'static str,
}

const NUDENET_CATEGORIES: &[&str] = &[
    "safe",
    "female_genitalia_covered",
    "female_genitalia_exposed",
    "male_genitalia_exposed",
    "buttocks_exposed",
    "female_breast_exposed",
    "female_breast_covered",
    "anus_exposed",
    "belly_exposed",
    "feet_exposed",
    "armpits_exposed",
    "face_male",
    "face_female",
];

const BUILTINS: &[Entry] = &[
    Entry {
        id: NSFW_DETECTOR,
        name: "Internal NSFW Detector",
        version: "v3",
        task: ModelTask::NsfwDetection,
        input_size: (224, 224),
        preprocessing: PreprocessingMethod::Imagenet,
        categories: &NSFW_CATEGORIES,
        weight: 0.30,
        enabled: true,
        activation: OutputActivation::Softmax,
        source_url: "",
        license: "Proprietary",
    },
    Entry {
        id: YAHOO_OPEN_NSFW,
        name: "Yahoo Open NSFW",
        version: "1.0",
        task: ModelTask::NsfwDetection,
        input_size: (224, 224),
        preprocessing: PreprocessingMethod::Caffe,
        categories: &["nsfw", "sfw"],
        weight: 0.30,
        enabled: true,
        activation: OutputActivation::Softmax,
        source_url: "https://github.com/yahoo/open_nsfw",
        license: "BSD-2-Clause",
    },
    Entry {
        id: NUDENET,
        name: "NudeNet v3",
        version: "v3",
        task: ModelTask::NsfwDetection,
        input_size: (320, 320),
        preprocessing: PreprocessingMethod::Raw01,
        categories: NUDENET_CATEGORIES,
        weight: 0.25,
        enabled: true,
        // Independent per-region detectors
        activation: OutputActivation::Sigmoid,
        source_url: "https://github.com/notAI-tech/NudeNet",
        license: "Apache-2.0",
    },
    Entry {
        id: CLIP_SAFETY,
        name: "CLIP Safety Classifier",
        version: "1.0",
        task: ModelTask::NsfwDetection,
        input_size: (224, 224),
        preprocessing: PreprocessingMethod::Clip,
        categories: &["unsafe", "safe"],
        weight: 0.15,
        enabled: false,
        activation: OutputActivation::Softmax,
        source_url: "https://github.com/LAION-AI/CLIP-based-NSFW-Detector",
        license: "MIT",
    },
    Entry {
        id: NSFL_DETECTOR,
        name: "NSFL Detector",
        version: "v1",
        task: ModelTask::NsflDetection,
        input_size: (224, 224),
        preprocessing: PreprocessingMethod::Imagenet,
        categories: &NSFL_CATEGORIES,
        weight: 1.0,
        enabled: true,
        activation: OutputActivation::Softmax,
        source_url: "",
        license: "Proprietary",
    },
    Entry {
        id: AGE_ESTIMATOR,
        name: "Age Estimator",
        version: "v2",
        task: ModelTask::AgeEstimation,
        input_size: (224, 224),
        preprocessing: PreprocessingMethod::Imagenet,
        categories: &AGE_OUTPUTS,
        weight: 1.0,
        enabled: true,
        activation: OutputActivation::Identity,
        source_url: "",
        license: "Proprietary",
    },
    Entry {
        id: SCENE_CLASSIFIER,
        name: "Scene Classifier",
        version: "v1",
        task: ModelTask::SceneClassification,
        input_size: (299, 299),
        preprocessing: PreprocessingMethod::Imagenet,
        categories: &SCENE_LABELS,
        weight: 1.0,
        enabled: true,
        activation: OutputActivation::Softmax,
        source_url: "",
        license: "Proprietary",
    },
];

/// Fresh descriptors for every built-in model.
///
/// Weights are `<id>.safetensors`, relative to the backend's models directory.
pub fn builtin_models() -> Vec<ModelDescriptor> {
    BUILTINS
        .iter()
        .map(|e| ModelDescriptor {
            id: e.id.to_string(),
            name: e.name.to_string(),
            version: e.version.to_string(),
            backend: BackendKind::SafeTensors,
            task: e.task,
            input_size: e.input_size,
            preprocessing: e.preprocessing,
            categories: e.categories.iter().map(|c| c.to_string()).collect(),
            weight: e.weight,
            enabled: e.enabled,
            source: ModelSource::local(format!("{}.safetensors", e.id)),
            output_activation: e.activation,
            source_url: e.source_url.to_string(),
            license: e.license.to_string(),
            loaded: false,
            total_inferences: 0,
            avg_latency_ms: 0.0,
            last_inference: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::mapping_for;

    #[test]
    fn test_catalog_shape() {
        let models = builtin_models();
        assert_eq!(models.len(), 7);

        let nsfw: Vec<_> = models
            .iter()
            .filter(|m| m.task == ModelTask::NsfwDetection)
            .collect();
        assert_eq!(nsfw.len(), 4);
        assert!(models.iter().all(|m| (0.0..=1.0).contains(&m.weight)));
        assert!(models.iter().all(|m| !m.loaded && m.total_inferences == 0));
    }

    #[test]
    fn test_weights_are_relative_to_models_dir() {
        for model in builtin_models() {
            assert_eq!(
                model.source,
                ModelSource::local(format!("{}.safetensors", model.id))
            );
            match &model.source {
                ModelSource::Local { path } => assert!(path.is_relative()),
                other => panic!("unexpected source {:?}", other),
            }
        }
    }

    #[test]
    fn test_mapped_labels_exist_in_catalog() {
        for model in builtin_models() {
            if let Some(mapping) = mapping_for(&model.id) {
                for (label, _) in mapping.entries {
                    assert!(
                        model.categories.iter().any(|c| c == label),
                        "{} maps unknown label {}",
                        model.id,
                        label
                    );
                }
            }
        }
    }
}
