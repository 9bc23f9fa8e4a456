//! Ensemble classification against a mocked registry


use mediascan_classifiers::catalog::{builtin_models, NSFW_DETECTOR, NUDENET, YAHOO_OPEN_NSFW};
use mediascan_classifiers::{
    AggregationMethod, BackendKind, DeviceType, EnsembleClassifier, ModelDescriptor, ModelRegistry,
    ModelSource, ModelTask, OutputActivation, PreprocessingMethod,
};
use mock_backend::{test_png, MockBackend};
use std::sync::Arc;
use std::time::Duration;

fn descriptor(id: &str, categories: &[&str], weight: f32) -> ModelDescriptor {
    ModelDescriptor {
        id: id.to_string(),
        name: id.to_string(),
        version: "1".to_string(),
        backend: BackendKind::SafeTensors,
        task: ModelTask::NsfwDetection,
        input_size: (32, 32),
        preprocessing: PreprocessingMethod::Raw01,
        categories: categories.iter().map(|c| c.to_string()).collect(),
        weight,
        enabled: true,
        source: ModelSource::local(format!("{}.safetensors", id)),
        output_activation: OutputActivation::Softmax,
        source_url: String::new(),
        license: String::new(),
        loaded: false,
        total_inferences: 0,
        avg_latency_ms: 0.0,
        last_inference: None,
    }
}

async fn loaded_registry(backend: MockBackend, models: Vec<ModelDescriptor>) -> Arc<ModelRegistry> {
    let registry = ModelRegistry::new(Arc::new(backend));
    for model in models {
        let id = model.id.clone();
        registry.register(model).unwrap();
        let _ = registry.load_model(&id, DeviceType::Cpu).await;
    }
    Arc::new(registry)
}

#[tokio::test]
async fn test_no_applicable_models() {
    let registry = Arc::new(ModelRegistry::new(Arc::new(MockBackend::new())));
    let ensemble = EnsembleClassifier::new(registry);

    let result = ensemble
        .classify_ensemble(&test_png(16, 16), ModelTask::NsfwDetection, AggregationMethod::WeightedAverage)
        .await
        .unwrap();

    assert!(result.final_scores.is_empty());
    assert_eq!(result.agreement_score, 1.0);
}

#[tokio::test]
async fn test_registered_but_unloaded_models_are_skipped() {
    let registry = Arc::new(ModelRegistry::with_builtins(Arc::new(MockBackend::new())));
    let ensemble = EnsembleClassifier::new(registry);

    let result = ensemble
        .classify_ensemble(&test_png(16, 16), ModelTask::NsfwDetection, AggregationMethod::WeightedAverage)
        .await
        .unwrap();

    assert_eq!(result.agreement_score, 1.0);
    assert!(result.model_results.is_empty());
}

#[tokio::test]
async fn test_all_models_failing() {
    let backend = MockBackend::new().with_failure("a").with_failure("b");
    let registry = loaded_registry(
        backend,
        vec![descriptor("a", &["explicit"], 0.5), descriptor("b", &["explicit"], 0.5)],
    )
    .await;
    let ensemble = EnsembleClassifier::new(registry);

    let result = ensemble
        .classify_ensemble(&test_png(16, 16), ModelTask::NsfwDetection, AggregationMethod::WeightedAverage)
        .await
        .unwrap();

    assert!(result.final_scores.is_empty());
    assert_eq!(result.agreement_score, 0.0);
}

#[tokio::test]
async fn test_weighted_average_keeps_absent_model_weight() {
    let backend = MockBackend::new().with_model("a", &[0.8]).with_model("b", &[0.9]);
    let registry = loaded_registry(
        backend,
        vec![descriptor("a", &["explicit"], 0.6), descriptor("b", &["safe"], 0.4)],
    )
    .await;
    let ensemble = EnsembleClassifier::new(registry);

    let result = ensemble
        .classify_ensemble(&test_png(16, 16), ModelTask::NsfwDetection, AggregationMethod::WeightedAverage)
        .await
        .unwrap();

    assert!((result.final_scores["explicit"] - 0.48).abs() < 1e-6);
    assert_eq!(result.model_results.len(), 2);
    // different top categories: 1 of 2 agree on the most common
    assert!((result.agreement_score - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn test_one_failure_does_not_abort_others() {
    let backend = MockBackend::new()
        .with_model("a", &[0.8, 0.2])
        .with_failure("b");
    let registry = loaded_registry(
        backend,
        vec![
            descriptor("a", &["explicit", "safe"], 0.5),
            descriptor("b", &["explicit", "safe"], 0.5),
        ],
    )
    .await;
    let ensemble = EnsembleClassifier::new(registry);

    let result = ensemble
        .classify_ensemble(&test_png(16, 16), ModelTask::NsfwDetection, AggregationMethod::WeightedAverage)
        .await
        .unwrap();

    assert_eq!(result.model_results.len(), 1);
    assert_eq!(result.agreement_score, 1.0);
    // the failed model's weight is excluded
    assert!((result.final_scores["explicit"] - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn test_builtin_models_are_normalized() {
    let backend = MockBackend::new()
        .with_model(NSFW_DETECTOR, &[0.7, 0.1, 0.0, 0.0, 0.0, 0.2])
        .with_model(YAHOO_OPEN_NSFW, &[0.9, 0.1])
        .with_model(
            NUDENET,
            &[0.0, 0.0, 0.6, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        );
    let registry = Arc::new(ModelRegistry::with_builtins(Arc::new(backend)));
    registry
        .load_enabled_for_task(ModelTask::NsfwDetection, DeviceType::Cpu)
        .await;
    let ensemble = EnsembleClassifier::new(Arc::clone(&registry));

    let result = ensemble
        .classify_ensemble(&test_png(64, 48), ModelTask::NsfwDetection, AggregationMethod::MajorityVote)
        .await
        .unwrap();

    assert_eq!(result.model_results.len(), 3);
    let yahoo = result
        .model_results
        .iter()
        .find(|m| m.model_id == YAHOO_OPEN_NSFW)
        .unwrap();
    assert!((yahoo.normalized_scores["explicit_sexual"] - 0.63).abs() < 1e-6);
    assert_eq!(yahoo.raw_scores.len(), 2);

    // every model's top category is explicit_sexual
    assert_eq!(result.final_scores["explicit_sexual"], 1.0);
    assert_eq!(result.top_category().map(|(c, _)| c), Some("explicit_sexual"));
    assert!(result.agreement_score > 0.8);

    assert_eq!(registry.health_check(YAHOO_OPEN_NSFW).unwrap().total_inferences, 1);
}

#[tokio::test(start_paused = true)]
async fn test_members_run_concurrently() {
    let backend = MockBackend::new()
        .with_model("a", &[0.8])
        .with_latency("a", Duration::from_millis(50))
        .with_model("b", &[0.6])
        .with_latency("b", Duration::from_millis(50));
    let registry = loaded_registry(
        backend,
        vec![descriptor("a", &["explicit"], 0.5), descriptor("b", &["explicit"], 0.5)],
    )
    .await;
    let ensemble = EnsembleClassifier::new(registry);
    let image = test_png(16, 16);

    let start = tokio::time::Instant::now();
    let result = ensemble
        .classify_ensemble(&image, ModelTask::NsfwDetection, AggregationMethod::MaxConfidence)
        .await
        .unwrap();

    assert!(start.elapsed() < Duration::from_millis(100));
    assert!((result.final_scores["explicit"] - 0.8).abs() < 1e-6);
}

#[tokio::test]
async fn test_undecodable_content() {
    let registry = Arc::new(ModelRegistry::new(Arc::new(MockBackend::new())));
    let ensemble = EnsembleClassifier::new(registry);

    let err = ensemble
        .classify_ensemble(b"not an image", ModelTask::NsfwDetection, AggregationMethod::WeightedAverage)
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[test]
fn test_catalog_ids_are_unique() {
    let models = builtin_models();
    let mut ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), models.len());
}
