//! Model registry: descriptors, lifecycle, and inference dispatch
//!
//! The registry is an owned value handed to whoever needs it (usually behind
//! an `Arc`). Each model sits behind its own mutex so that counter updates
//! from overlapping `predict` calls on the same model never interleave; the
//! lock is released while the backend runs.

use crate::backend::{InferenceBackend, InferenceSession};
use crate::catalog::builtin_models;
use crate::descriptor::{DeviceType, ModelDescriptor, ModelTask};
use candle_core::Tensor;
use mediascan_core::{metrics as names, Error, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

struct ModelSlot {
    descriptor: ModelDescriptor,
    session: Option<Arc<dyn InferenceSession>>,
}

#[derive(Default)]
struct ModelTable {
    /// Registration order
    entries: Vec<Arc<Mutex<ModelSlot>>>,
    index: HashMap<String, usize>,
}

/// Health snapshot for one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelHealth {
    pub model_id: String,
    pub name: String,
    pub loaded: bool,
    pub enabled: bool,
    pub total_inferences: u64,
    /// Rounded to one decimal
    pub avg_latency_ms: f64,
}

/// Registry for detection models
pub struct ModelRegistry {
    backend: Arc<dyn InferenceBackend>,
    models: RwLock<ModelTable>,
}

impl ModelRegistry {
    /// Create an empty registry dispatching through `backend`
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            backend,
            models: RwLock::new(ModelTable::default()),
        }
    }

    /// Create a registry pre-populated with the built-in catalog
    pub fn with_builtins(backend: Arc<dyn InferenceBackend>) -> Self {
        let registry = Self::new(backend);
        registry.register_builtins();
        registry
    }

    /// Register (or replace) a model descriptor.
    ///
    /// Replacing drops any session held for that id; the new descriptor
    /// always starts unloaded.
    pub fn register(&self, mut descriptor: ModelDescriptor) -> Result<()> {
        if !(0.0..=1.0).contains(&descriptor.weight) {
            return Err(Error::validation(format!(
                "ensemble weight for {} must be within [0, 1], got {}",
                descriptor.id, descriptor.weight
            )));
        }

        descriptor.loaded = false;
        info!(
            model_id = %descriptor.id,
            name = %descriptor.name,
            task = %descriptor.task,
            weight = descriptor.weight,
            "Registered model"
        );

        let id = descriptor.id.clone();
        let slot = Arc::new(Mutex::new(ModelSlot {
            descriptor,
            session: None,
        }));

        let mut table = self.models.write();
        match table.index.get(&id).copied() {
            Some(pos) => table.entries[pos] = slot,
            None => {
                let pos = table.entries.len();
                table.entries.push(slot);
                table.index.insert(id, pos);
            }
        }

        Ok(())
    }

    /// Register all built-in models from the catalog
    pub fn register_builtins(&self) {
        let builtins = builtin_models();
        let count = builtins.len();
        for descriptor in builtins {
            // Catalog weights are static and in range
            if let Err(e) = self.register(descriptor) {
                warn!("Skipping built-in model: {}", e);
            }
        }
        info!("Registered {} built-in models", count);
    }

    fn slot(&self, model_id: &str) -> Result<Arc<Mutex<ModelSlot>>> {
        let table = self.models.read();
        table
            .index
            .get(model_id)
            .map(|&pos| Arc::clone(&table.entries[pos]))
            .ok_or_else(|| Error::validation(format!("Unknown model: {}", model_id)))
    }

    fn slots(&self) -> Vec<Arc<Mutex<ModelSlot>>> {
        self.models.read().entries.iter().cloned().collect()
    }

    /// Load a model into memory for inference
    pub async fn load_model(&self, model_id: &str, device: DeviceType) -> Result<()> {
        let slot = self.slot(model_id)?;
        let descriptor = slot.lock().descriptor.clone();

        let session = self
            .backend
            .load(&descriptor, device)
            .await
            .map_err(|e| match e {
                Error::Configuration(_) => e,
                other => Error::configuration(format!(
                    "Failed to load model {}: {}",
                    model_id, other
                )),
            })?;

        let mut guard = slot.lock();
        guard.session = Some(session);
        guard.descriptor.loaded = true;

        info!(model_id, device = %device, backend = self.backend.name(), "Loaded model");
        Ok(())
    }

    /// Load every enabled model for a task, tolerating individual failures.
    ///
    /// Returns the number of models loaded by this call.
    pub async fn load_enabled_for_task(&self, task: ModelTask, device: DeviceType) -> usize {
        let mut loaded = 0;
        for descriptor in self.get_models_for_task(task) {
            if descriptor.loaded {
                continue;
            }
            match self.load_model(&descriptor.id, device).await {
                Ok(()) => loaded += 1,
                Err(e) => warn!(model_id = %descriptor.id, "Model not available: {}", e),
            }
        }
        loaded
    }

    /// Unload a model from memory
    pub async fn unload_model(&self, model_id: &str) -> Result<()> {
        let slot = self.slot(model_id)?;
        let mut guard = slot.lock();
        guard.session = None;
        guard.descriptor.loaded = false;

        info!(model_id, "Unloaded model");
        Ok(())
    }

    /// Run inference on a loaded model
    pub async fn predict(&self, model_id: &str, input: &Tensor) -> Result<Vec<f32>> {
        let slot = self.slot(model_id)?;

        let session = {
            let guard = slot.lock();
            match (&guard.session, guard.descriptor.loaded) {
                (Some(session), true) => Arc::clone(session),
                _ => {
                    return Err(Error::inference(format!(
                        "Model {} is not loaded",
                        model_id
                    )))
                }
            }
        };

        let start = Instant::now();
        let output = match session.predict(input).await {
            Ok(output) => output,
            Err(e) => {
                metrics::counter!(names::INFERENCE_ERRORS_TOTAL, "model" => model_id.to_string())
                    .increment(1);
                return Err(match e {
                    Error::Inference(_) => e,
                    other => Error::inference(format!("Model {} failed: {}", model_id, other)),
                });
            }
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        slot.lock().descriptor.record_inference(elapsed_ms);

        metrics::counter!(names::INFERENCES_TOTAL, "model" => model_id.to_string()).increment(1);
        metrics::histogram!(names::INFERENCE_LATENCY_MS, "model" => model_id.to_string())
            .record(elapsed_ms);
        debug!(model_id, elapsed_ms, outputs = output.len(), "Inference complete");

        Ok(output)
    }

    /// Snapshot of a single descriptor
    pub fn get(&self, model_id: &str) -> Option<ModelDescriptor> {
        self.slot(model_id).ok().map(|s| s.lock().descriptor.clone())
    }

    /// Whether a model is registered and loaded
    pub fn is_loaded(&self, model_id: &str) -> bool {
        self.get(model_id).map(|d| d.loaded).unwrap_or(false)
    }

    /// All enabled models for a task, in registration order
    pub fn get_models_for_task(&self, task: ModelTask) -> Vec<ModelDescriptor> {
        self.list_models(Some(task), true)
    }

    /// List models with optional filtering
    pub fn list_models(&self, task: Option<ModelTask>, enabled_only: bool) -> Vec<ModelDescriptor> {
        self.slots()
            .iter()
            .map(|s| s.lock().descriptor.clone())
            .filter(|d| task.map_or(true, |t| d.task == t))
            .filter(|d| !enabled_only || d.enabled)
            .collect()
    }

    /// Enable or disable a model. Models are never removed.
    pub fn set_enabled(&self, model_id: &str, enabled: bool) -> Result<()> {
        self.update(model_id, |d| d.enabled = enabled)
    }

    /// Change a model's ensemble weight
    pub fn set_weight(&self, model_id: &str, weight: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::validation(format!(
                "ensemble weight for {} must be within [0, 1], got {}",
                model_id, weight
            )));
        }
        self.update(model_id, |d| d.weight = weight)
    }

    pub(crate) fn update(&self, model_id: &str, f: impl FnOnce(&mut ModelDescriptor)) -> Result<()> {
        let slot = self.slot(model_id)?;
        f(&mut slot.lock().descriptor);
        Ok(())
    }

    /// Check health of a specific model
    pub fn health_check(&self, model_id: &str) -> Result<ModelHealth> {
        let slot = self.slot(model_id)?;
        let guard = slot.lock();
        let d = &guard.descriptor;

        Ok(ModelHealth {
            model_id: d.id.clone(),
            name: d.name.clone(),
            loaded: d.loaded,
            enabled: d.enabled,
            total_inferences: d.total_inferences,
            avg_latency_ms: (d.avg_latency_ms * 10.0).round() / 10.0,
        })
    }

    /// Number of registered models
    pub fn count(&self) -> usize {
        self.models.read().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CLIP_SAFETY, NSFW_DETECTOR};
    use async_trait::async_trait;
    use candle_core::Device;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct EchoSession;

    #[async_trait]
    impl InferenceSession for EchoSession {
        async fn predict(&self, input: &Tensor) -> Result<Vec<f32>> {
            Ok(vec![input.elem_count() as f32])
        }
    }

    struct BrokenSession;

    #[async_trait]
    impl InferenceSession for BrokenSession {
        async fn predict(&self, _input: &Tensor) -> Result<Vec<f32>> {
            Err(Error::inference("kernel fault"))
        }
    }

    #[derive(Default)]
    struct TestBackend {
        loads: AtomicU32,
    }

    #[async_trait]
    impl InferenceBackend for TestBackend {
        async fn load(
            &self,
            descriptor: &ModelDescriptor,
            _device: DeviceType,
        ) -> Result<Arc<dyn InferenceSession>> {
            self.loads.fetch_add(1, Ordering::Relaxed);
            match descriptor.id.as_str() {
                "missing" => Err(Error::configuration("Model file not found")),
                "broken" => Ok(Arc::new(BrokenSession)),
                _ => Ok(Arc::new(EchoSession)),
            }
        }

        fn name(&self) -> &str {
            "test"
        }
    }

    fn input() -> Tensor {
        Tensor::zeros((1, 3, 2, 2), candle_core::DType::F32, &Device::Cpu).unwrap()
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::with_builtins(Arc::new(TestBackend::default()))
    }

    fn custom(id: &str) -> ModelDescriptor {
        let mut d = builtin_models().remove(0);
        d.id = id.to_string();
        d
    }

    #[test]
    fn test_register_builtins() {
        let registry = registry();
        assert_eq!(registry.count(), 7);
        // clip_safety ships disabled
        assert_eq!(registry.get_models_for_task(ModelTask::NsfwDetection).len(), 3);
        assert_eq!(registry.list_models(Some(ModelTask::NsfwDetection), false).len(), 4);
    }

    #[test]
    fn test_register_rejects_out_of_range_weight() {
        let registry = registry();
        let mut d = custom("heavy");
        d.weight = 1.5;
        assert!(registry.register(d).unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_predict_requires_loaded_model() {
        let registry = registry();
        let err = registry.predict(NSFW_DETECTOR, &input()).await.unwrap_err();
        assert!(err.is_inference());
    }

    #[tokio::test]
    async fn test_predict_unknown_model_is_validation_error() {
        let registry = registry();
        let err = registry.predict("nope", &input()).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_load_predict_unload() {
        let registry = registry();
        registry.load_model(NSFW_DETECTOR, DeviceType::Cpu).await.unwrap();
        assert!(registry.is_loaded(NSFW_DETECTOR));

        let out = registry.predict(NSFW_DETECTOR, &input()).await.unwrap();
        assert_eq!(out, vec![12.0]);

        let health = registry.health_check(NSFW_DETECTOR).unwrap();
        assert_eq!(health.total_inferences, 1);
        assert!(health.loaded);

        registry.unload_model(NSFW_DETECTOR).await.unwrap();
        assert!(!registry.is_loaded(NSFW_DETECTOR));
        assert!(registry.predict(NSFW_DETECTOR, &input()).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_predict_leaves_counters_untouched() {
        let registry = registry();
        registry.register(custom("broken")).unwrap();
        registry.load_model("broken", DeviceType::Cpu).await.unwrap();

        let err = registry.predict("broken", &input()).await.unwrap_err();
        assert!(err.is_inference());

        let health = registry.health_check("broken").unwrap();
        assert_eq!(health.total_inferences, 0);
        assert_eq!(health.avg_latency_ms, 0.0);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_configuration_error() {
        let registry = registry();
        registry.register(custom("missing")).unwrap();

        let err = registry.load_model("missing", DeviceType::Cpu).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(!registry.is_loaded("missing"));
    }

    #[tokio::test]
    async fn test_concurrent_predicts_count_every_call() {
        let registry = Arc::new(registry());
        registry.load_model(NSFW_DETECTOR, DeviceType::Cpu).await.unwrap();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.predict(NSFW_DETECTOR, &input()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(registry.health_check(NSFW_DETECTOR).unwrap().total_inferences, 32);
    }

    #[test]
    fn test_disable_never_removes() {
        let registry = registry();
        registry.set_enabled(CLIP_SAFETY, true).unwrap();
        assert_eq!(registry.get_models_for_task(ModelTask::NsfwDetection).len(), 4);

        registry.set_enabled(NSFW_DETECTOR, false).unwrap();
        assert_eq!(registry.get_models_for_task(ModelTask::NsfwDetection).len(), 3);
        assert!(registry.get(NSFW_DETECTOR).is_some());
    }

    #[test]
    fn test_health_check_unknown_model() {
        let registry = registry();
        assert!(registry.health_check("ghost").unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_load_enabled_for_task() {
        let registry = registry();
        let loaded = registry
            .load_enabled_for_task(ModelTask::NsfwDetection, DeviceType::Cpu)
            .await;
        assert_eq!(loaded, 3);
        assert!(!registry.is_loaded(CLIP_SAFETY));
    }
}
