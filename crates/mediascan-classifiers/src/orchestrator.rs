//! End-to-end content classification
//!
//! One `classify` call decodes the content once, runs the NSFW, NSFL, age,
//! and scene stages (plus the optional NSFW ensemble) concurrently, then
//! folds their outputs into a composite CSAM score, a primary
//! classification, and a review decision.
//!
//! The NSFW, age, and scene stages are mandatory: a failure there fails the
//! whole call. The NSFL stage and the ensemble degrade to "absent".

use crate::classifier::{ClassificationResult, ClassificationScore};
use crate::config::ClassifierSettings;
use crate::descriptor::{ModelDescriptor, ModelTask};
use crate::ensemble::{EnsembleClassifier, EnsembleResult};
use crate::preprocessing::PreprocessingAdapter;
use crate::registry::ModelRegistry;
use crate::risk::{self, NsfwScores};
use chrono::Utc;
use mediascan_core::{metrics as names, ContentBuffer, DecodedImage, Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Output of one single-model stage
struct StageOutput {
    descriptor: ModelDescriptor,
    scores: BTreeMap<String, f32>,
    raw: Vec<f32>,
}

impl StageOutput {
    fn to_scores(&self, prefix: &str) -> impl Iterator<Item = ClassificationScore> + '_ {
        let prefix = prefix.to_string();
        self.scores.iter().map(move |(category, score)| {
            ClassificationScore::new(
                format!("{}{}", prefix, category),
                *score,
                &self.descriptor.name,
                &self.descriptor.version,
            )
        })
    }
}

/// Runs the staged classification of a single piece of content
pub struct ClassificationOrchestrator {
    settings: ClassifierSettings,
    registry: Arc<ModelRegistry>,
    ensemble: EnsembleClassifier,
}

impl ClassificationOrchestrator {
    pub fn new(settings: ClassifierSettings, registry: Arc<ModelRegistry>) -> Self {
        let ensemble = EnsembleClassifier::new(Arc::clone(&registry));
        Self {
            settings,
            registry,
            ensemble,
        }
    }

    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Apply settings overrides and load the core model set.
    ///
    /// NSFL and ensemble members are optional; everything else must load.
    pub async fn initialize(&self) -> Result<()> {
        let device = self.settings.device_type();
        self.settings.apply_overrides(&self.registry)?;

        for id in [
            &self.settings.nsfw_model_id,
            &self.settings.age_model_id,
            &self.settings.scene_model_id,
        ] {
            self.registry.load_model(id, device).await?;
        }

        if self.settings.nsfl_enabled {
            if let Err(e) = self
                .registry
                .load_model(&self.settings.nsfl_model_id, device)
                .await
            {
                warn!(
                    model_id = %self.settings.nsfl_model_id,
                    "NSFL model not available, continuing without it: {}", e
                );
            }
        }

        if self.settings.ensemble_enabled {
            let loaded = self
                .registry
                .load_enabled_for_task(ModelTask::NsfwDetection, device)
                .await;
            debug!(loaded, "Loaded ensemble members");
        }

        info!(device = %device, "Classification models initialized");
        Ok(())
    }

    /// Classify content. `sha256` is the caller-supplied digest.
    pub async fn classify(
        &self,
        content: &ContentBuffer,
        sha256: &str,
    ) -> Result<ClassificationResult> {
        let start = Instant::now();
        let image = DecodedImage::decode_blocking(content.as_bytes()).await?;

        let (nsfw, nsfl, age, scene, ensemble) = tokio::join!(
            self.run_stage(&self.settings.nsfw_model_id, &image),
            self.run_nsfl(&image),
            self.run_stage(&self.settings.age_model_id, &image),
            self.run_stage(&self.settings.scene_model_id, &image),
            self.run_ensemble(&image),
        );
        drop(image);

        let nsfw = nsfw?;
        let age = age?;
        let scene = scene?;

        let nsfw_scores = NsfwScores::from_scores(&nsfw.scores);
        let nsfw_score = nsfw_scores.nsfw_score();

        let age_estimation = risk::estimate_age(&age.raw)?;
        let scene_risk = risk::scene_risk(&scene.scores);
        let csam_score =
            risk::compute_csam_risk(&nsfw_scores, age_estimation.as_ref(), scene_risk);

        let classification = risk::determine_classification(
            &nsfw_scores,
            csam_score,
            &self.settings.thresholds,
        );
        let requires_human_review = risk::requires_human_review(
            classification,
            csam_score,
            age_estimation.as_ref(),
            nsfw_score,
        );

        let mut all_scores: Vec<ClassificationScore> = nsfw.to_scores("").collect();
        let nsfl_score = match &nsfl {
            Some(nsfl) => {
                all_scores.extend(nsfl.to_scores("nsfl_"));
                nsfl.scores
                    .iter()
                    .filter(|(category, _)| category.as_str() != "safe")
                    .fold(0.0f32, |acc, (_, &s)| acc.max(s))
            }
            None => 0.0,
        };
        all_scores.extend(scene.to_scores("scene_"));
        if self.settings.thresholds.is_nsfl_alert(nsfl_score) {
            warn!(sha256, nsfl_score, "NSFL score reached alert threshold");
        }

        let model_agreement = ensemble.as_ref().map(|e| e.agreement_score).unwrap_or(1.0);
        let low_model_agreement = ensemble
            .as_ref()
            .map(|e| e.is_low_agreement(self.settings.thresholds.low_agreement_threshold))
            .unwrap_or(false);

        let elapsed = start.elapsed();
        let processing_time_ms = elapsed.as_millis() as u64;

        metrics::counter!(names::CLASSIFICATIONS_TOTAL, "classification" => classification.as_str())
            .increment(1);
        metrics::histogram!(names::CLASSIFICATION_LATENCY_MS).record(elapsed.as_secs_f64() * 1000.0);
        if requires_human_review {
            metrics::counter!(names::REVIEW_ROUTED_TOTAL).increment(1);
        }

        info!(
            sha256,
            len = content.len(),
            classification = %classification,
            nsfw_score,
            nsfl_score,
            csam_score,
            requires_human_review,
            processing_time_ms,
            "Content classified"
        );

        Ok(ClassificationResult {
            sha256: sha256.to_string(),
            primary_classification: classification,
            nsfw_score,
            nsfl_score,
            csam_score,
            age_estimation,
            all_scores,
            processing_time_ms,
            requires_human_review,
            model_agreement,
            low_model_agreement,
            ensemble,
            classified_at: Utc::now(),
        })
    }

    /// Classify with a deadline. Nothing partial is returned on expiry.
    pub async fn classify_with_timeout(
        &self,
        content: &ContentBuffer,
        sha256: &str,
        timeout: Duration,
    ) -> Result<ClassificationResult> {
        match tokio::time::timeout(timeout, self.classify(content, sha256)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(sha256, timeout_ms = timeout.as_millis() as u64, "Classification timed out");
                Err(Error::Timeout)
            }
        }
    }

    /// Classify until `token` is cancelled. In-flight model calls are
    /// dropped with the classification future.
    pub async fn classify_cancellable(
        &self,
        content: &ContentBuffer,
        sha256: &str,
        token: &CancellationToken,
    ) -> Result<ClassificationResult> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(sha256, "Classification cancelled");
                Err(Error::Cancelled)
            }
            result = self.classify(content, sha256) => result,
        }
    }

    async fn run_stage(&self, model_id: &str, image: &Arc<DecodedImage>) -> Result<StageOutput> {
        let descriptor = self
            .registry
            .get(model_id)
            .ok_or_else(|| Error::validation(format!("Unknown model: {}", model_id)))?;

        let input = PreprocessingAdapter::preprocess_blocking(
            image,
            descriptor.input_size,
            descriptor.preprocessing,
        )
        .await?;
        let raw = self.registry.predict(model_id, &input).await?;
        let scores = descriptor.label_scores(&raw);

        Ok(StageOutput {
            descriptor,
            scores,
            raw,
        })
    }

    async fn run_nsfl(&self, image: &Arc<DecodedImage>) -> Option<StageOutput> {
        let id = &self.settings.nsfl_model_id;
        if !self.settings.nsfl_enabled || !self.registry.is_loaded(id) {
            return None;
        }

        match self.run_stage(id, image).await {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(model_id = %id, "NSFL stage failed, skipping: {}", e);
                None
            }
        }
    }

    async fn run_ensemble(&self, image: &Arc<DecodedImage>) -> Option<EnsembleResult> {
        if !self.settings.ensemble_enabled {
            return None;
        }
        Some(
            self.ensemble
                .classify_decoded(image, ModelTask::NsfwDetection, self.settings.ensemble_method)
                .await,
        )
    }
}
