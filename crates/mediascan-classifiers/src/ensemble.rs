//! Multi-model ensemble classification
//!
//! Every enabled, loaded model for a task runs concurrently on the same
//! decoded image. Each model's output is mapped onto its labels, normalized
//! into the canonical taxonomy, and the survivors are aggregated. A failing
//! model is logged and left out; it never aborts the others.

use crate::descriptor::{ModelDescriptor, ModelTask};
use crate::preprocessing::PreprocessingAdapter;
use crate::registry::ModelRegistry;
use crate::taxonomy::normalize_scores;
use futures::future::join_all;
use mediascan_core::{clamp_unit, DecodedImage, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// How per-model scores are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    #[default]
    WeightedAverage,
    MajorityVote,
    MaxConfidence,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightedAverage => "weighted_average",
            Self::MajorityVote => "majority_vote",
            Self::MaxConfidence => "max_confidence",
        }
    }
}

impl FromStr for AggregationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "weighted_average" => Ok(Self::WeightedAverage),
            "majority_vote" => Ok(Self::MajorityVote),
            "max_confidence" => Ok(Self::MaxConfidence),
            other => Err(Error::validation(format!(
                "Unknown aggregation method: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One model's contribution to an ensemble decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelContribution {
    pub model_id: String,
    pub model_version: String,
    pub raw_scores: BTreeMap<String, f32>,
    pub normalized_scores: BTreeMap<String, f32>,
    pub weight: f32,
}

/// Aggregated ensemble output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub task: ModelTask,
    pub final_scores: BTreeMap<String, f32>,
    /// Successful models, in registration order
    pub model_results: Vec<ModelContribution>,
    /// 0.0-1.0, how consistently the models agree
    pub agreement_score: f32,
    pub method: AggregationMethod,
}

impl EnsembleResult {
    fn empty(task: ModelTask, method: AggregationMethod, agreement_score: f32) -> Self {
        Self {
            task,
            final_scores: BTreeMap::new(),
            model_results: Vec::new(),
            agreement_score,
            method,
        }
    }

    /// Highest-scoring final category
    pub fn top_category(&self) -> Option<(&str, f32)> {
        top_category(&self.final_scores).map(|(c, s)| (c.as_str(), s))
    }

    pub fn is_low_agreement(&self, threshold: f32) -> bool {
        self.agreement_score < threshold
    }
}

/// Highest score in a map; ties go to the lexicographically smallest key
pub fn top_category(scores: &BTreeMap<String, f32>) -> Option<(&String, f32)> {
    let mut best: Option<(&String, f32)> = None;
    for (category, &score) in scores {
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((category, score)),
        }
    }
    best
}

/// Runs several models for one task and aggregates their opinions
pub struct EnsembleClassifier {
    registry: Arc<ModelRegistry>,
}

impl EnsembleClassifier {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Decode `content` and classify it with every applicable model
    pub async fn classify_ensemble(
        &self,
        content: &[u8],
        task: ModelTask,
        method: AggregationMethod,
    ) -> Result<EnsembleResult> {
        let image = DecodedImage::decode_blocking(content).await?;
        Ok(self.classify_decoded(&image, task, method).await)
    }

    /// Classify an already-decoded image. Never fails; see the module docs.
    pub async fn classify_decoded(
        &self,
        image: &Arc<DecodedImage>,
        task: ModelTask,
        method: AggregationMethod,
    ) -> EnsembleResult {
        let models: Vec<ModelDescriptor> = self
            .registry
            .get_models_for_task(task)
            .into_iter()
            .filter(|m| m.loaded)
            .collect();

        if models.is_empty() {
            debug!(task = %task, "No loaded models for ensemble");
            return EnsembleResult::empty(task, method, 1.0);
        }

        let futures = models.iter().map(|model| self.run_model(model, image));
        let outcomes = join_all(futures).await;

        let mut contributions = Vec::with_capacity(models.len());
        for (model, outcome) in models.iter().zip(outcomes) {
            match outcome {
                Ok(contribution) => contributions.push(contribution),
                Err(e) => warn!(model_id = %model.id, task = %task, "Ensemble member failed: {}", e),
            }
        }

        if contributions.is_empty() {
            warn!(task = %task, attempted = models.len(), "Every ensemble member failed");
            return EnsembleResult::empty(task, method, 0.0);
        }

        let final_scores = match method {
            AggregationMethod::WeightedAverage => weighted_average(&contributions),
            AggregationMethod::MajorityVote => majority_vote(&contributions),
            AggregationMethod::MaxConfidence => max_confidence(&contributions),
        };
        let agreement_score = compute_agreement(&contributions);

        debug!(
            task = %task,
            method = %method,
            models = contributions.len(),
            agreement = agreement_score,
            "Ensemble complete"
        );

        EnsembleResult {
            task,
            final_scores,
            model_results: contributions,
            agreement_score,
            method,
        }
    }

    async fn run_model(
        &self,
        model: &ModelDescriptor,
        image: &Arc<DecodedImage>,
    ) -> Result<ModelContribution> {
        let input =
            PreprocessingAdapter::preprocess_blocking(image, model.input_size, model.preprocessing)
                .await?;
        let output = self.registry.predict(&model.id, &input).await?;

        if output.len() != model.categories.len() {
            debug!(
                model_id = %model.id,
                outputs = output.len(),
                labels = model.categories.len(),
                "Output length differs from label count"
            );
        }

        let raw_scores = model.label_scores(&output);
        let normalized_scores = normalize_scores(&model.id, &raw_scores);

        Ok(ModelContribution {
            model_id: model.id.clone(),
            model_version: model.version.clone(),
            raw_scores,
            normalized_scores,
            weight: model.weight,
        })
    }
}

/// Weighted mean per category.
///
/// The denominator is the weight of every contributing model, including those
/// that did not report the category.
pub fn weighted_average(contributions: &[ModelContribution]) -> BTreeMap<String, f32> {
    let total_weight: f32 = contributions.iter().map(|c| c.weight).sum();
    let mut sums: BTreeMap<String, f32> = BTreeMap::new();

    for contribution in contributions {
        for (category, score) in &contribution.normalized_scores {
            *sums.entry(category.clone()).or_insert(0.0) += score * contribution.weight;
        }
    }

    if total_weight <= 0.0 {
        return sums.into_keys().map(|c| (c, 0.0)).collect();
    }

    sums.into_iter()
        .map(|(category, sum)| (category, clamp_unit(sum / total_weight)))
        .collect()
}

/// Each model votes for its top category; score = votes / models
pub fn majority_vote(contributions: &[ModelContribution]) -> BTreeMap<String, f32> {
    let mut votes: BTreeMap<String, u32> = BTreeMap::new();
    for contribution in contributions {
        if let Some((category, _)) = top_category(&contribution.normalized_scores) {
            *votes.entry(category.clone()).or_insert(0) += 1;
        }
    }

    let total = contributions.len() as f32;
    votes
        .into_iter()
        .map(|(category, count)| (category, count as f32 / total))
        .collect()
}

/// The full vector of the single most confident model
pub fn max_confidence(contributions: &[ModelContribution]) -> BTreeMap<String, f32> {
    let mut best: Option<(&ModelContribution, f32)> = None;
    for contribution in contributions {
        let Some((_, top)) = top_category(&contribution.normalized_scores) else {
            continue;
        };
        match best {
            Some((_, best_top)) if top <= best_top => {}
            _ => best = Some((contribution, top)),
        }
    }

    best.map(|(c, _)| c.normalized_scores.clone())
        .unwrap_or_default()
}

/// Agreement between successful models, 0.0-1.0
pub fn compute_agreement(contributions: &[ModelContribution]) -> f32 {
    if contributions.len() <= 1 {
        return 1.0;
    }

    let tops: Vec<(&String, f32)> = contributions
        .iter()
        .filter_map(|c| top_category(&c.normalized_scores))
        .collect();
    if tops.is_empty() {
        return 0.0;
    }

    let first = tops[0].0;
    if tops.len() == contributions.len() && tops.iter().all(|(c, _)| *c == first) {
        let n = tops.len() as f32;
        let mean = tops.iter().map(|(_, s)| s).sum::<f32>() / n;
        let variance = tops.iter().map(|(_, s)| (s - mean).powi(2)).sum::<f32>() / n;
        return clamp_unit(1.0 - variance.sqrt());
    }

    let mut counts: BTreeMap<&String, usize> = BTreeMap::new();
    for (category, _) in &tops {
        *counts.entry(*category).or_insert(0) += 1;
    }
    let most_common = counts.values().copied().max().unwrap_or(0);

    most_common as f32 / contributions.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(id: &str, weight: f32, scores: &[(&str, f32)]) -> ModelContribution {
        let scores: BTreeMap<String, f32> =
            scores.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        ModelContribution {
            model_id: id.to_string(),
            model_version: "1".to_string(),
            raw_scores: scores.clone(),
            normalized_scores: scores,
            weight,
        }
    }

    #[test]
    fn test_weighted_average_dilutes_with_absent_categories() {
        let results = vec![
            contribution("a", 0.6, &[("explicit", 0.8)]),
            contribution("b", 0.4, &[("safe", 0.9)]),
        ];
        let scores = weighted_average(&results);

        // (0.8*0.6 + 0*0.4) / (0.6 + 0.4)
        assert!((scores["explicit"] - 0.48).abs() < 1e-6);
        assert!((scores["safe"] - 0.36).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_average_zero_weights() {
        let results = vec![contribution("a", 0.0, &[("safe", 0.9)])];
        assert_eq!(weighted_average(&results)["safe"], 0.0);
    }

    #[test]
    fn test_majority_vote() {
        let results = vec![
            contribution("a", 0.3, &[("explicit", 0.9), ("safe", 0.1)]),
            contribution("b", 0.3, &[("explicit", 0.6), ("safe", 0.4)]),
            contribution("c", 0.3, &[("explicit", 0.2), ("safe", 0.8)]),
        ];
        let scores = majority_vote(&results);

        assert!((scores["explicit"] - 2.0 / 3.0).abs() < 1e-6);
        assert!((scores["safe"] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_max_confidence_returns_whole_vector() {
        let results = vec![
            contribution("a", 0.5, &[("explicit", 0.7), ("safe", 0.3)]),
            contribution("b", 0.1, &[("explicit", 0.05), ("safe", 0.95)]),
        ];
        let scores = max_confidence(&results);

        assert_eq!(scores, results[1].normalized_scores);
    }

    #[test]
    fn test_agreement_single_model() {
        let results = vec![contribution("a", 1.0, &[("safe", 0.5)])];
        assert_eq!(compute_agreement(&results), 1.0);
    }

    #[test]
    fn test_agreement_same_top_category() {
        let results = vec![
            contribution("a", 0.5, &[("explicit", 0.9), ("safe", 0.1)]),
            contribution("b", 0.5, &[("explicit", 0.7), ("safe", 0.3)]),
        ];
        // population std of [0.9, 0.7] is 0.1
        assert!((compute_agreement(&results) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_agreement_split_vote() {
        let results = vec![
            contribution("a", 0.3, &[("explicit", 0.9)]),
            contribution("b", 0.3, &[("explicit", 0.8)]),
            contribution("c", 0.3, &[("safe", 0.9)]),
            contribution("d", 0.3, &[("drugs", 0.9)]),
        ];
        assert!((compute_agreement(&results) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_top_category_tie_breaks_by_name() {
        let scores: BTreeMap<String, f32> = [("safe", 0.5), ("drugs", 0.5), ("explicit", 0.1)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let (category, score) = top_category(&scores).unwrap();
        assert_eq!(category, "drugs");
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_aggregation_method_parse() {
        assert_eq!(
            "majority_vote".parse::<AggregationMethod>().unwrap(),
            AggregationMethod::MajorityVote
        );
        assert!("median".parse::<AggregationMethod>().unwrap_err().is_validation());
        assert_eq!(AggregationMethod::default().to_string(), "weighted_average");
    }

    #[test]
    fn test_low_agreement() {
        let result = EnsembleResult {
            task: ModelTask::NsfwDetection,
            final_scores: BTreeMap::new(),
            model_results: Vec::new(),
            agreement_score: 0.5,
            method: AggregationMethod::WeightedAverage,
        };
        assert!(result.is_low_agreement(0.6));
        assert!(!result.is_low_agreement(0.5));
        assert!(result.top_category().is_none());
    }
}
