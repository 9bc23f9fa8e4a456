//! Classification result types

use crate::ensemble::EnsembleResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary classification of a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Safe,
    Suggestive,
    ExplicitSexual,
    ViolenceMild,
    ViolenceGraphic,
    Drugs,
    CsamSuspect,
}

impl ContentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Suggestive => "suggestive",
            Self::ExplicitSexual => "explicit_sexual",
            Self::ViolenceMild => "violence_mild",
            Self::ViolenceGraphic => "violence_graphic",
            Self::Drugs => "drugs",
            Self::CsamSuspect => "csam_suspect",
        }
    }
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One category score from one model invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationScore {
    pub category: String,
    /// 0.0-1.0
    pub score: f32,
    pub model_name: String,
    pub model_version: String,
}

impl ClassificationScore {
    pub fn new(
        category: impl Into<String>,
        score: f32,
        model_name: impl Into<String>,
        model_version: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            score: mediascan_core::clamp_unit(score),
            model_name: model_name.into(),
            model_version: model_version.into(),
        }
    }
}

/// Apparent age of the most prominent face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeEstimation {
    pub estimated_age: f32,
    pub age_range_low: f32,
    pub age_range_high: f32,
    pub confidence: f32,
    pub is_minor_likely: bool,
}

/// Complete result of classifying one piece of content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub sha256: String,
    pub primary_classification: ContentCategory,
    pub nsfw_score: f32,
    pub nsfl_score: f32,
    pub csam_score: f32,
    pub age_estimation: Option<AgeEstimation>,
    pub all_scores: Vec<ClassificationScore>,
    pub processing_time_ms: u64,
    pub requires_human_review: bool,
    /// Ensemble agreement, 1.0 when no ensemble ran
    pub model_agreement: f32,
    /// Informational only; does not affect review routing
    pub low_model_agreement: bool,
    pub ensemble: Option<EnsembleResult>,
    pub classified_at: DateTime<Utc>,
}

impl ClassificationResult {
    /// Score reported for `category`, by any model
    pub fn score_for(&self, category: &str) -> Option<f32> {
        self.all_scores
            .iter()
            .find(|s| s.category == category)
            .map(|s| s.score)
    }
}
