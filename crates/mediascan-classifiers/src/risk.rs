//! Composite risk scoring, decision tree, and review routing
//!
//! Everything here is pure: model outputs and thresholds go in, scores and
//! decisions come out.

use crate::classifier::{AgeEstimation, ContentCategory};
use crate::config::ClassificationThresholds;
use mediascan_core::{clamp_unit, Error, Result};
use std::collections::BTreeMap;

/// Scene labels that raise CSAM risk when combined with other signals
pub const RISK_SCENES: [&str; 3] = ["indoor_bedroom", "indoor_bathroom", "indoor_school"];

/// Age below which a face counts as a minor
pub const MINOR_AGE: f32 = 18.0;

/// Scores from the dedicated NSFW model
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NsfwScores {
    pub explicit_sexual: f32,
    pub suggestive: f32,
    pub violence_graphic: f32,
    pub violence_mild: f32,
    pub drugs: f32,
    pub safe: f32,
}

impl NsfwScores {
    /// Pick the known labels out of a score map; missing labels read as 0
    pub fn from_scores(scores: &BTreeMap<String, f32>) -> Self {
        let get = |label: &str| scores.get(label).copied().map(clamp_unit).unwrap_or(0.0);
        Self {
            explicit_sexual: get("explicit_sexual"),
            suggestive: get("suggestive"),
            violence_graphic: get("violence_graphic"),
            violence_mild: get("violence_mild"),
            drugs: get("drugs"),
            safe: get("safe"),
        }
    }

    /// Headline NSFW score
    pub fn nsfw_score(&self) -> f32 {
        self.explicit_sexual.max(self.suggestive)
    }
}

/// Interpret the age model's `[age, confidence, face_detected]` output.
///
/// Returns `None` when no face was detected.
pub fn estimate_age(output: &[f32]) -> Result<Option<AgeEstimation>> {
    let [age, confidence, face_detected] = match output {
        [a, c, f, ..] => [*a, *c, *f],
        _ => {
            return Err(Error::inference(format!(
                "age model returned {} outputs, expected 3",
                output.len()
            )))
        }
    };

    if face_detected < 0.5 {
        return Ok(None);
    }

    let confidence = clamp_unit(confidence);
    let age = age.max(0.0);
    let margin = ((1.0 - confidence) * 10.0).max(2.0);

    Ok(Some(AgeEstimation {
        estimated_age: age,
        age_range_low: (age - margin).max(0.0),
        age_range_high: age + margin,
        confidence,
        is_minor_likely: age < MINOR_AGE && confidence > 0.6,
    }))
}

/// How strongly the content indicates a minor, 0.0-1.0
pub fn minor_score(age: Option<&AgeEstimation>) -> f32 {
    match age {
        Some(a) if a.is_minor_likely => {
            a.confidence * ((MINOR_AGE - a.estimated_age) / MINOR_AGE).max(0.0)
        }
        _ => 0.0,
    }
}

/// Highest score among the high-risk scene labels
pub fn scene_risk(scene_scores: &BTreeMap<String, f32>) -> f32 {
    RISK_SCENES
        .iter()
        .filter_map(|label| scene_scores.get(*label))
        .fold(0.0f32, |acc, &s| acc.max(clamp_unit(s)))
}

/// Composite CSAM risk
pub fn compute_csam_risk(nsfw: &NsfwScores, age: Option<&AgeEstimation>, scene_risk: f32) -> f32 {
    let minor = minor_score(age);
    clamp_unit(
        0.35 * nsfw.explicit_sexual
            + 0.40 * minor
            + 0.15 * scene_risk
            + 0.10 * (nsfw.suggestive * minor),
    )
}

/// Primary classification; first matching rule wins
pub fn determine_classification(
    nsfw: &NsfwScores,
    csam_score: f32,
    thresholds: &ClassificationThresholds,
) -> ContentCategory {
    let t = thresholds.confidence_threshold;

    if csam_score >= thresholds.csam_alert_threshold {
        ContentCategory::CsamSuspect
    } else if nsfw.explicit_sexual > t {
        ContentCategory::ExplicitSexual
    } else if nsfw.violence_graphic > t {
        ContentCategory::ViolenceGraphic
    } else if nsfw.violence_mild > t {
        ContentCategory::ViolenceMild
    } else if nsfw.suggestive > t {
        ContentCategory::Suggestive
    } else if nsfw.drugs > t {
        ContentCategory::Drugs
    } else {
        ContentCategory::Safe
    }
}

/// Whether a human moderator must look at this content
pub fn requires_human_review(
    classification: ContentCategory,
    csam_score: f32,
    age: Option<&AgeEstimation>,
    nsfw_score: f32,
) -> bool {
    let minor_likely = age.map(|a| a.is_minor_likely).unwrap_or(false);

    classification == ContentCategory::CsamSuspect
        || csam_score > 0.5
        || (minor_likely && nsfw_score > 0.3)
}
