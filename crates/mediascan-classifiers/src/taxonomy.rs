//! Canonical category taxonomy and per-model normalization tables
//!
//! Every ensemble member reports in its own label space. Before aggregation
//! each model's scores are projected onto [`CanonicalCategory`] through a
//! static table of `source label -> [(canonical target, weight)]`. A target
//! receives the maximum `score * weight` over every source label feeding it.
//! Models without a table pass their labels through unchanged.

use std::collections::BTreeMap;
use std::fmt;

/// The unified NSFW taxonomy used across the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalCategory {
    ExplicitSexual,
    Suggestive,
    ViolenceGraphic,
    ViolenceMild,
    Drugs,
    Safe,
}

impl CanonicalCategory {
    pub const ALL: [CanonicalCategory; 6] = [
        Self::ExplicitSexual,
        Self::Suggestive,
        Self::ViolenceGraphic,
        Self::ViolenceMild,
        Self::Drugs,
        Self::Safe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitSexual => "explicit_sexual",
            Self::Suggestive => "suggestive",
            Self::ViolenceGraphic => "violence_graphic",
            Self::ViolenceMild => "violence_mild",
            Self::Drugs => "drugs",
            Self::Safe => "safe",
        }
    }
}

impl fmt::Display for CanonicalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Targets = &'static [(CanonicalCategory, f32)];

/// Normalization table for one model
pub struct CategoryMapping {
    pub model_id: &'static str,
    pub entries: &'static [(&'static str, Targets)],
}

impl CategoryMapping {
    pub fn targets(&self, source: &str) -> Targets {
        self.entries
            .iter()
            .find(|(label, _)| *label == source)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }
}

use CanonicalCategory::*;

pub static CATEGORY_MAPPINGS: &[CategoryMapping] = &[
    CategoryMapping {
        model_id: "yahoo_open_nsfw",
        entries: &[
            ("nsfw", &[(ExplicitSexual, 0.7), (Suggestive, 0.3)]),
            ("sfw", &[(Safe, 1.0)]),
        ],
    },
    CategoryMapping {
        model_id: "nudenet_v3",
        entries: &[
            ("female_genitalia_exposed", &[(ExplicitSexual, 1.0)]),
            ("male_genitalia_exposed", &[(ExplicitSexual, 1.0)]),
            ("female_genitalia_covered", &[(Suggestive, 0.8)]),
            ("buttocks_exposed", &[(ExplicitSexual, 0.8), (Suggestive, 0.2)]),
            ("female_breast_exposed", &[(ExplicitSexual, 0.9), (Suggestive, 0.1)]),
            ("female_breast_covered", &[(Suggestive, 1.0)]),
            ("anus_exposed", &[(ExplicitSexual, 1.0)]),
            ("belly_exposed", &[(Suggestive, 0.5), (Safe, 0.5)]),
            ("feet_exposed", &[(Safe, 1.0)]),
            ("armpits_exposed", &[(Safe, 1.0)]),
            ("face_male", &[(Safe, 1.0)]),
            ("face_female", &[(Safe, 1.0)]),
            ("safe", &[(Safe, 1.0)]),
        ],
    },
    CategoryMapping {
        model_id: "clip_safety",
        entries: &[
            (
                "unsafe",
                &[(ExplicitSexual, 0.4), (Suggestive, 0.3), (ViolenceGraphic, 0.3)],
            ),
            ("safe", &[(Safe, 1.0)]),
        ],
    },
];

pub fn mapping_for(model_id: &str) -> Option<&'static CategoryMapping> {
    CATEGORY_MAPPINGS.iter().find(|m| m.model_id == model_id)
}

/// Project a model's raw scores onto the canonical taxonomy.
///
/// With a table present, every canonical category appears in the output
/// (zero when nothing maps to it) and unmapped source labels are dropped.
pub fn normalize_scores(model_id: &str, raw_scores: &BTreeMap<String, f32>) -> BTreeMap<String, f32> {
    let Some(mapping) = mapping_for(model_id) else {
        return raw_scores.clone();
    };

    let mut normalized: BTreeMap<String, f32> = CanonicalCategory::ALL
        .iter()
        .map(|c| (c.as_str().to_string(), 0.0))
        .collect();

    for (category, score) in raw_scores {
        for (target, weight) in mapping.targets(category) {
            let slot = normalized.entry(target.as_str().to_string()).or_insert(0.0);
            *slot = slot.max(score * weight);
        }
    }

    normalized
}
