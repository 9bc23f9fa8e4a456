//! Configuration for perceptual hashing

use crate::hash::PDQ_BITS;
use mediascan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the perceptual hash engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingSettings {
    pub enable_phash: bool,
    pub enable_pdq: bool,
    /// Only takes effect when a PhotoDNA client is attached
    pub enable_photodna: bool,

    /// Inclusive bound for known-database searches, applied to every hash type
    pub hamming_distance_threshold: u32,
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            enable_phash: true,
            enable_pdq: true,
            enable_photodna: true,
            hamming_distance_threshold: 10,
        }
    }
}

impl HashingSettings {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::configuration(format!("Invalid hashing settings: {}", e)))?;
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

    pub fn validate(&self) -> Result<()> {
        if self.hamming_distance_threshold > PDQ_BITS {
            return Err(Error::validation(format!(
                "hamming_distance_threshold must be at most {}, got {}",
                PDQ_BITS, self.hamming_distance_threshold
            )));
        }
        Ok(())
    }
}
