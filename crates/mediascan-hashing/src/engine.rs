//! Perceptual hash engine
//!
//! Computes every enabled hash for a piece of content and looks the results
//! up in known-hash databases. Hash computation never fails as a whole: each
//! algorithm succeeds or records its own error in the [`HashResult`].

use crate::config::HashingSettings;
use crate::hash::{HashResult, HashType, HashValue, IndexMatch, SimilarityMatch, PHOTODNA_LEN};
use crate::hasher::{ComputedHash, ImageHasher};
use crate::index::HashIndex;
use crate::pdq::PdqHasher;
use crate::phash::PHasher;
use crate::photodna::PhotoDnaClient;
use crate::stats::HashingStats;
use mediascan_core::metrics as names;
use mediascan_core::{clamp_unit, ContentBuffer, DecodedImage, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Confidence for PhotoDNA hits whose index does not score them
pub const DEFAULT_PHOTODNA_CONFIDENCE: f32 = 0.9;

type Outcome<T> = std::result::Result<T, String>;

/// Computes pHash, PDQ and PhotoDNA hashes and searches them against a
/// [`HashIndex`].
pub struct PerceptualHashEngine {
    settings: HashingSettings,
    index: Arc<dyn HashIndex>,
    photodna: Option<Arc<dyn PhotoDnaClient>>,
    phash: Arc<dyn ImageHasher>,
    pdq: Arc<dyn ImageHasher>,
    stats: HashingStats,
}

impl PerceptualHashEngine {
    pub fn new(settings: HashingSettings, index: Arc<dyn HashIndex>) -> Self {
        Self {
            settings,
            index,
            photodna: None,
            phash: Arc::new(PHasher::new()),
            pdq: Arc::new(PdqHasher::new()),
            stats: HashingStats::new(),
        }
    }

    /// Attach the external PhotoDNA service. Without one, PhotoDNA is skipped
    /// silently even when enabled.
    pub fn with_photodna(mut self, client: Arc<dyn PhotoDnaClient>) -> Self {
        self.photodna = Some(client);
        self
    }

    /// Replace the pHash algorithm
    pub fn with_phash_hasher(mut self, hasher: Arc<dyn ImageHasher>) -> Self {
        self.phash = hasher;
        self
    }

    /// Replace the PDQ algorithm
    pub fn with_pdq_hasher(mut self, hasher: Arc<dyn ImageHasher>) -> Self {
        self.pdq = hasher;
        self
    }

    pub fn settings(&self) -> &HashingSettings {
        &self.settings
    }

    pub fn stats(&self) -> &HashingStats {
        &self.stats
    }

    /// Compute every enabled hash. Pixel hashes run on the blocking pool while
    /// PhotoDNA runs concurrently; a failing algorithm leaves its field empty
    /// and adds one `"<algorithm>: <reason>"` entry to `errors`.
    pub async fn compute_all_hashes(&self, content: &ContentBuffer, sha256: &str) -> HashResult {
        let start = Instant::now();
        let mut result = HashResult::new(sha256);

        let (pixel_hashes, photodna) =
            tokio::join!(self.hash_pixels(content), self.hash_photodna(content));

        for (hash_type, outcome) in pixel_hashes {
            match outcome {
                Ok(computed) => self.store(&mut result, hash_type, computed),
                Err(reason) => self.fail(&mut result, hash_type, reason),
            }
        }

        match photodna {
            Some(Ok(bytes)) => result.photodna_hash = Some(bytes),
            Some(Err(reason)) => self.fail(&mut result, HashType::PhotoDna, reason),
            None => {}
        }

        let elapsed = start.elapsed();
        self.stats.record_hashed(elapsed.as_micros() as u64);

        debug!(
            sha256,
            len = content.len(),
            phash = result.phash.is_some(),
            pdq = result.pdq_hash.is_some(),
            pdq_quality = ?result.pdq_quality,
            photodna = result.photodna_hash.is_some(),
            errors = result.errors.len(),
            latency_ms = elapsed.as_millis() as u64,
            "Computed hashes"
        );

        result
    }

    /// Look up every populated hash within the configured Hamming threshold.
    ///
    /// pHash and PDQ confidence is `1 - distance / bits`; PhotoDNA confidence
    /// comes from the index, falling back to [`DEFAULT_PHOTODNA_CONFIDENCE`].
    pub async fn search_known_databases(&self, hashes: &HashResult) -> Result<Vec<SimilarityMatch>> {
        let max_distance = self.settings.hamming_distance_threshold;
        let mut matches = Vec::new();

        if let Some(phash) = hashes.phash {
            let found = self.index.search_phash(phash, max_distance).await?;
            matches.extend(found.into_iter().map(|m| similarity(hashes, HashType::Phash, m)));
        }

        if let Some(pdq) = &hashes.pdq_hash {
            let found = self.index.search_pdq(pdq, max_distance).await?;
            matches.extend(found.into_iter().map(|m| similarity(hashes, HashType::Pdq, m)));
        }

        if let Some(photodna) = &hashes.photodna_hash {
            let found = self.index.search_photodna(photodna, max_distance).await?;
            matches.extend(found.into_iter().map(|m| similarity(hashes, HashType::PhotoDna, m)));
        }

        for m in &matches {
            metrics::counter!(names::HASH_MATCHES_TOTAL, "hash_type" => m.hash_type.as_str())
                .increment(1);
        }
        self.stats.record_search(matches.len());

        if !matches.is_empty() {
            warn!(
                sha256 = %hashes.sha256,
                matches = matches.len(),
                closest = matches.iter().map(|m| m.distance).min().unwrap_or_default(),
                "Content matched known hash databases"
            );
        }

        Ok(matches)
    }

    async fn hash_pixels(&self, content: &ContentBuffer) -> Vec<(HashType, Outcome<ComputedHash>)> {
        let mut hashers: Vec<(HashType, Arc<dyn ImageHasher>)> = Vec::with_capacity(2);
        if self.settings.enable_phash {
            hashers.push((HashType::Phash, Arc::clone(&self.phash)));
        }
        if self.settings.enable_pdq {
            hashers.push((HashType::Pdq, Arc::clone(&self.pdq)));
        }
        if hashers.is_empty() {
            return Vec::new();
        }

        let image = match DecodedImage::decode_blocking(content.as_bytes()).await {
            Ok(image) => image,
            Err(e) => {
                let reason = e.to_string();
                return hashers.into_iter().map(|(t, _)| (t, Err(reason.clone()))).collect();
            }
        };

        // One task per algorithm; a panic fails only that algorithm
        let tasks: Vec<_> = hashers
            .into_iter()
            .map(|(hash_type, hasher)| {
                let image = Arc::clone(&image);
                let task = tokio::task::spawn_blocking(move || {
                    hasher.compute(&image).map_err(|e| e.to_string())
                });
                (hash_type, task)
            })
            .collect();

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (hash_type, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(format!("hashing task failed: {}", e)),
            };
            outcomes.push((hash_type, outcome));
        }
        outcomes
    }

    async fn hash_photodna(&self, content: &ContentBuffer) -> Option<Outcome<Vec<u8>>> {
        let client = match &self.photodna {
            Some(client) if self.settings.enable_photodna => client,
            _ => return None,
        };

        Some(match client.compute_hash(content.as_bytes()).await {
            Ok(bytes) if bytes.len() == PHOTODNA_LEN => Ok(bytes),
            Ok(bytes) => Err(format!(
                "{} returned {} bytes, expected {}",
                client.name(),
                bytes.len(),
                PHOTODNA_LEN
            )),
            Err(e) => Err(e.to_string()),
        })
    }

    fn store(&self, result: &mut HashResult, expected: HashType, computed: ComputedHash) {
        match computed.value {
            HashValue::Phash(v) if expected == HashType::Phash => result.phash = Some(v),
            HashValue::Pdq(v) if expected == HashType::Pdq => {
                result.pdq_hash = Some(v);
                result.pdq_quality = computed.quality;
            }
            other => self.fail(
                result,
                expected,
                format!("hasher produced a {} hash", other.hash_type()),
            ),
        }
    }

    fn fail(&self, result: &mut HashResult, hash_type: HashType, reason: impl fmt::Display) {
        error!(
            sha256 = %result.sha256,
            algorithm = %hash_type,
            "Hash computation failed: {}", reason
        );
        metrics::counter!(names::HASH_ERRORS_TOTAL, "algorithm" => hash_type.as_str()).increment(1);
        self.stats.record_error(hash_type);
        result.record_error(hash_type, reason);
    }
}

fn similarity(hashes: &HashResult, hash_type: HashType, m: IndexMatch) -> SimilarityMatch {
    let confidence = match hash_type {
        HashType::PhotoDna => m.confidence.unwrap_or(DEFAULT_PHOTODNA_CONFIDENCE),
        _ => 1.0 - m.distance as f32 / hash_type.bit_length() as f32,
    };

    SimilarityMatch {
        sha256: hashes.sha256.clone(),
        hash_type,
        distance: m.distance,
        matched_database: m.database,
        classification: m.classification,
        confidence: clamp_unit(confidence),
    }
}
