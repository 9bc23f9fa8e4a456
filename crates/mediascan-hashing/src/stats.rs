//! In-process hashing counters

use crate::hash::HashType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cumulative counters for one [`PerceptualHashEngine`](crate::PerceptualHashEngine).
///
/// Cheap to clone; clones share the same counters.
#[derive(Clone, Default)]
pub struct HashingStats {
    inner: Arc<StatsInner>,
}

#[derive(Default)]
struct StatsInner {
    hashed: AtomicU64,
    hash_latency_us: AtomicU64,
    phash_errors: AtomicU64,
    pdq_errors: AtomicU64,
    photodna_errors: AtomicU64,
    searches: AtomicU64,
    matches: AtomicU64,
}

impl HashingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one `compute_all_hashes` call
    pub fn record_hashed(&self, latency_us: u64) {
        self.inner.hashed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .hash_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
    }

    pub fn record_error(&self, hash_type: HashType) {
        let counter = match hash_type {
            HashType::Phash => &self.inner.phash_errors,
            HashType::Pdq => &self.inner.pdq_errors,
            HashType::PhotoDna => &self.inner.photodna_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one `search_known_databases` call and its match count
    pub fn record_search(&self, matches: usize) {
        self.inner.searches.fetch_add(1, Ordering::Relaxed);
        self.inner
            .matches
            .fetch_add(matches as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hashed: self.inner.hashed.load(Ordering::Relaxed),
            hash_latency_us: self.inner.hash_latency_us.load(Ordering::Relaxed),
            phash_errors: self.inner.phash_errors.load(Ordering::Relaxed),
            pdq_errors: self.inner.pdq_errors.load(Ordering::Relaxed),
            photodna_errors: self.inner.photodna_errors.load(Ordering::Relaxed),
            searches: self.inner.searches.load(Ordering::Relaxed),
            matches: self.inner.matches.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`HashingStats`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub hashed: u64,
    pub hash_latency_us: u64,
    pub phash_errors: u64,
    pub pdq_errors: u64,
    pub photodna_errors: u64,
    pub searches: u64,
    pub matches: u64,
}

impl StatsSnapshot {
    pub fn avg_hash_latency_us(&self) -> u64 {
        if self.hashed == 0 {
            0
        } else {
            self.hash_latency_us / self.hashed
        }
    }

    pub fn total_errors(&self) -> u64 {
        self.phash_errors + self.pdq_errors + self.photodna_errors
    }

    /// Matches per search
    pub fn match_rate(&self) -> f64 {
        if self.searches == 0 {
            0.0
        } else {
            self.matches as f64 / self.searches as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_collection() {
        let stats = HashingStats::new();
        let shared = stats.clone();

        stats.record_hashed(3000);
        shared.record_hashed(1000);
        stats.record_error(HashType::Pdq);
        stats.record_search(3);
        stats.record_search(0);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.hashed, 2);
        assert_eq!(snapshot.avg_hash_latency_us(), 2000);
        assert_eq!(snapshot.pdq_errors, 1);
        assert_eq!(snapshot.total_errors(), 1);
        assert_eq!(snapshot.match_rate(), 1.5);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = HashingStats::new().snapshot();
        assert_eq!(snapshot.avg_hash_latency_us(), 0);
        assert_eq!(snapshot.match_rate(), 0.0);
    }
}
