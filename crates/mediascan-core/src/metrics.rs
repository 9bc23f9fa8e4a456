//! Metric names shared across crates
//!
//! The library only records through the `metrics` facade. Installing an
//! exporter is left to the embedding service.

pub const INFERENCES_TOTAL: &str = "mediascan_inferences_total";
pub const INFERENCE_ERRORS_TOTAL: &str = "mediascan_inference_errors_total";
pub const INFERENCE_LATENCY_MS: &str = "mediascan_inference_latency_ms";
pub const CLASSIFICATIONS_TOTAL: &str = "mediascan_classifications_total";
pub const CLASSIFICATION_LATENCY_MS: &str = "mediascan_classification_latency_ms";
pub const REVIEW_ROUTED_TOTAL: &str = "mediascan_review_routed_total";
pub const HASH_ERRORS_TOTAL: &str = "mediascan_hash_errors_total";
pub const HASH_MATCHES_TOTAL: &str = "mediascan_hash_matches_total";

/// Register descriptions for every metric this engine emits
pub fn describe() {
    metrics::describe_counter!(INFERENCES_TOTAL, "Successful model inferences by model");
    metrics::describe_counter!(
        INFERENCE_ERRORS_TOTAL,
        "Failed model inferences by model"
    );
    metrics::describe_histogram!(
        INFERENCE_LATENCY_MS,
        metrics::Unit::Milliseconds,
        "Model inference latency in milliseconds by model"
    );
    metrics::describe_counter!(
        CLASSIFICATIONS_TOTAL,
        "Completed classifications by primary classification"
    );
    metrics::describe_histogram!(
        CLASSIFICATION_LATENCY_MS,
        metrics::Unit::Milliseconds,
        "End-to-end classification latency in milliseconds"
    );
    metrics::describe_counter!(
        REVIEW_ROUTED_TOTAL,
        "Classifications routed to human review"
    );
    metrics::describe_counter!(HASH_ERRORS_TOTAL, "Hash computation failures by algorithm");
    metrics::describe_counter!(HASH_MATCHES_TOTAL, "Known-database matches by hash type");
}
