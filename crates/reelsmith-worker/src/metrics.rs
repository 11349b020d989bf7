//! Composition metrics.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! these calls are no-ops.

use metrics::{counter, histogram};

use reelsmith_models::CompositionResult;

/// Metric name constants for consistency.
pub mod names {
    /// Finished compositions by outcome and failed stage.
    pub const COMPOSITIONS_TOTAL: &str = "reelsmith_compositions_total";

    /// Wall time of a composition in seconds.
    pub const COMPOSITION_SECONDS: &str = "reelsmith_composition_seconds";

    /// Uploads by outcome.
    pub const UPLOADS_TOTAL: &str = "reelsmith_uploads_total";
}

/// Label value for a result's outcome.
pub fn outcome(result: &CompositionResult) -> &'static str {
    if result.success {
        "success"
    } else {
        "failure"
    }
}

/// Record a finished composition and, when attempted, its upload.
pub fn record_composition(result: &CompositionResult, elapsed_secs: f64) {
    let stage = result
        .failed_stage
        .map(|s| s.as_str())
        .unwrap_or("none");

    counter!(
        names::COMPOSITIONS_TOTAL,
        "outcome" => outcome(result),
        "failed_stage" => stage
    )
    .increment(1);

    histogram!(names::COMPOSITION_SECONDS, "outcome" => outcome(result)).record(elapsed_secs);

    if result.upload.is_some() {
        counter!(names::UPLOADS_TOTAL, "outcome" => "success").increment(1);
    } else if result.upload_error.is_some() {
        counter!(names::UPLOADS_TOTAL, "outcome" => "failure").increment(1);
    }
}
