//! Structured composition logging.
//!
//! Gives every request the same lifecycle events with its request and
//! project ids attached.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn, Span};

use reelsmith_media::{FfmpegProgress, ProgressObserver};
use reelsmith_models::{CompositionRequest, CompositionResult, CompositionStage};

/// Per-request lifecycle logger.
#[derive(Debug, Clone)]
pub struct CompositionLogger {
    request_id: String,
    project_id: String,
}

impl CompositionLogger {
    pub fn new(request: &CompositionRequest) -> Self {
        Self {
            request_id: request.request_id.to_string(),
            project_id: request.project_id.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            project_id = %self.project_id,
            "Composition started: {}", message
        );
    }

    pub fn log_stage(&self, stage: CompositionStage, message: &str) {
        info!(
            request_id = %self.request_id,
            project_id = %self.project_id,
            stage = %stage,
            "{}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            request_id = %self.request_id,
            project_id = %self.project_id,
            "Composition warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            request_id = %self.request_id,
            project_id = %self.project_id,
            "Composition error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            request_id = %self.request_id,
            project_id = %self.project_id,
            "Composition completed: {}", message
        );
    }

    /// Log the outcome carried by a result.
    pub fn log_result(&self, result: &CompositionResult) {
        if result.success {
            let output = result
                .output_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            self.log_completion(&format!("{} ({:.2}s)", output, result.duration));
            if let Some(upload_error) = &result.upload_error {
                self.log_warning(&format!("render kept locally, upload failed: {}", upload_error));
            }
        } else {
            let stage = result
                .failed_stage
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            self.log_error(&format!(
                "failed at {}: {}",
                stage,
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            project_id = %self.project_id
        )
    }
}

/// Transcoder progress as debug events.
pub fn progress_observer() -> ProgressObserver {
    Arc::new(|output: &Path, progress: &FfmpegProgress, target: Option<f64>| {
        debug!(
            output = %output.display(),
            out_time_ms = progress.out_time_ms,
            speed = progress.speed,
            percent = target.map(|t| progress.percentage(t)),
            eta_secs = target.and_then(|t| progress.eta_seconds(t)),
            complete = progress.is_complete,
            "Transcode progress"
        );
    })
}
