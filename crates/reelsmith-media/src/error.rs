//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use reelsmith_models::{ErrorKind, RequestError};

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during composition.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    /// Missing, empty or unreadable media, or probe tool failure.
    #[error("Media probe failed for {path}: {reason}")]
    MediaProbe { path: PathBuf, reason: String },

    /// Transcoder exited non-zero; `stderr_tail` holds its last diagnostic lines.
    #[error("FFmpeg command failed: {message}{}", format_tail(.stderr_tail))]
    Transcode {
        message: String,
        stderr_tail: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Malformed speech alignment: {0}")]
    AlignmentParse(String),

    #[error("Caption style compile failed: {0}")]
    StyleCompile(String),

    #[error("Invalid composition request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: &'static str, secs: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

fn format_tail(tail: &Option<String>) -> String {
    match tail {
        Some(t) if !t.is_empty() => format!(" | stderr: {}", t),
        _ => String::new(),
    }
}

impl MediaError {
    /// Create a probe failure error.
    pub fn probe_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MediaProbe {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a transcoder failure error.
    pub fn transcode_failed(
        message: impl Into<String>,
        stderr_tail: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Transcode {
            message: message.into(),
            stderr_tail,
            exit_code,
        }
    }

    pub fn alignment(message: impl Into<String>) -> Self {
        Self::AlignmentParse(message.into())
    }

    pub fn style(message: impl Into<String>) -> Self {
        Self::StyleCompile(message.into())
    }

    /// Classification reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::FfprobeNotFound | MediaError::MediaProbe { .. } => ErrorKind::MediaProbe,
            MediaError::Timeout { tool, .. } if *tool == "ffprobe" => ErrorKind::MediaProbe,
            MediaError::FfmpegNotFound
            | MediaError::Transcode { .. }
            | MediaError::Timeout { .. }
            | MediaError::Cancelled => ErrorKind::Transcode,
            MediaError::AlignmentParse(_) => ErrorKind::AlignmentParse,
            MediaError::StyleCompile(_) => ErrorKind::StyleCompile,
            MediaError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            MediaError::Io(_) | MediaError::JsonParse(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            MediaError::probe_failed("/x.mp4", "missing").kind(),
            ErrorKind::MediaProbe
        );
        assert_eq!(
            MediaError::Timeout { tool: "ffprobe", secs: 5 }.kind(),
            ErrorKind::MediaProbe
        );
        assert_eq!(
            MediaError::Timeout { tool: "ffmpeg", secs: 5 }.kind(),
            ErrorKind::Transcode
        );
        assert_eq!(MediaError::alignment("x").kind(), ErrorKind::AlignmentParse);
        assert_eq!(MediaError::style("x").kind(), ErrorKind::StyleCompile);
    }

    #[test]
    fn test_transcode_message_includes_tail() {
        let err = MediaError::transcode_failed(
            "FFmpeg exited with non-zero status",
            Some("Invalid data found when processing input".to_string()),
            Some(1),
        );
        let msg = err.to_string();
        assert!(msg.contains("non-zero status"));
        assert!(msg.contains("Invalid data found"));
    }
}
