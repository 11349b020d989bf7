//! Worker error types.

use thiserror::Error;

use reelsmith_models::ErrorKind;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Media error: {0}")]
    Media(#[from] reelsmith_media::MediaError),

    #[error("Speech error: {0}")]
    Speech(#[from] reelsmith_speech::SpeechError),

    #[error("Storage error: {0}")]
    Storage(#[from] reelsmith_storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::InvalidRequest(_) | WorkerError::Json(_) => ErrorKind::InvalidRequest,
            WorkerError::Media(e) => e.kind(),
            WorkerError::Speech(e) => e.kind(),
            WorkerError::Storage(e) => e.kind(),
            WorkerError::ConfigError(_) | WorkerError::Io(_) => ErrorKind::Internal,
        }
    }
}
