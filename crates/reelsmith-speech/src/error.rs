//! Speech client errors.

use thiserror::Error;

use reelsmith_models::ErrorKind;

pub type SpeechResult<T> = Result<T, SpeechError>;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Speech API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed speech response: {0}")]
    InvalidResponse(String),

    #[error("Audio payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpeechError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Classification reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpeechError::InvalidResponse(_) | SpeechError::Decode(_) => ErrorKind::AlignmentParse,
            SpeechError::Config(_) | SpeechError::Http(_) | SpeechError::Api { .. } => {
                ErrorKind::Speech
            }
            SpeechError::Io(_) => ErrorKind::Internal,
        }
    }
}
