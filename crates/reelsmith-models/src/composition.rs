//! Composition request and result definitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::caption::find_timing_violation;
use crate::{CaptionSettings, CharacterAlignment, EncodingConfig, WordTiming};

/// Default voice gain multiplier.
pub const DEFAULT_VOICE_GAIN: f64 = 1.0;
/// Default music gain multiplier.
pub const DEFAULT_MUSIC_GAIN: f64 = 0.2;
/// Default number of words per caption chunk.
pub const DEFAULT_WORDS_PER_CHUNK: usize = 2;
/// Default padding added to the voice duration when looping the background.
pub const DEFAULT_NORMALIZE_BUFFER_SECS: f64 = 2.0;

/// Identifier of the project a composition belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem/key safe form of the id.
    pub fn sanitized(&self) -> String {
        let cleaned: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() {
            "project".to_string()
        } else {
            cleaned
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one composition call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new random request ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight alphanumeric characters, for file names and keys.
    pub fn short(&self) -> String {
        self.0
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static gains applied when mixing voice and music.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MixSettings {
    #[serde(default = "default_voice_gain")]
    pub voice_gain: f64,
    #[serde(default = "default_music_gain")]
    pub music_gain: f64,
}

fn default_voice_gain() -> f64 {
    DEFAULT_VOICE_GAIN
}
fn default_music_gain() -> f64 {
    DEFAULT_MUSIC_GAIN
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            voice_gain: DEFAULT_VOICE_GAIN,
            music_gain: DEFAULT_MUSIC_GAIN,
        }
    }
}

/// Where caption timing comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaptionSource {
    /// No captions are burned in.
    #[default]
    None,
    /// Word timings supplied directly by the caller.
    WordTimings { words: Vec<WordTiming> },
    /// Raw per-character alignment from the synthesis service.
    Alignment { alignment: CharacterAlignment },
    /// Script lines only; timing is estimated from the speaking rate.
    Script { lines: Vec<String> },
}

impl CaptionSource {
    pub fn is_none(&self) -> bool {
        matches!(self, CaptionSource::None)
    }
}

/// Text to synthesize into the voice track before composing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Narration {
    pub text: String,
    pub voice_id: String,
}

/// Everything needed for one composition call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompositionRequest {
    #[serde(default)]
    pub request_id: RequestId,

    pub project_id: ProjectId,

    /// Looping background clip.
    pub background_video: PathBuf,

    /// Narrated voice track; its duration sizes the output.
    pub voice_audio: PathBuf,

    #[serde(default)]
    pub music_audio: Option<PathBuf>,

    /// When set, the voice track is synthesized from this text first.
    #[serde(default)]
    pub narration: Option<Narration>,

    #[serde(default)]
    pub captions: CaptionSource,

    #[serde(default)]
    pub caption_settings: CaptionSettings,

    #[serde(default)]
    pub mix: MixSettings,

    #[serde(default = "default_words_per_chunk")]
    pub words_per_chunk: usize,

    /// Seconds added to the voice duration when looping the background.
    #[serde(default = "default_normalize_buffer")]
    pub normalize_buffer_secs: f64,

    /// Explicit destination for the final render.
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    #[serde(default)]
    pub encoding: EncodingConfig,
}

fn default_words_per_chunk() -> usize {
    DEFAULT_WORDS_PER_CHUNK
}
fn default_normalize_buffer() -> f64 {
    DEFAULT_NORMALIZE_BUFFER_SECS
}

/// Request rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Malformed color in {field}: {value:?} (expected #RRGGBB)")]
    InvalidColor { field: &'static str, value: String },

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl RequestError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl CompositionRequest {
    /// Create a request with default tuning knobs.
    pub fn new(
        project_id: ProjectId,
        background_video: impl Into<PathBuf>,
        voice_audio: impl Into<PathBuf>,
    ) -> Self {
        Self {
            request_id: RequestId::new(),
            project_id,
            background_video: background_video.into(),
            voice_audio: voice_audio.into(),
            music_audio: None,
            narration: None,
            captions: CaptionSource::None,
            caption_settings: CaptionSettings::default(),
            mix: MixSettings::default(),
            words_per_chunk: DEFAULT_WORDS_PER_CHUNK,
            normalize_buffer_secs: DEFAULT_NORMALIZE_BUFFER_SECS,
            output_path: None,
            encoding: EncodingConfig::default(),
        }
    }

    pub fn with_music(mut self, path: impl Into<PathBuf>) -> Self {
        self.music_audio = Some(path.into());
        self
    }

    pub fn with_captions(mut self, captions: CaptionSource) -> Self {
        self.captions = captions;
        self
    }

    pub fn with_caption_settings(mut self, settings: CaptionSettings) -> Self {
        self.caption_settings = settings;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Validate tuning knobs and caption colors.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.project_id.as_str().trim().is_empty() {
            return Err(RequestError::invalid("project_id", "must not be empty"));
        }
        if self.words_per_chunk == 0 {
            return Err(RequestError::invalid("words_per_chunk", "must be at least 1"));
        }
        if !self.normalize_buffer_secs.is_finite() || self.normalize_buffer_secs < 0.0 {
            return Err(RequestError::invalid(
                "normalize_buffer_secs",
                format!("must be a non-negative number, got {}", self.normalize_buffer_secs),
            ));
        }
        for (field, gain) in [
            ("voice_gain", self.mix.voice_gain),
            ("music_gain", self.mix.music_gain),
        ] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(RequestError::invalid(
                    field,
                    format!("must be a non-negative number, got {}", gain),
                ));
            }
        }
        if let CaptionSource::WordTimings { words } = &self.captions {
            if let Some(reason) = find_timing_violation(words) {
                return Err(RequestError::invalid("captions.words", reason));
            }
        }
        if let Some((field, value)) = self.caption_settings.invalid_color() {
            return Err(RequestError::InvalidColor {
                field,
                value: value.to_string(),
            });
        }
        Ok(())
    }

    /// File name of the final render, unique per request.
    pub fn output_file_name(&self, at: DateTime<Utc>) -> String {
        format!("{}-{}.mp4", at.timestamp_millis(), self.request_id.short())
    }
}

/// Linear stages of a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompositionStage {
    /// Optional narration synthesis ahead of the render.
    SynthesizeVoice,
    ValidateInputs,
    ProbeVoice,
    NormalizeVideo,
    BuildCaptions,
    CompileStyle,
    Transcode,
    VerifyOutput,
    Upload,
}

impl CompositionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionStage::SynthesizeVoice => "synthesize_voice",
            CompositionStage::ValidateInputs => "validate_inputs",
            CompositionStage::ProbeVoice => "probe_voice",
            CompositionStage::NormalizeVideo => "normalize_video",
            CompositionStage::BuildCaptions => "build_captions",
            CompositionStage::CompileStyle => "compile_style",
            CompositionStage::Transcode => "transcode",
            CompositionStage::VerifyOutput => "verify_output",
            CompositionStage::Upload => "upload",
        }
    }
}

impl fmt::Display for CompositionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of a failure reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MediaProbe,
    Transcode,
    AlignmentParse,
    StyleCompile,
    Upload,
    /// Speech synthesis service unreachable or rejected the call.
    Speech,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MediaProbe => "media_probe",
            ErrorKind::Transcode => "transcode",
            ErrorKind::AlignmentParse => "alignment_parse",
            ErrorKind::StyleCompile => "style_compile",
            ErrorKind::Upload => "upload",
            ErrorKind::Speech => "speech",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Location of an uploaded render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UploadInfo {
    pub key: String,
    pub url: String,
}

/// Outcome of one composition call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompositionResult {
    pub request_id: RequestId,
    pub project_id: ProjectId,
    pub success: bool,
    pub output_path: Option<PathBuf>,
    /// Probed duration of the render in seconds (0 on failure).
    pub duration: f64,
    pub caption_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<CompositionStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadInfo>,
    /// Set when the render succeeded but the upload did not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_error: Option<String>,
}

impl CompositionResult {
    pub fn succeeded(
        request: &CompositionRequest,
        output_path: PathBuf,
        duration: f64,
        caption_count: usize,
    ) -> Self {
        Self {
            request_id: request.request_id.clone(),
            project_id: request.project_id.clone(),
            success: true,
            output_path: Some(output_path),
            duration,
            caption_count,
            error: None,
            error_kind: None,
            failed_stage: None,
            upload: None,
            upload_error: None,
        }
    }

    pub fn failed(
        request: &CompositionRequest,
        stage: CompositionStage,
        kind: ErrorKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request.request_id.clone(),
            project_id: request.project_id.clone(),
            success: false,
            output_path: None,
            duration: 0.0,
            caption_count: 0,
            error: Some(error.into()),
            error_kind: Some(kind),
            failed_stage: Some(stage),
            upload: None,
            upload_error: None,
        }
    }

    pub fn with_upload(mut self, upload: UploadInfo) -> Self {
        self.upload = Some(upload);
        self.upload_error = None;
        self
    }

    /// Attach an upload failure without touching the render outcome.
    pub fn with_upload_error(mut self, error: impl Into<String>) -> Self {
        self.upload = None;
        self.upload_error = Some(error.into());
        self
    }
}
