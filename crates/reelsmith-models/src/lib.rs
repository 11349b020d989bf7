//! Shared data models for the reelsmith composition engine.
//!
//! This crate provides Serde-serializable types for:
//! - Word timings, caption chunks and caption style settings
//! - Speech-alignment payloads from the synthesis service
//! - Composition requests, results, stages and error kinds
//! - Output encoding configuration

pub mod alignment;
pub mod caption;
pub mod composition;
pub mod encoding;

// Re-export common types
pub use alignment::CharacterAlignment;
pub use caption::{
    find_timing_violation, is_hex_color, CaptionAnimation, CaptionChunk, CaptionPosition,
    CaptionSettings, WordTiming,
};
pub use composition::{
    CaptionSource, CompositionRequest, CompositionResult, CompositionStage, ErrorKind,
    MixSettings, Narration, ProjectId, RequestError, RequestId, UploadInfo,
};
pub use encoding::EncodingConfig;
