#![deny(unreachable_patterns)]
//! FFmpeg-driven composition of short vertical videos.
//!
//! This crate provides:
//! - Duration probing and input checks via `ffprobe`
//! - Alignment-to-word timing extraction and caption chunking
//! - SRT and libass style compilation for caption burn-in
//! - Background loop-to-length normalization and voice/music mix plans
//! - The staged composition orchestrator with request-scoped workspaces

pub mod alignment;
pub mod captions;
pub mod command;
pub mod compose;
pub mod error;
pub mod mix;
pub mod normalize;
pub mod output;
pub mod probe;
pub mod progress;
pub mod subtitles;
pub mod workspace;

pub use alignment::extract_word_timings;
pub use captions::{build_caption_chunks, chunk_word_timings, estimate_line_chunks};
pub use command::{
    check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, ProgressObserver, Transcoder,
};
pub use compose::{Composer, ComposerConfig};
pub use error::{MediaError, MediaResult};
pub use mix::{plan_audio_mix, AudioMixPlan};
pub use normalize::loop_to_length;
pub use probe::{check_media_file, DurationProbe, FfprobeProbe};
pub use progress::FfmpegProgress;
pub use subtitles::{compile_style, compile_subtitles, hex_to_ass_color, CompiledStyle, SubtitleTrack};
pub use workspace::RequestWorkspace;
