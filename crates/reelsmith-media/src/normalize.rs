//! Background video length normalization.

use std::path::Path;

use tracing::info;

use reelsmith_models::{EncodingConfig, RequestError};

use crate::command::{FfmpegCommand, Transcoder};
use crate::error::MediaResult;

/// Target length of the looped background.
pub fn normalized_length(voice_duration: f64, buffer_secs: f64) -> f64 {
    voice_duration + buffer_secs.max(0.0)
}

/// Command that repeats `input` indefinitely and cuts it at `target_secs`.
///
/// Audio is dropped; the final mix supplies its own.
pub fn loop_to_length_command(
    input: &Path,
    output: &Path,
    target_secs: f64,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .looped_input(input)
        .map("0:v:0")
        .duration(target_secs)
        .no_audio()
        .video_encoding(encoding)
}

/// Loop or truncate `input` to exactly `target_secs` of video.
///
/// Works for sources both shorter and longer than the target.
pub async fn loop_to_length(
    transcoder: &dyn Transcoder,
    input: &Path,
    output: &Path,
    target_secs: f64,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    if !target_secs.is_finite() || target_secs <= 0.0 {
        return Err(RequestError::invalid(
            "target_duration",
            format!("must be positive, got {}", target_secs),
        )
        .into());
    }

    info!(
        input = %input.display(),
        target_secs,
        "Normalizing background video length"
    );
    let cmd = loop_to_length_command(input, output, target_secs, encoding);
    transcoder.transcode(&cmd).await
}
