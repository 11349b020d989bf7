//! Speech synthesis for narrated compositions.
//!
//! The synthesis service returns narration audio together with a
//! per-character alignment, which the media crate turns into word timings.

pub mod elevenlabs;
pub mod error;

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use reelsmith_models::CharacterAlignment;

pub use elevenlabs::{ElevenLabsClient, ElevenLabsConfig};
pub use error::{SpeechError, SpeechResult};

/// Synthesized narration.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Encoded audio (MP3 unless configured otherwise)
    pub audio: Vec<u8>,
    pub alignment: CharacterAlignment,
}

/// A speech service that returns audio with character timing.
#[async_trait]
pub trait AlignmentProvider: Send + Sync {
    async fn get_alignment(&self, text: &str, voice_id: &str) -> SpeechResult<Synthesis>;
}

/// Synthesize `text` into `audio_path` and return its alignment.
pub async fn synthesize_to_file(
    provider: &dyn AlignmentProvider,
    text: &str,
    voice_id: &str,
    audio_path: &Path,
) -> SpeechResult<CharacterAlignment> {
    let synthesis = provider.get_alignment(text, voice_id).await?;

    if let Some(parent) = audio_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(audio_path, &synthesis.audio).await?;
    debug!(path = %audio_path.display(), bytes = synthesis.audio.len(), "Wrote narration audio");

    Ok(synthesis.alignment)
}
