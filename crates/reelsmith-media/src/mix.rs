//! Voice and music mixing plans.
//!
//! The mixer never renders on its own; it produces filter graph fragments the
//! final transcode consumes. Gains are static: no ducking or sidechain.

use reelsmith_models::MixSettings;

/// Output label of the mixed audio stream.
pub const MIX_OUTPUT_LABEL: &str = "aout";

/// Filter instructions for the audio side of the final transcode.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMixPlan {
    /// `-filter_complex` fragment ending in `[aout]`.
    pub filter: String,
    /// Label to `-map`, including brackets.
    pub output: String,
    pub has_music: bool,
}

/// Plan the audio mix.
///
/// `voice_input` and `music_input` are `-i` indices. Music is scaled and summed
/// with the voice for the voice's duration only; a shorter music bed is not
/// looped.
pub fn plan_audio_mix(voice_input: usize, music_input: Option<usize>, mix: &MixSettings) -> AudioMixPlan {
    let filter = match music_input {
        Some(music) => format!(
            "[{voice}:a]volume={vg:.3}[voice];[{music}:a]volume={mg:.3}[music];\
             [voice][music]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[{out}]",
            voice = voice_input,
            music = music,
            vg = mix.voice_gain,
            mg = mix.music_gain,
            out = MIX_OUTPUT_LABEL,
        ),
        None => format!(
            "[{voice}:a]volume={vg:.3}[{out}]",
            voice = voice_input,
            vg = mix.voice_gain,
            out = MIX_OUTPUT_LABEL,
        ),
    };

    AudioMixPlan {
        filter,
        output: format!("[{}]", MIX_OUTPUT_LABEL),
        has_music: music_input.is_some(),
    }
}
