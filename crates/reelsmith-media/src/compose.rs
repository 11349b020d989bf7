//! Composition orchestration.
//!
//! Stages run strictly in order, each gating the next:
//! validate inputs, probe voice, normalize video, build captions, compile
//! style, transcode, verify output. The first failure aborts the pipeline and
//! nothing is promoted to the destination. The request workspace is removed
//! on every path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, info_span, warn, Instrument};

use reelsmith_models::encoding::{OUTPUT_HEIGHT, OUTPUT_WIDTH};
use reelsmith_models::{CompositionRequest, CompositionResult, CompositionStage};

use crate::captions::build_caption_chunks;
use crate::command::{FfmpegCommand, Transcoder};
use crate::error::{MediaError, MediaResult};
use crate::mix::plan_audio_mix;
use crate::normalize::{loop_to_length, normalized_length};
use crate::output::promote_output;
use crate::probe::{check_media_file, DurationProbe};
use crate::subtitles::{compile_subtitles, SubtitleTrack};
use crate::workspace::RequestWorkspace;

/// Allowed gap between the verified output and the voice duration before warning.
pub const DEFAULT_VERIFY_TOLERANCE_SECS: f64 = 0.5;

/// Composer settings shared by all requests.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Root for request workspaces and default output locations.
    pub work_dir: PathBuf,
    /// Extra font directory handed to libass.
    pub fonts_dir: Option<PathBuf>,
    pub verify_tolerance_secs: f64,
}

impl ComposerConfig {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            fonts_dir: None,
            verify_tolerance_secs: DEFAULT_VERIFY_TOLERANCE_SECS,
        }
    }

    pub fn with_fonts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fonts_dir = Some(dir.into());
        self
    }

    /// Default destination when a request names none.
    pub fn default_output_path(&self, request: &CompositionRequest) -> PathBuf {
        self.work_dir
            .join(request.project_id.sanitized())
            .join(request.output_file_name(Utc::now()))
    }
}

/// Which stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Full,
    /// Preview path: no caption work, normalization optional.
    MergeOnly { normalize: bool },
}

impl Mode {
    fn normalizes(self) -> bool {
        match self {
            Mode::Full => true,
            Mode::MergeOnly { normalize } => normalize,
        }
    }

    fn captions(self) -> bool {
        matches!(self, Mode::Full)
    }
}

/// A stage error tagged with where it happened.
#[derive(Debug)]
struct StageFailure {
    stage: CompositionStage,
    error: MediaError,
}

trait AtStage<T> {
    fn at(self, stage: CompositionStage) -> Result<T, StageFailure>;
}

impl<T> AtStage<T> for MediaResult<T> {
    fn at(self, stage: CompositionStage) -> Result<T, StageFailure> {
        self.map_err(|error| StageFailure { stage, error })
    }
}

struct Rendered {
    path: PathBuf,
    duration: f64,
    caption_count: usize,
}

/// Runs compositions against a probe and a transcoder.
///
/// Holds no per-request state; one instance can serve concurrent requests.
#[derive(Clone)]
pub struct Composer {
    probe: Arc<dyn DurationProbe>,
    transcoder: Arc<dyn Transcoder>,
    config: ComposerConfig,
}

impl Composer {
    pub fn new(
        probe: Arc<dyn DurationProbe>,
        transcoder: Arc<dyn Transcoder>,
        config: ComposerConfig,
    ) -> Self {
        Self {
            probe,
            transcoder,
            config,
        }
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Full composition: looped background, burned-in captions and mixed audio.
    pub async fn compose(&self, request: &CompositionRequest) -> CompositionResult {
        self.execute(request, Mode::Full).await
    }

    /// Background plus audio only, for fast previews.
    pub async fn merge_only(&self, request: &CompositionRequest, normalize: bool) -> CompositionResult {
        self.execute(request, Mode::MergeOnly { normalize }).await
    }

    async fn execute(&self, request: &CompositionRequest, mode: Mode) -> CompositionResult {
        let span = info_span!(
            "composition",
            request_id = %request.request_id,
            project_id = %request.project_id,
        );

        async {
            let started = Instant::now();
            info!(mode = ?mode, "Composition started");

            match self.run(request, mode).await {
                Ok(rendered) => {
                    info!(
                        output = %rendered.path.display(),
                        duration = rendered.duration,
                        captions = rendered.caption_count,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Composition finished"
                    );
                    CompositionResult::succeeded(
                        request,
                        rendered.path,
                        rendered.duration,
                        rendered.caption_count,
                    )
                }
                Err(StageFailure { stage, error }) => {
                    warn!(
                        stage = %stage,
                        kind = ?error.kind(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Composition failed: {}", error
                    );
                    CompositionResult::failed(request, stage, error.kind(), error.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &CompositionRequest, mode: Mode) -> Result<Rendered, StageFailure> {
        // Nothing is spawned until every input checks out
        self.validate_inputs(request)
            .await
            .at(CompositionStage::ValidateInputs)?;

        let workspace = RequestWorkspace::create(&self.config.work_dir, &request.project_id)
            .await
            .at(CompositionStage::ValidateInputs)?;

        let outcome = self.run_stages(request, mode, &workspace).await;
        workspace.cleanup();
        outcome
    }

    async fn validate_inputs(&self, request: &CompositionRequest) -> MediaResult<()> {
        request.validate()?;

        check_media_file(&request.background_video).await?;
        check_media_file(&request.voice_audio).await?;
        if let Some(music) = &request.music_audio {
            check_media_file(music).await?;
        }
        Ok(())
    }

    async fn run_stages(
        &self,
        request: &CompositionRequest,
        mode: Mode,
        workspace: &RequestWorkspace,
    ) -> Result<Rendered, StageFailure> {
        let (stage, timer) = enter(CompositionStage::ProbeVoice);
        let voice_duration = self.probe.duration(&request.voice_audio).await.at(stage)?;
        info!(stage = %stage, elapsed_ms = elapsed_ms(timer), voice_duration, "Voice probed");

        let (stage, timer) = enter(CompositionStage::NormalizeVideo);
        let background = if mode.normalizes() {
            let target = normalized_length(voice_duration, request.normalize_buffer_secs);
            let normalized = workspace.file("background.mp4");
            loop_to_length(
                self.transcoder.as_ref(),
                &request.background_video,
                &normalized,
                target,
                &request.encoding,
            )
            .await
            .at(stage)?;
            info!(stage = %stage, elapsed_ms = elapsed_ms(timer), target, "Background normalized");
            VideoSource::Normalized(normalized)
        } else {
            debug!(stage = %stage, "Normalization skipped");
            VideoSource::Looped(request.background_video.clone())
        };

        let mut subtitles = None;
        let mut caption_count = 0;
        if mode.captions() {
            let (stage, timer) = enter(CompositionStage::BuildCaptions);
            let chunks = build_caption_chunks(
                &request.captions,
                &request.caption_settings,
                request.words_per_chunk,
                voice_duration,
            )
            .at(stage)?;
            caption_count = chunks.len();
            info!(
                stage = %stage,
                elapsed_ms = elapsed_ms(timer),
                chunks = caption_count,
                "Captions built"
            );

            let (stage, timer) = enter(CompositionStage::CompileStyle);
            if chunks.is_empty() {
                debug!(stage = %stage, "No captions to burn in");
            } else {
                let track = compile_subtitles(&request.caption_settings, &chunks, workspace.path())
                    .await
                    .at(stage)?;
                info!(
                    stage = %stage,
                    elapsed_ms = elapsed_ms(timer),
                    srt = %track.srt_path.display(),
                    "Caption style compiled"
                );
                subtitles = Some(track);
            }
        }

        let (stage, timer) = enter(CompositionStage::Transcode);
        let render = workspace.file("render.mp4");
        let cmd = self.final_command(request, &background, subtitles.as_ref(), voice_duration, &render);
        self.transcoder.transcode(&cmd).await.at(stage)?;
        info!(stage = %stage, elapsed_ms = elapsed_ms(timer), "Final transcode complete");

        let (stage, timer) = enter(CompositionStage::VerifyOutput);
        let duration = self.verify_output(&render, voice_duration).await.at(stage)?;

        let destination = request
            .output_path
            .clone()
            .unwrap_or_else(|| self.config.default_output_path(request));
        promote_output(&render, &destination).await.at(stage)?;
        info!(
            stage = %stage,
            elapsed_ms = elapsed_ms(timer),
            output = %destination.display(),
            duration,
            "Output verified"
        );

        Ok(Rendered {
            path: destination,
            duration,
            caption_count,
        })
    }

    fn final_command(
        &self,
        request: &CompositionRequest,
        background: &VideoSource,
        subtitles: Option<&SubtitleTrack>,
        voice_duration: f64,
        output: &Path,
    ) -> FfmpegCommand {
        // Inputs: 0 = background, 1 = voice, 2 = music
        let cmd = match background {
            VideoSource::Normalized(path) => FfmpegCommand::new(output).input(path),
            VideoSource::Looped(path) => FfmpegCommand::new(output).looped_input(path),
        };
        let cmd = cmd.input(&request.voice_audio);
        let cmd = match &request.music_audio {
            Some(music) => cmd.input(music),
            None => cmd,
        };

        let mut video = format!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
            w = OUTPUT_WIDTH,
            h = OUTPUT_HEIGHT
        );
        if let Some(track) = subtitles {
            video.push(',');
            video.push_str(&track.filter(self.config.fonts_dir.as_deref()));
        }
        video.push_str("[vout]");

        let audio = plan_audio_mix(1, request.music_audio.as_ref().map(|_| 2), &request.mix);

        cmd.filter_complex(format!("{};{}", video, audio.filter))
            .map("[vout]")
            .map(audio.output)
            .encoding(&request.encoding)
            .duration(voice_duration)
            .faststart()
    }

    async fn verify_output(&self, render: &Path, expected: f64) -> MediaResult<f64> {
        check_media_file(render).await?;
        let duration = self.probe.duration(render).await?;

        let drift = (duration - expected).abs();
        if drift > self.config.verify_tolerance_secs {
            warn!(
                expected,
                actual = duration,
                "Output duration differs from voice duration"
            );
        }
        Ok(duration)
    }
}

fn enter(stage: CompositionStage) -> (CompositionStage, Instant) {
    debug!(stage = %stage, "Stage started");
    (stage, Instant::now())
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

enum VideoSource {
    /// Already cut to length by the normalize stage.
    Normalized(PathBuf),
    /// Original clip, repeated during the final transcode.
    Looped(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reelsmith_models::{
        CaptionSettings, CaptionSource, CharacterAlignment, ErrorKind, ProjectId, WordTiming,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Returns fixed durations per path; anything else is the fallback.
    struct FakeProbe {
        durations: HashMap<PathBuf, f64>,
        fallback: f64,
        calls: AtomicUsize,
    }

    impl FakeProbe {
        fn new(fallback: f64) -> Self {
            Self {
                durations: HashMap::new(),
                fallback,
                calls: AtomicUsize::new(0),
            }
        }

        fn with(mut self, path: &Path, duration: f64) -> Self {
            self.durations.insert(path.to_path_buf(), duration);
            self
        }
    }

    #[async_trait]
    impl DurationProbe for FakeProbe {
        async fn duration(&self, path: &Path) -> MediaResult<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            check_media_file(path).await?;
            Ok(self.durations.get(path).copied().unwrap_or(self.fallback))
        }
    }

    /// Records commands and writes a placeholder output.
    #[derive(Default)]
    struct FakeTranscoder {
        commands: Mutex<Vec<FfmpegCommand>>,
        fail_on_call: Option<usize>,
    }

    impl FakeTranscoder {
        fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Default::default()
            }
        }

        fn args(&self) -> Vec<Vec<String>> {
            self.commands
                .lock()
                .unwrap()
                .iter()
                .map(|c| c.build_args())
                .collect()
        }

        fn calls(&self) -> usize {
            self.commands.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
            let call = {
                let mut commands = self.commands.lock().unwrap();
                commands.push(cmd.clone());
                commands.len()
            };
            if self.fail_on_call == Some(call) {
                return Err(MediaError::transcode_failed(
                    "FFmpeg exited with non-zero status",
                    Some("Error initializing filter 'subtitles'".to_string()),
                    Some(1),
                ));
            }
            tokio::fs::write(cmd.output(), b"rendered").await?;
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        background: PathBuf,
        voice: PathBuf,
        music: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let background = dir.path().join("bg.mp4");
            let voice = dir.path().join("voice.mp3");
            let music = dir.path().join("music.mp3");
            for path in [&background, &voice, &music] {
                std::fs::write(path, b"media").unwrap();
            }
            Self {
                dir,
                background,
                voice,
                music,
            }
        }

        fn work_dir(&self) -> PathBuf {
            self.dir.path().join("work")
        }

        fn request(&self) -> CompositionRequest {
            CompositionRequest::new(
                ProjectId::new("demo"),
                self.background.clone(),
                self.voice.clone(),
            )
        }

        fn composer(&self, probe: FakeProbe, transcoder: Arc<FakeTranscoder>) -> Composer {
            Composer::new(
                Arc::new(probe),
                transcoder,
                ComposerConfig::new(self.work_dir()),
            )
        }

        /// Workspaces still present under the work dir.
        fn leftover_workspaces(&self) -> Vec<PathBuf> {
            let Ok(entries) = std::fs::read_dir(self.work_dir()) else {
                return Vec::new();
            };
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().starts_with("reelsmith-"))
                        .unwrap_or(false)
                })
                .collect()
        }
    }

    fn twenty_words() -> Vec<WordTiming> {
        (0..20)
            .map(|i| {
                let start = 0.2 + i as f64 * 0.6;
                WordTiming::new(format!("word{}", i), start, start + 0.5)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_composition() {
        let fx = Fixture::new();
        let transcoder = Arc::new(FakeTranscoder::default());
        let composer = fx.composer(FakeProbe::new(12.4), transcoder.clone());
        let destination = fx.dir.path().join("out").join("final.mp4");

        let request = fx
            .request()
            .with_music(fx.music.clone())
            .with_captions(CaptionSource::WordTimings {
                words: twenty_words(),
            })
            .with_output_path(destination.clone());

        let result = composer.compose(&request).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.caption_count, 10);
        assert_eq!(result.output_path.as_deref(), Some(destination.as_path()));
        assert!(destination.exists());
        assert!((result.duration - 12.4).abs() < 1e-9);

        let args = transcoder.args();
        assert_eq!(args.len(), 2);

        // Normalize: looped background, cut to voice + 2s, no audio
        let normalize = &args[0];
        assert!(normalize.contains(&"-stream_loop".to_string()));
        assert!(normalize.contains(&"14.400".to_string()));
        assert!(normalize.contains(&"-an".to_string()));

        // Final: captions burned in, music mixed, cut to voice length
        let fin = &args[1];
        let graph_pos = fin.iter().position(|a| a == "-filter_complex").unwrap();
        let graph = &fin[graph_pos + 1];
        assert!(graph.contains("subtitles="));
        assert!(graph.contains("crop=1080:1920"));
        assert!(graph.contains("amix=inputs=2:duration=first"));
        assert!(fin.contains(&"12.400".to_string()));
        assert!(!fin.contains(&"-stream_loop".to_string()));

        assert!(fx.leftover_workspaces().is_empty());
    }

    #[tokio::test]
    async fn test_missing_background_fails_before_transcoding() {
        let fx = Fixture::new();
        let transcoder = Arc::new(FakeTranscoder::default());
        let probe = FakeProbe::new(12.4);
        let composer = Composer::new(
            Arc::new(probe),
            transcoder.clone(),
            ComposerConfig::new(fx.work_dir()),
        );

        let mut request = fx.request();
        request.background_video = fx.dir.path().join("nope.mp4");

        let result = composer.compose(&request).await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::MediaProbe));
        assert_eq!(result.failed_stage, Some(CompositionStage::ValidateInputs));
        assert!(result.error.unwrap().contains("nope.mp4"));
        assert_eq!(transcoder.calls(), 0);
        assert!(fx.leftover_workspaces().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_color_rejected_at_boundary() {
        let fx = Fixture::new();
        let transcoder = Arc::new(FakeTranscoder::default());
        let composer = fx.composer(FakeProbe::new(5.0), transcoder.clone());

        let request = fx
            .request()
            .with_caption_settings(CaptionSettings::default().with_colors("#GG0000", "#000000"));
        let result = composer.compose(&request).await;

        assert_eq!(result.error_kind, Some(ErrorKind::InvalidRequest));
        assert_eq!(transcoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_word_timings_rejected_at_boundary() {
        let fx = Fixture::new();
        let transcoder = Arc::new(FakeTranscoder::default());
        let composer = fx.composer(FakeProbe::new(5.0), transcoder.clone());

        let request = fx.request().with_captions(CaptionSource::WordTimings {
            words: vec![
                WordTiming::new("a", 0.0, 2.0),
                WordTiming::new("b", 0.5, 2.5),
            ],
        });
        let result = composer.compose(&request).await;

        assert_eq!(result.failed_stage, Some(CompositionStage::ValidateInputs));
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidRequest));
        assert!(result.error.unwrap().contains("captions.words"));
        assert_eq!(transcoder.calls(), 0);
    }

    #[tokio::test]
    async fn test_transcode_failure_promotes_nothing() {
        let fx = Fixture::new();
        let transcoder = Arc::new(FakeTranscoder::failing_on(2));
        let composer = fx.composer(FakeProbe::new(8.0), transcoder.clone());
        let destination = fx.dir.path().join("final.mp4");

        let request = fx
            .request()
            .with_captions(CaptionSource::Script {
                lines: vec!["a short line".into()],
            })
            .with_output_path(destination.clone());
        let result = composer.compose(&request).await;

        assert!(!result.success);
        assert_eq!(result.failed_stage, Some(CompositionStage::Transcode));
        assert_eq!(result.error_kind, Some(ErrorKind::Transcode));
        assert!(result.error.unwrap().contains("subtitles"));
        assert!(!destination.exists());
        assert!(fx.leftover_workspaces().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_alignment_fails_caption_stage() {
        let fx = Fixture::new();
        let transcoder = Arc::new(FakeTranscoder::default());
        let composer = fx.composer(FakeProbe::new(3.0), transcoder.clone());

        let alignment = CharacterAlignment::from_text("abc", vec![0.0], vec![0.1, 0.2, 0.3]);
        let request = fx
            .request()
            .with_captions(CaptionSource::Alignment { alignment });
        let result = composer.compose(&request).await;

        assert_eq!(result.failed_stage, Some(CompositionStage::BuildCaptions));
        assert_eq!(result.error_kind, Some(ErrorKind::AlignmentParse));
        // Only the normalize pass ran
        assert_eq!(transcoder.calls(), 1);
    }

    #[tokio::test]
    async fn test_merge_only_skips_captions() {
        let fx = Fixture::new();
        let transcoder = Arc::new(FakeTranscoder::default());
        let composer = fx.composer(FakeProbe::new(6.0), transcoder.clone());

        let request = fx.request().with_captions(CaptionSource::WordTimings {
            words: twenty_words(),
        });
        let result = composer.merge_only(&request, false).await;

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.caption_count, 0);

        let args = transcoder.args();
        assert_eq!(args.len(), 1);
        let joined = args[0].join(" ");
        assert!(!joined.contains("subtitles="));
        // Without normalization the background is looped in the final pass
        assert!(joined.contains("-stream_loop -1"));

        let output = result.output_path.unwrap();
        assert!(output.starts_with(fx.work_dir().join("demo")));
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_duration_drift_only_warns() {
        let fx = Fixture::new();
        let transcoder = Arc::new(FakeTranscoder::default());
        let probe = FakeProbe::new(7.0).with(&fx.voice, 5.0);
        let composer = fx.composer(probe, transcoder);

        let result = composer.merge_only(&fx.request(), true).await;
        assert!(result.success);
        assert!((result.duration - 7.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let fx = Fixture::new();
        let transcoder = Arc::new(FakeTranscoder::default());
        let composer = fx.composer(FakeProbe::new(4.0), transcoder.clone());

        let a = fx
            .request()
            .with_captions(CaptionSource::Script {
                lines: vec!["first request".into()],
            });
        let b = fx
            .request()
            .with_captions(CaptionSource::Script {
                lines: vec!["second request".into()],
            });

        let (ra, rb) = tokio::join!(composer.compose(&a), composer.compose(&b));

        assert!(ra.success && rb.success);
        assert_ne!(ra.output_path, rb.output_path);

        // Every intermediate lives in a per-request workspace
        let workspaces: std::collections::HashSet<PathBuf> = transcoder
            .commands
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.output().parent().map(Path::to_path_buf))
            .collect();
        assert_eq!(workspaces.len(), 2);
        assert!(fx.leftover_workspaces().is_empty());
    }
}
