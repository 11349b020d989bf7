//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use reelsmith_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Number of diagnostic stderr lines kept for error messages.
pub const STDERR_TAIL_LINES: usize = 20;

const LOG_LEVEL: &str = "error";

/// One `-i` input with the arguments that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    pub path: PathBuf,
    pub args: Vec<String>,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order; stream specifiers refer to these indices.
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Output length set by `-t`, if any
    duration: Option<f64>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            duration: None,
        }
    }

    /// Add a plain input.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args(Vec::<String>::new(), path)
    }

    /// Add an input decoded under an unbounded repeat instruction.
    pub fn looped_input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args(["-stream_loop", "-1"], path)
    }

    /// Add an input preceded by its own arguments.
    pub fn input_with_args<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            path: path.as_ref().to_path_buf(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Truncate the output at `seconds`.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Drop all audio streams.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Apply the full encoder settings (video and audio).
    pub fn encoding(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.to_ffmpeg_args())
    }

    /// Apply video-only encoder settings.
    pub fn video_encoding(self, encoding: &EncodingConfig) -> Self {
        self.output_args(encoding.video_args())
    }

    /// Move the MP4 index to the front for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Target output length in seconds, when truncated with `-t`.
    pub fn output_duration(&self) -> Option<f64> {
        self.duration
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());

        args.push("-v".to_string());
        args.push(LOG_LEVEL.to_string());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Executes transcoder commands.
///
/// The orchestrator talks to this seam so pipelines can be exercised
/// without an FFmpeg binary.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// Shared progress observer.
///
/// Receives the output path, each progress snapshot and the target output
/// length when the command sets one.
pub type ProgressObserver = Arc<dyn Fn(&Path, &FfmpegProgress, Option<f64>) + Send + Sync + 'static>;

/// Runner for FFmpeg commands with progress tracking, timeout and cancellation.
#[derive(Clone)]
pub struct FfmpegRunner {
    binary: String,
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout: Option<Duration>,
    progress: Option<ProgressObserver>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

enum WaitOutcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            cancel_rx: None,
            timeout: None,
            progress: None,
        }
    }

    /// Use a specific ffmpeg binary instead of the one on PATH.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Kill the running child once `true` is sent on the channel.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Bound every invocation; the child is killed when it expires.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, observer: ProgressObserver) -> Self {
        self.progress = Some(observer);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which(&self.binary).map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::transcode_failed("stderr not captured", None, None))?;
        let mut reader = BufReader::new(stderr).lines();
        let observer = self.progress.clone();
        let output = cmd.output().to_path_buf();
        let target = cmd.output_duration();

        // Progress lines go to the observer, everything else into a bounded tail
        let stderr_task = tokio::spawn(async move {
            let mut current = FfmpegProgress::default();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(snapshot) = parse_progress_line(&line, &mut current) {
                        if let Some(observer) = &observer {
                            observer(output.as_path(), &snapshot, target);
                        }
                    }
                    continue;
                }
                if line.trim().is_empty() {
                    continue;
                }
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }

            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = sleep_or_forever(self.timeout) => WaitOutcome::TimedOut,
            _ = wait_for_cancel(self.cancel_rx.clone()) => WaitOutcome::Cancelled,
        };

        let status = match outcome {
            WaitOutcome::Exited(status) => status?,
            WaitOutcome::TimedOut => {
                let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
                warn!("FFmpeg timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(MediaError::Timeout { tool: "ffmpeg", secs });
            }
            WaitOutcome::Cancelled => {
                info!("FFmpeg cancelled, killing process");
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(MediaError::Cancelled);
            }
        };

        let tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::transcode_failed(
                format!(
                    "FFmpeg exited with non-zero status writing {}",
                    cmd.output().display()
                ),
                (!tail.is_empty()).then_some(tail),
                status.code(),
            ))
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegRunner {
    async fn transcode(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run(cmd).await
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending::<()>().await,
    }
}

async fn wait_for_cancel(cancel_rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = cancel_rx else {
        return std::future::pending::<()>().await;
    };
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: cancellation can no longer happen
            return std::future::pending::<()>().await;
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
