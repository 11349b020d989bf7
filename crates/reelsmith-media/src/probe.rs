//! FFprobe duration measurement.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Measures media durations.
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration of the media file in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64>;
}

/// Ensure a media file exists and is non-empty, returning its size.
pub async fn check_media_file(path: &Path) -> MediaResult<u64> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| MediaError::probe_failed(path, format!("file not accessible: {}", e)))?;

    if !metadata.is_file() {
        return Err(MediaError::probe_failed(path, "not a regular file"));
    }
    if metadata.len() == 0 {
        return Err(MediaError::probe_failed(path, "file is empty"));
    }
    Ok(metadata.len())
}

/// FFprobe-backed duration probe.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: String,
    timeout: Option<Duration>,
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl FfprobeProbe {
    pub fn new() -> Self {
        Self {
            binary: "ffprobe".to_string(),
            timeout: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        check_media_file(path).await?;

        which::which(&self.binary).map_err(|_| MediaError::FfprobeNotFound)?;

        let mut command = Command::new(&self.binary);
        command
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = command.output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, output)
                .await
                .map_err(|_| MediaError::Timeout {
                    tool: "ffprobe",
                    secs: timeout.as_secs(),
                })??,
            None => output.await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::probe_failed(
                path,
                format!(
                    "ffprobe exited with {:?}: {}",
                    output.status.code(),
                    stderr.trim()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let duration = parse_duration_output(&stdout)
            .ok_or_else(|| MediaError::probe_failed(path, format!("unparsable duration {:?}", stdout.trim())))?;

        debug!(path = %path.display(), duration, "Probed duration");
        Ok(duration)
    }
}

/// Parse the single numeric line ffprobe prints for `format=duration`.
fn parse_duration_output(stdout: &str) -> Option<f64> {
    let line = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    let duration: f64 = line.parse().ok()?;
    (duration.is_finite() && duration > 0.0).then_some(duration)
}
