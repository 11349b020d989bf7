//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use reelsmith_media::ComposerConfig;
use reelsmith_models::composition::DEFAULT_NORMALIZE_BUFFER_SECS;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for request workspaces and default outputs
    pub work_dir: PathBuf,
    /// Upper bound for one FFmpeg invocation
    pub ffmpeg_timeout: Duration,
    /// Upper bound for one ffprobe invocation
    pub probe_timeout: Duration,
    /// Buffer applied to requests that do not set their own
    pub normalize_buffer_secs: f64,
    /// Maximum compositions rendering at once
    pub max_concurrent: usize,
    /// Extra fonts for caption rendering
    pub fonts_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/reelsmith"),
            ffmpeg_timeout: Duration::from_secs(900), // 15 minutes
            probe_timeout: Duration::from_secs(30),
            normalize_buffer_secs: DEFAULT_NORMALIZE_BUFFER_SECS,
            max_concurrent: 2,
            fonts_dir: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("REELSMITH_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            ffmpeg_timeout: Duration::from_secs(
                std::env::var("REELSMITH_FFMPEG_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            probe_timeout: Duration::from_secs(
                std::env::var("REELSMITH_PROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            normalize_buffer_secs: std::env::var("REELSMITH_NORMALIZE_BUFFER_SECS")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|b| b.is_finite() && *b >= 0.0)
                .unwrap_or(defaults.normalize_buffer_secs),
            max_concurrent: std::env::var("REELSMITH_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent),
            fonts_dir: std::env::var("REELSMITH_FONTS_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Settings handed to the composer.
    pub fn composer_config(&self) -> ComposerConfig {
        let config = ComposerConfig::new(&self.work_dir);
        match &self.fonts_dir {
            Some(dir) => config.with_fonts_dir(dir),
            None => config,
        }
    }
}
