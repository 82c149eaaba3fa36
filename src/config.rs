//! Engine configuration.
//!
//! Everything here is process-level and shared by all jobs. It loads from an optional JSON file
//! and is then overridden by environment variables (`MAX_DURATION`, `MAX_FPS`, `CHROMIUM_PATH`,
//! `FFMPEG_PATH`, `TEMP_DIR`, `OUTPUT_DIR`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{CastError, CastResult};
use crate::host::FrameFormat;
use crate::runtime::gate::ReadinessCaps;

/// Bounds applied to every incoming request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLimits {
    /// Highest accepted frame rate.
    pub max_fps: u32,
    /// Requested durations above this are clamped (and the clamp reported).
    pub max_duration_secs: u32,
    /// Upper bound for the scene markup, in bytes.
    pub max_markup_bytes: usize,
}

impl Default for RenderLimits {
    fn default() -> Self {
        Self {
            max_fps: 60,
            max_duration_secs: 60,
            max_markup_bytes: 500_000,
        }
    }
}

/// Headless Chrome launch options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeOpts {
    /// Explicit browser binary. `None` lets the launcher search the usual locations.
    pub executable: Option<PathBuf>,
    /// Bound for document load and for every single devtools call.
    pub page_load_timeout_ms: u64,
    /// Extra command-line flags appended after the defaults.
    pub extra_args: Vec<String>,
}

impl Default for ChromeOpts {
    fn default() -> Self {
        Self {
            executable: None,
            page_load_timeout_ms: 30_000,
            extra_args: Vec::new(),
        }
    }
}

impl ChromeOpts {
    /// Flags every capture browser is launched with.
    pub const DEFAULT_ARGS: &'static [&'static str] = &[
        "--disable-dev-shm-usage",
        "--disable-accelerated-2d-canvas",
        "--disable-gpu",
        "--disable-web-security",
        "--allow-file-access-from-files",
        "--font-render-hinting=none",
        "--disable-font-subpixel-positioning",
        "--hide-scrollbars",
        "--mute-audio",
    ];

    /// Document load bound as a [`Duration`].
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    /// Default flags followed by `extra_args`.
    pub fn launch_args(&self) -> Vec<String> {
        Self::DEFAULT_ARGS
            .iter()
            .map(|s| (*s).to_string())
            .chain(self.extra_args.iter().cloned())
            .collect()
    }
}

/// How frames reach the encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeStrategy {
    /// One encoder process fed through its stdin pipe.
    #[default]
    Direct,
    /// Bounded windows encoded to intermediate parts, then stream-copy concatenated.
    Parts,
    /// `Direct` unless the job exceeds [`EncoderOpts::parts_threshold_frames`].
    Auto,
}

/// Options for GIF output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GifOpts {
    /// GIF frame rate cap; the MP4 intermediate is resampled down to it.
    pub max_fps: u32,
    /// Sources wider than this are scaled down to `scaled_width`.
    pub scale_above_width: u32,
    /// Target width for wide sources (height follows the aspect ratio).
    pub scaled_width: u32,
    /// `paletteuse` dithering mode.
    pub dither: String,
}

impl Default for GifOpts {
    fn default() -> Self {
        Self {
            max_fps: 15,
            scale_above_width: 720,
            scaled_width: 540,
            dither: "sierra2_4a".to_string(),
        }
    }
}

/// Encoder adapter options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOpts {
    /// `ffmpeg` binary.
    pub ffmpeg: PathBuf,
    /// Streaming strategy.
    pub strategy: EncodeStrategy,
    /// Window size of one intermediate part, in seconds of output.
    pub seconds_per_part: u32,
    /// Frame count above which `Auto` picks the part strategy.
    pub parts_threshold_frames: u64,
    /// Frames that may sit between capture and the encoder before the driver blocks.
    pub channel_capacity: usize,
    /// Compressed image format handed to the encoder.
    pub frame_format: FrameFormat,
    /// JPEG quality (1-100) when `frame_format` is JPEG.
    pub jpeg_quality: u8,
    /// GIF-specific options.
    pub gif: GifOpts,
}

impl Default for EncoderOpts {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            strategy: EncodeStrategy::Direct,
            seconds_per_part: 4,
            parts_threshold_frames: 1_800,
            channel_capacity: 4,
            frame_format: FrameFormat::Jpeg,
            jpeg_quality: 90,
            gif: GifOpts::default(),
        }
    }
}

impl EncoderOpts {
    /// Resolve `Auto` for a job of `total_frames`.
    pub fn resolve_strategy(&self, total_frames: u64) -> EncodeStrategy {
        match self.strategy {
            EncodeStrategy::Auto if total_frames > self.parts_threshold_frames => {
                EncodeStrategy::Parts
            }
            EncodeStrategy::Auto => EncodeStrategy::Direct,
            other => other,
        }
    }
}

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Request bounds.
    pub limits: RenderLimits,
    /// Browser options.
    pub chrome: ChromeOpts,
    /// Encoder options.
    pub encoder: EncoderOpts,
    /// Per-frame readiness bounds.
    pub readiness: ReadinessCaps,
    /// Parent directory for per-job scratch directories.
    pub temp_root: PathBuf,
    /// Where finished videos are written.
    pub output_dir: PathBuf,
    /// How long a finished job with no listeners stays in the registry, in seconds.
    pub job_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: RenderLimits::default(),
            chrome: ChromeOpts::default(),
            encoder: EncoderOpts::default(),
            readiness: ReadinessCaps::default(),
            temp_root: std::env::temp_dir(),
            output_dir: PathBuf::from("output"),
            job_grace_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_path(path: &Path) -> CastResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    /// Parse a JSON config document.
    pub fn from_json_str(s: &str) -> CastResult<Self> {
        serde_json::from_str(s).map_err(|e| CastError::serde(format!("invalid config: {e}")))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> CastResult<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> CastResult<()> {
        if let Some(v) = lookup("MAX_DURATION") {
            self.limits.max_duration_secs = parse_positive("MAX_DURATION", &v)?;
        }
        if let Some(v) = lookup("MAX_FPS") {
            self.limits.max_fps = parse_positive("MAX_FPS", &v)?;
        }
        if let Some(v) = lookup("CHROMIUM_PATH").filter(|v| !v.is_empty()) {
            self.chrome.executable = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FFMPEG_PATH").filter(|v| !v.is_empty()) {
            self.encoder.ffmpeg = PathBuf::from(v);
        }
        if let Some(v) = lookup("TEMP_DIR").filter(|v| !v.is_empty()) {
            self.temp_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("OUTPUT_DIR").filter(|v| !v.is_empty()) {
            self.output_dir = PathBuf::from(v);
        }
        self.validate()
    }

    /// Reject configurations no job could run under.
    pub fn validate(&self) -> CastResult<()> {
        if self.limits.max_fps == 0 || self.limits.max_duration_secs == 0 {
            return Err(CastError::config("limits must be non-zero"));
        }
        if self.encoder.seconds_per_part == 0 {
            return Err(CastError::config("encoder.seconds_per_part must be >= 1"));
        }
        if self.encoder.channel_capacity == 0 {
            return Err(CastError::config("encoder.channel_capacity must be >= 1"));
        }
        if !(1..=100).contains(&self.encoder.jpeg_quality) {
            return Err(CastError::config("encoder.jpeg_quality must be within 1..=100"));
        }
        if self.encoder.gif.max_fps == 0 || self.encoder.gif.scaled_width < 2 {
            return Err(CastError::config("encoder.gif options must be non-zero"));
        }
        Ok(())
    }

    /// Registry grace period as a [`Duration`].
    pub fn job_grace(&self) -> Duration {
        Duration::from_secs(self.job_grace_secs)
    }
}

fn parse_positive(key: &str, value: &str) -> CastResult<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CastError::config(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
