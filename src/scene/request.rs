use serde::{Deserialize, Serialize};

use crate::capture::timetable::FrameTimetable;
use crate::config::RenderLimits;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{CastError, CastResult};

/// Container format of the finished output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// H.264 in an MP4 container with fast-start metadata.
    #[default]
    #[serde(rename = "MP4", alias = "mp4")]
    Mp4,
    /// Palette-optimized animated GIF.
    #[serde(rename = "GIF", alias = "gif")]
    Gif,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Mp4 => "MP4",
            Self::Gif => "GIF",
        })
    }
}

/// Encoder quality tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Smallest files.
    Low,
    /// Balanced.
    Medium,
    /// Best quality.
    #[default]
    High,
}

/// Named output resolutions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionPreset {
    /// 1080x1920 (reels / short-form vertical).
    #[serde(rename = "HD_Vertical")]
    HdVertical,
    /// 1080x1080.
    #[serde(rename = "Square")]
    Square,
    /// 1920x1080.
    #[serde(rename = "HD_Horizontal")]
    HdHorizontal,
}

impl ResolutionPreset {
    /// Pixel dimensions of the preset.
    pub fn canvas(self) -> Canvas {
        let (width, height) = match self {
            Self::HdVertical => (1080, 1920),
            Self::Square => (1080, 1080),
            Self::HdHorizontal => (1920, 1080),
        };
        Canvas { width, height }
    }
}

/// A preset name or explicit dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Resolution {
    /// One of the named presets.
    Preset(ResolutionPreset),
    /// Explicit dimensions; both must be even.
    Custom {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

impl Default for Resolution {
    fn default() -> Self {
        Self::Preset(ResolutionPreset::HdVertical)
    }
}

impl Resolution {
    /// Pixel dimensions.
    pub fn canvas(self) -> Canvas {
        match self {
            Self::Preset(p) => p.canvas(),
            Self::Custom { width, height } => Canvas { width, height },
        }
    }
}

/// A render request as submitted by a caller.
///
/// Field aliases accept the short `html`/`css`/`js`/`fps`/`duration` names used by the HTTP
/// front end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderRequest {
    /// Body markup of the scene.
    #[serde(alias = "html")]
    pub scene_markup: String,
    /// Scene stylesheet.
    #[serde(alias = "css")]
    pub style_sheet: String,
    /// Scene script, run after the markup.
    #[serde(alias = "js")]
    pub script_body: String,
    /// Output dimensions.
    pub resolution: Resolution,
    /// Frames per second.
    #[serde(alias = "fps")]
    pub frame_rate: u32,
    /// Requested duration in seconds.
    #[serde(alias = "duration")]
    pub duration_secs: f64,
    /// Output container.
    #[serde(alias = "format")]
    pub output_format: OutputFormat,
    /// Encoder quality tier.
    #[serde(alias = "quality")]
    pub quality_tier: QualityTier,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            scene_markup: String::new(),
            style_sheet: String::new(),
            script_body: String::new(),
            resolution: Resolution::default(),
            frame_rate: 30,
            duration_secs: 15.0,
            output_format: OutputFormat::Mp4,
            quality_tier: QualityTier::High,
        }
    }
}

impl RenderRequest {
    /// Parse a JSON request document.
    pub fn from_json_str(s: &str) -> CastResult<Self> {
        serde_json::from_str(s).map_err(|e| CastError::serde(format!("invalid request: {e}")))
    }

    /// Check the request against `limits` and freeze it into a [`RenderPlan`].
    ///
    /// Durations above the configured maximum are clamped, not rejected; the clamp is recorded
    /// in [`RenderPlan::clamped_from_secs`].
    pub fn validate(&self, limits: &RenderLimits) -> CastResult<RenderPlan> {
        if self.scene_markup.trim().is_empty() {
            return Err(CastError::config("scene markup is required"));
        }
        if self.scene_markup.len() > limits.max_markup_bytes {
            return Err(CastError::config(format!(
                "scene markup is {} bytes, the limit is {}",
                self.scene_markup.len(),
                limits.max_markup_bytes
            )));
        }
        if self.frame_rate < 1 || self.frame_rate > limits.max_fps {
            return Err(CastError::config(format!(
                "fps must be within 1-{}, got {}",
                limits.max_fps, self.frame_rate
            )));
        }
        if !self.duration_secs.is_finite() || self.duration_secs < 1.0 {
            return Err(CastError::config(format!(
                "duration must be at least 1 second, got {}",
                self.duration_secs
            )));
        }

        let canvas = self.resolution.canvas();
        if canvas.width == 0 || canvas.height == 0 {
            return Err(CastError::config("output width/height must be non-zero"));
        }
        if !canvas.width.is_multiple_of(2) || !canvas.height.is_multiple_of(2) {
            return Err(CastError::config(format!(
                "output width/height must be even (required for yuv420p), got {}x{}",
                canvas.width, canvas.height
            )));
        }

        let max = f64::from(limits.max_duration_secs);
        let (duration_secs, clamped_from_secs) = if self.duration_secs > max {
            (max, Some(self.duration_secs))
        } else {
            (self.duration_secs, None)
        };

        let fps = Fps::whole(self.frame_rate)?;
        let timetable = FrameTimetable::new(fps, duration_secs)?;

        Ok(RenderPlan {
            request: self.clone(),
            canvas,
            fps,
            duration_secs,
            clamped_from_secs,
            timetable,
        })
    }
}

/// A validated, immutable request ready to render.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderPlan {
    /// The request as submitted.
    pub request: RenderRequest,
    /// Output dimensions.
    pub canvas: Canvas,
    /// Frame rate.
    pub fps: Fps,
    /// Effective duration after clamping.
    pub duration_secs: f64,
    /// Requested duration when it was clamped.
    pub clamped_from_secs: Option<f64>,
    /// Frame timetable for the effective duration.
    pub timetable: FrameTimetable,
}

impl RenderPlan {
    /// Human-readable clamp notice, when a clamp happened.
    pub fn clamp_notice(&self) -> Option<String> {
        self.clamped_from_secs.map(|from| {
            format!(
                "duration reduced from {from}s to {}s (configured maximum)",
                self.duration_secs
            )
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/request.rs"]
mod tests;
