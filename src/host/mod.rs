//! Scene execution hosts.
//!
//! A [`SceneHost`] is a loaded scene document that the frame driver can seek, wait on and
//! capture. The driver never talks to a rendering engine directly.

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod simulated;

use std::io::Cursor;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{Canvas, VirtualTime};
use crate::foundation::error::{CastError, CastResult};
use crate::runtime::gate::{ReadinessCaps, ReadinessReport};
use crate::runtime::sync::SyncReport;

/// Compressed image format of captured frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// Baseline JPEG; small and fast to decode.
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
}

impl FrameFormat {
    /// Decoder name for ffmpeg's `image2pipe` demuxer.
    pub fn ffmpeg_codec(self) -> &'static str {
        match self {
            Self::Jpeg => "mjpeg",
            Self::Png => "png",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Selector chain for the element to rasterize; the first match wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTarget {
    /// CSS selectors in priority order.
    pub selectors: Vec<String>,
}

impl Default for CaptureTarget {
    fn default() -> Self {
        Self {
            selectors: ["[data-capture-root]", ".reel-container", "#root", "body"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Page-space rectangle of the locked capture target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetRect {
    /// Selector that matched.
    pub selector: String,
    /// Left edge in CSS pixels.
    pub x: f64,
    /// Top edge in CSS pixels.
    pub y: f64,
    /// Width in CSS pixels.
    pub width: f64,
    /// Height in CSS pixels.
    pub height: f64,
}

impl TargetRect {
    /// Parse the JSON string the page-side `lockTarget` returns.
    pub fn from_json_str(s: &str) -> CastResult<Self> {
        serde_json::from_str(s).map_err(|e| CastError::serde(format!("capture target: {e}")))
    }

    /// Rectangle covering the whole canvas.
    pub fn full(canvas: Canvas) -> Self {
        Self {
            selector: "body".to_string(),
            x: 0.0,
            y: 0.0,
            width: f64::from(canvas.width),
            height: f64::from(canvas.height),
        }
    }
}

/// A loaded scene that can be driven frame by frame.
///
/// Calls arrive from a single thread, in driver order.
pub trait SceneHost {
    /// Toggle the capture-only presentation overrides.
    fn set_capture_mode(&mut self, on: bool) -> CastResult<()>;
    /// Resolve the capture target and pin its size to `canvas`.
    fn lock_target(&mut self, target: &CaptureTarget, canvas: Canvas) -> CastResult<TargetRect>;
    /// Advance the scene clock to `t` and pin every animation subsystem to it.
    fn sync_to(&mut self, t: VirtualTime) -> CastResult<SyncReport>;
    /// Run the readiness gate.
    fn await_ready(&mut self, caps: &ReadinessCaps) -> CastResult<ReadinessReport>;
    /// Rasterize `rect` into a compressed image.
    fn capture(&mut self, rect: &TargetRect, format: FrameFormat, quality: u8)
    -> CastResult<Vec<u8>>;
    /// Hand the scene back to real time.
    fn resume_animations(&mut self) -> CastResult<()>;
}

/// Opens one isolated [`SceneHost`] per job.
pub trait HostFactory: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;
    /// Load the page at `document` with a viewport of `canvas`.
    fn open(&self, document: &Path, canvas: Canvas) -> CastResult<Box<dyn SceneHost>>;
}

/// Compress an RGBA raster into `format`. Alpha is dropped for JPEG.
pub fn encode_raster(img: &image::RgbaImage, format: FrameFormat, quality: u8) -> CastResult<Vec<u8>> {
    let mut out = Vec::new();
    match format {
        FrameFormat::Jpeg => {
            let rgb = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
                .encode_image(&rgb)
                .context("encode jpeg frame")?;
        }
        FrameFormat::Png => {
            image::DynamicImage::ImageRgba8(img.clone())
                .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
                .context("encode png frame")?;
        }
    }
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/host/mod.rs"]
mod tests;
