//! Encoder invocation parameters.
//!
//! Every argument list the adapter hands to ffmpeg is built here, so the tiers and filter
//! graphs are testable without spawning anything.

use std::ffi::OsString;
use std::path::Path;

use crate::config::GifOpts;
use crate::foundation::core::Fps;
use crate::host::FrameFormat;
use crate::scene::request::QualityTier;

/// Fixed H.264 settings for one quality tier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodeParams {
    /// Constant rate factor; lower is better and larger.
    pub crf: u8,
    /// x264 speed preset.
    pub preset: &'static str,
    /// x264 tuning.
    pub tune: &'static str,
}

impl EncodeParams {
    /// Parameters for `tier`.
    pub fn for_tier(tier: QualityTier) -> Self {
        let crf = match tier {
            QualityTier::High => 18,
            QualityTier::Medium => 23,
            QualityTier::Low => 28,
        };
        Self {
            crf,
            preset: "veryfast",
            tune: "film",
        }
    }

    /// Output-side H.264 arguments (`yuv420p`, fast-start, no audio).
    pub fn h264_args(&self) -> Vec<String> {
        [
            "-an",
            "-c:v",
            "libx264",
            "-preset",
            self.preset,
            "-tune",
            self.tune,
            "-crf",
            &self.crf.to_string(),
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

fn os(args: &[&str]) -> Vec<OsString> {
    args.iter().map(OsString::from).collect()
}

/// Input-side arguments for compressed frames arriving on stdin.
pub fn pipe_input_args(format: FrameFormat, fps: Fps) -> Vec<OsString> {
    os(&[
        "-f",
        "image2pipe",
        "-c:v",
        format.ffmpeg_codec(),
        "-framerate",
        &fps.to_ffmpeg_rate(),
        "-i",
        "pipe:0",
    ])
}

/// Encode a numbered frame sequence (`frame_%06d.<ext>`) in `dir` into `out`.
pub fn sequence_args(
    dir: &Path,
    format: FrameFormat,
    fps: Fps,
    params: &EncodeParams,
    out: &Path,
) -> Vec<OsString> {
    let mut args = os(&["-y", "-loglevel", "error", "-framerate", &fps.to_ffmpeg_rate()]);
    args.push("-i".into());
    args.push(
        dir.join(format!("frame_%06d.{}", format.extension()))
            .into_os_string(),
    );
    args.extend(params.h264_args().into_iter().map(OsString::from));
    args.push(out.as_os_str().to_owned());
    args
}

/// Stream-copy concatenation of the parts listed in `list` into `out`.
pub fn concat_args(list: &Path, out: &Path) -> Vec<OsString> {
    let mut args = os(&["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"]);
    args.push(list.as_os_str().to_owned());
    args.extend(os(&["-c", "copy", "-movflags", "+faststart"]));
    args.push(out.as_os_str().to_owned());
    args
}

/// Contents of a concat demuxer list file.
pub fn concat_list(parts: &[impl AsRef<Path>]) -> String {
    parts
        .iter()
        .map(|p| {
            let s = p.as_ref().to_string_lossy().replace('\'', "'\\''");
            format!("file '{s}'\n")
        })
        .collect()
}

/// Frame-rate and scale prefix shared by both GIF passes.
pub fn gif_filters(gif: &GifOpts, fps: Fps, source_width: u32) -> String {
    let rate = fps.as_f64().min(f64::from(gif.max_fps));
    let rate = if rate.fract() == 0.0 {
        format!("{}", rate as u32)
    } else {
        format!("{rate:.3}")
    };
    if source_width > gif.scale_above_width {
        format!("fps={rate},scale={}:-1:flags=lanczos", gif.scaled_width)
    } else {
        format!("fps={rate}")
    }
}

/// First GIF pass: build an optimized palette from `input`.
pub fn palettegen_args(input: &Path, palette: &Path, filters: &str) -> Vec<OsString> {
    let mut args = os(&["-y", "-loglevel", "error", "-i"]);
    args.push(input.as_os_str().to_owned());
    args.extend(os(&["-vf", &format!("{filters},palettegen")]));
    args.push(palette.as_os_str().to_owned());
    args
}

/// Second GIF pass: encode `input` constrained to `palette`.
pub fn paletteuse_args(
    input: &Path,
    palette: &Path,
    filters: &str,
    dither: &str,
    out: &Path,
) -> Vec<OsString> {
    let mut args = os(&["-y", "-loglevel", "error", "-i"]);
    args.push(input.as_os_str().to_owned());
    args.push("-i".into());
    args.push(palette.as_os_str().to_owned());
    args.extend(os(&[
        "-lavfi",
        &format!("{filters}[x];[x][1:v]paletteuse=dither={dither}"),
    ]));
    args.push(out.as_os_str().to_owned());
    args
}

#[cfg(test)]
#[path = "../../tests/unit/encode/params.rs"]
mod tests;
