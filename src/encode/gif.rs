use std::path::Path;

use crate::config::GifOpts;
use crate::encode::ffmpeg::run_ffmpeg;
use crate::encode::params::{gif_filters, palettegen_args, paletteuse_args};
use crate::foundation::core::Fps;
use crate::foundation::error::CastResult;

/// Two-pass GIF: build a palette from `input`, then encode `out` constrained to it.
///
/// The palette is written next to `input` and removed whatever the outcome.
pub fn transcode_gif(
    ffmpeg: &Path,
    gif: &GifOpts,
    fps: Fps,
    source_width: u32,
    input: &Path,
    out: &Path,
) -> CastResult<()> {
    let palette = input.with_file_name("palette.png");
    let filters = gif_filters(gif, fps, source_width);
    let res = run_ffmpeg(ffmpeg, &palettegen_args(input, &palette, &filters)).and_then(|()| {
        run_ffmpeg(
            ffmpeg,
            &paletteuse_args(input, &palette, &filters, &gif.dither, out),
        )
    });
    let _ = std::fs::remove_file(&palette);
    if res.is_err() {
        let _ = std::fs::remove_file(out);
    }
    res
}
