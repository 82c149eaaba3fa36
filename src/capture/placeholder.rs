use std::sync::{Arc, OnceLock};

use crate::foundation::core::{Canvas, FrameIndex};
use crate::foundation::error::{CastError, CastResult};
use crate::host::{FrameFormat, encode_raster};

/// Background of substituted frames.
pub const PLACEHOLDER_BACKGROUND: &str = "#1a1a2e";

fn fontdb() -> Arc<usvg::fontdb::Database> {
    static DB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    Arc::clone(DB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Arc::new(db)
    }))
}

fn placeholder_svg(canvas: Canvas, idx: FrameIndex) -> String {
    let (w, h) = (canvas.width, canvas.height);
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">
<rect width="{w}" height="{h}" fill="{PLACEHOLDER_BACKGROUND}"/>
<text x="{cx}" y="{cy}" fill="#ffffff" font-family="sans-serif" font-size="24" text-anchor="middle" dominant-baseline="middle">Frame {n}</text>
</svg>"##,
        cx = w / 2,
        cy = h / 2,
        n = idx.0,
    )
}

/// Raster standing in for a frame whose capture failed: the background plus "Frame N".
///
/// Text is drawn with whatever system fonts exist; without any, the frame is background only.
pub fn render_placeholder(
    canvas: Canvas,
    idx: FrameIndex,
    format: FrameFormat,
    quality: u8,
) -> CastResult<Vec<u8>> {
    let mut opts = usvg::Options::default();
    opts.fontdb = fontdb();
    let tree = usvg::Tree::from_str(&placeholder_svg(canvas, idx), &opts)
        .map_err(|e| CastError::capture(format!("placeholder svg: {e}")))?;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(canvas.width, canvas.height)
        .ok_or_else(|| CastError::capture("failed to allocate placeholder pixmap"))?;
    resvg::render(&tree, resvg::tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // Opaque background, so premultiplied and straight alpha agree.
    let img = image::RgbaImage::from_raw(canvas.width, canvas.height, pixmap.take())
        .ok_or_else(|| CastError::capture("placeholder raster size mismatch"))?;
    encode_raster(&img, format, quality)
}

#[cfg(test)]
#[path = "../../tests/unit/capture/placeholder.rs"]
mod tests;
