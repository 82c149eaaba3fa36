use super::*;

fn checker() -> image::RgbaImage {
    image::RgbaImage::from_fn(8, 8, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 255, 128])
        }
    })
}

#[test]
fn jpeg_frames_start_with_soi_marker() {
    let bytes = encode_raster(&checker(), FrameFormat::Jpeg, 90).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 8));
}

#[test]
fn png_frames_are_lossless() {
    let img = checker();
    let bytes = encode_raster(&img, FrameFormat::Png, 0).unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(decoded, img);
}

#[test]
fn default_target_chain() {
    assert_eq!(
        CaptureTarget::default().selectors,
        ["[data-capture-root]", ".reel-container", "#root", "body"]
    );
}

#[test]
fn target_rect_parses_page_output() {
    let r = TargetRect::from_json_str(
        r#"{"selector":".reel-container","x":0,"y":0,"width":1080,"height":1920}"#,
    )
    .unwrap();
    assert_eq!(r.selector, ".reel-container");
    assert_eq!(r.height, 1920.0);
}

#[test]
fn frame_format_codec_names() {
    assert_eq!(FrameFormat::Jpeg.ffmpeg_codec(), "mjpeg");
    assert_eq!(FrameFormat::Png.extension(), "png");
    assert_eq!(FrameFormat::default(), FrameFormat::Jpeg);
}
