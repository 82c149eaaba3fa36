use super::*;

#[test]
fn placeholder_is_background_colored_and_sized() {
    let canvas = Canvas {
        width: 120,
        height: 80,
    };
    let bytes = render_placeholder(canvas, FrameIndex(7), FrameFormat::Png, 0).unwrap();
    let img = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(img.dimensions(), (120, 80));
    assert_eq!(img.get_pixel(2, 2).0, [0x1a, 0x1a, 0x2e, 0xff]);
}

#[test]
fn placeholder_text_names_the_frame() {
    let svg = placeholder_svg(
        Canvas {
            width: 1080,
            height: 1920,
        },
        FrameIndex(42),
    );
    assert!(svg.contains(">Frame 42</text>"));
    assert!(svg.contains("x=\"540\" y=\"960\""));
    assert!(svg.contains("font-size=\"24\""));
}

#[test]
fn jpeg_placeholder_decodes() {
    let canvas = Canvas {
        width: 64,
        height: 64,
    };
    let bytes = render_placeholder(canvas, FrameIndex(0), FrameFormat::Jpeg, 80).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
}
